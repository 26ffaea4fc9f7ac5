//! Page flow on top of [`PdfBuilder`]: a vertical cursor with margins,
//! measured word wrapping, and tables that break across pages.

use crate::pdf::{text_width_mm, Font, Paint, PdfBuilder, Rgb, PT_PER_MM};

/// Baseline offset from the top of a line box, as a fraction of the font size.
const ASCENT_RATIO: f64 = 0.78;
const LINE_SPACING: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 15.0,
            right: 15.0,
            bottom: 22.0,
            left: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Height of one line of text in millimetres.
pub fn line_height(size_pt: f64) -> f64 {
    size_pt * LINE_SPACING / PT_PER_MM
}

fn ascent(size_pt: f64) -> f64 {
    size_pt * ASCENT_RATIO / PT_PER_MM
}

/// Greedy word wrap by measured width. Words wider than the line are split
/// by character.
pub fn wrap_text(text: &str, font: Font, size_pt: f64, max_width: f64) -> Vec<String> {
    let fits = |candidate: &str| text_width_mm(font, size_pt, candidate) <= max_width;
    let mut out = Vec::new();
    let mut line = String::new();
    for token in text.split_whitespace() {
        let candidate = if line.is_empty() {
            token.to_string()
        } else {
            format!("{line} {token}")
        };
        if fits(&candidate) {
            line = candidate;
            continue;
        }
        if !line.is_empty() {
            out.push(std::mem::take(&mut line));
        }
        if fits(token) {
            line = token.to_string();
            continue;
        }
        for ch in token.chars() {
            line.push(ch);
            if !fits(&line) && line.chars().count() > 1 {
                line.pop();
                out.push(std::mem::take(&mut line));
                line.push(ch);
            }
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// A PDF document plus a top-down cursor.
pub struct Canvas {
    pdf: PdfBuilder,
    margins: Margins,
    cursor: f64,
}

impl Canvas {
    pub fn new(pdf: PdfBuilder, margins: Margins) -> Self {
        Self {
            pdf,
            cursor: margins.top,
            margins,
        }
    }

    pub fn pdf(&mut self) -> &mut PdfBuilder {
        &mut self.pdf
    }

    pub fn into_pdf(self) -> PdfBuilder {
        self.pdf
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn set_cursor(&mut self, y: f64) {
        self.cursor = y;
    }

    pub fn advance(&mut self, dy: f64) {
        self.cursor += dy;
    }

    pub fn page_index(&self) -> usize {
        self.pdf.current_page()
    }

    pub fn left(&self) -> f64 {
        self.margins.left
    }

    pub fn right(&self) -> f64 {
        self.pdf.width_mm() - self.margins.right
    }

    pub fn content_width(&self) -> f64 {
        self.right() - self.left()
    }

    pub fn bottom_limit(&self) -> f64 {
        self.pdf.height_mm() - self.margins.bottom
    }

    pub fn remaining(&self) -> f64 {
        self.bottom_limit() - self.cursor
    }

    /// Start a new page when `height` does not fit below the cursor.
    /// Returns true if a page break happened.
    pub fn ensure_space(&mut self, height: f64) -> bool {
        if self.cursor + height <= self.bottom_limit() {
            return false;
        }
        // A block taller than a whole page is drawn anyway once at the top.
        if (self.cursor - self.margins.top).abs() < f64::EPSILON {
            return false;
        }
        self.new_page();
        true
    }

    pub fn new_page(&mut self) {
        self.pdf.add_page();
        self.cursor = self.margins.top;
    }

    /// Draw one line of text inside the box [`x`, `x + width`], baseline at `baseline`.
    #[allow(clippy::too_many_arguments)]
    pub fn text_in_box(
        &mut self,
        font: Font,
        size_pt: f64,
        x: f64,
        width: f64,
        baseline: f64,
        text: &str,
        align: Align,
    ) {
        let text_x = match align {
            Align::Left => x,
            Align::Center => x + (width - text_width_mm(font, size_pt, text)) / 2.0,
            Align::Right => x + width - text_width_mm(font, size_pt, text),
        };
        self.pdf.text(font, size_pt, text_x, baseline, text);
    }

    /// Write wrapped text across the content width and move the cursor below it.
    pub fn paragraph(&mut self, font: Font, size_pt: f64, color: Rgb, text: &str, align: Align) {
        let left = self.left();
        let width = self.content_width();
        self.paragraph_in(font, size_pt, color, left, width, text, align);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn paragraph_in(
        &mut self,
        font: Font,
        size_pt: f64,
        color: Rgb,
        x: f64,
        width: f64,
        text: &str,
        align: Align,
    ) {
        let step = line_height(size_pt);
        for line in wrap_text(text, font, size_pt, width) {
            self.ensure_space(step);
            self.pdf.fill_color(color);
            let baseline = self.cursor + ascent(size_pt);
            self.text_in_box(font, size_pt, x, width, baseline, &line, align);
            self.cursor += step;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub width: f64,
    pub align: Align,
}

impl Column {
    pub fn new(header: impl Into<String>, width: f64, align: Align) -> Self {
        Self {
            header: header.into(),
            width,
            align,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub font_size: f64,
    pub header_font_size: f64,
    pub padding: f64,
    pub header_fill: Rgb,
    pub header_text: Rgb,
    pub body_text: Rgb,
    pub stripe_fill: Option<Rgb>,
    pub rule: Rgb,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            font_size: 9.0,
            header_font_size: 9.0,
            padding: 1.8,
            header_fill: Rgb::new(31, 58, 95),
            header_text: Rgb::WHITE,
            body_text: Rgb::new(33, 33, 33),
            stripe_fill: Some(Rgb::new(244, 246, 249)),
            rule: Rgb::new(210, 214, 220),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub rows: usize,
    pub first_page: usize,
    pub last_page: usize,
    /// How many times the header was drawn (once per page the table spans).
    pub header_repeats: usize,
}

/// Fixed-width table. Cells wrap, a row taller than a page is split across
/// pages, and the header is repeated at the top of every page the table
/// continues on.
pub struct Table {
    columns: Vec<Column>,
    style: TableStyle,
}

impl Table {
    pub fn new(columns: Vec<Column>, style: TableStyle) -> Self {
        Self { columns, style }
    }

    pub fn draw(&self, canvas: &mut Canvas, rows: &[Vec<String>]) -> TableSummary {
        let min_row = self.row_height(1, self.style.font_size);
        let header_lines = self.wrap_row(
            &self
                .columns
                .iter()
                .map(|col| col.header.clone())
                .collect::<Vec<_>>(),
            Font::Bold,
            self.style.header_font_size,
        );
        let header_height = self.row_height(
            header_lines.iter().map(Vec::len).max().unwrap_or(1),
            self.style.header_font_size,
        );

        canvas.ensure_space(header_height + min_row);
        let first_page = canvas.page_index();
        self.draw_header(canvas, &header_lines, header_height);
        let mut header_repeats = 1;
        // Room for rows on a page that starts with the header.
        let page_room = canvas.bottom_limit() - canvas.margins().top - header_height;

        for (index, row) in rows.iter().enumerate() {
            let cells = self.wrap_row(row, Font::Regular, self.style.font_size);
            let line_count = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let height = self.row_height(line_count, self.style.font_size);

            // Rows that fit on one page move whole; taller rows split.
            let fits_here = height <= canvas.remaining();
            if !fits_here && (height <= page_room || self.lines_fitting(canvas.remaining()) == 0) {
                canvas.new_page();
                self.draw_header(canvas, &header_lines, header_height);
                header_repeats += 1;
            }

            let mut start = 0;
            loop {
                let fit = self.lines_fitting(canvas.remaining()).max(1);
                let end = (start + fit).min(line_count);
                let part: Vec<Vec<String>> = cells
                    .iter()
                    .map(|lines| lines.iter().skip(start).take(end - start).cloned().collect())
                    .collect();
                self.draw_row_part(canvas, &part, end - start, index);
                start = end;
                if start >= line_count {
                    break;
                }
                canvas.new_page();
                self.draw_header(canvas, &header_lines, header_height);
                header_repeats += 1;
            }
        }

        TableSummary {
            rows: rows.len(),
            first_page,
            last_page: canvas.page_index(),
            header_repeats,
        }
    }

    fn draw_row_part(&self, canvas: &mut Canvas, cells: &[Vec<String>], lines: usize, index: usize) {
        let height = self.row_height(lines, self.style.font_size);
        let top = canvas.cursor();
        let left = canvas.left();
        let total_width = self.total_width();

        if let Some(stripe) = self.style.stripe_fill.filter(|_| index % 2 == 1) {
            canvas
                .pdf()
                .fill_color(stripe)
                .rect(left, top, total_width, height, Paint::Fill);
        }
        canvas.pdf().fill_color(self.style.body_text);
        self.draw_cells(canvas, cells, top, Font::Regular, self.style.font_size);

        canvas
            .pdf()
            .stroke_color(self.style.rule)
            .line_width(0.2)
            .line(left, top + height, left + total_width, top + height);
        canvas.advance(height);
    }

    /// Body lines that fit in `available` millimetres, padding included.
    fn lines_fitting(&self, available: f64) -> usize {
        let room = available - 2.0 * self.style.padding;
        if room <= 0.0 {
            return 0;
        }
        (room / line_height(self.style.font_size) + 1e-9).floor() as usize
    }

    fn draw_header(&self, canvas: &mut Canvas, header_lines: &[Vec<String>], height: f64) {
        let top = canvas.cursor();
        let left = canvas.left();
        let total_width = self.total_width();
        canvas
            .pdf()
            .fill_color(self.style.header_fill)
            .rect(left, top, total_width, height, Paint::Fill)
            .fill_color(self.style.header_text);
        self.draw_cells(
            canvas,
            header_lines,
            top,
            Font::Bold,
            self.style.header_font_size,
        );
        canvas.advance(height);
    }

    fn draw_cells(
        &self,
        canvas: &mut Canvas,
        cells: &[Vec<String>],
        top: f64,
        font: Font,
        size_pt: f64,
    ) {
        let padding = self.style.padding;
        let step = line_height(size_pt);
        let mut x = canvas.left();
        for (column, lines) in self.columns.iter().zip(cells) {
            let inner = (column.width - 2.0 * padding).max(1.0);
            for (line_index, line) in lines.iter().enumerate() {
                let baseline = top + padding + ascent(size_pt) + step * line_index as f64;
                canvas.text_in_box(font, size_pt, x + padding, inner, baseline, line, column.align);
            }
            x += column.width;
        }
    }

    fn wrap_row(&self, row: &[String], font: Font, size_pt: f64) -> Vec<Vec<String>> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let text = row.get(index).map(String::as_str).unwrap_or_default();
                let inner = (column.width - 2.0 * self.style.padding).max(1.0);
                wrap_text(text, font, size_pt, inner)
            })
            .collect()
    }

    fn row_height(&self, lines: usize, size_pt: f64) -> f64 {
        line_height(size_pt) * lines.max(1) as f64 + 2.0 * self.style.padding
    }

    fn total_width(&self) -> f64 {
        self.columns.iter().map(|col| col.width).sum()
    }
}
