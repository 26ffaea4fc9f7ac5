//! Minimal PDF 1.4 writer for invoice documents.
//!
//! Generates an uncompressed PDF using the two standard Type1 fonts
//! (Helvetica, Helvetica-Bold) with WinAnsi encoding, which covers French
//! accents and the euro sign without embedding font programs. Coordinates are
//! given in millimetres from the top-left corner of the page and converted to
//! PDF points when operators are emitted.
//!
//! ```rust,ignore
//! let mut pdf = PdfBuilder::a4();
//! pdf.fill_color(Rgb::new(31, 58, 95))
//!     .text(Font::Bold, 14.0, 15.0, 20.0, "FACTURE")
//!     .line(15.0, 24.0, 195.0, 24.0);
//! let bytes = pdf.build();
//! ```

use chrono::{DateTime, Utc};

pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;
pub(crate) const PT_PER_MM: f64 = 72.0 / 25.4;

const FALLBACK_GLYPH_WIDTH: u16 = 556;

// Advance widths (1/1000 em) for WinAnsi 0x20..=0x7E, from the Adobe AFM files.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
        }
    }

    fn glyph_width(self, byte: u8) -> u16 {
        let table = match self {
            Font::Regular => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        match byte {
            0x20..=0x7E => table
                .get(usize::from(byte - 0x20))
                .copied()
                .unwrap_or(FALLBACK_GLYPH_WIDTH),
            0xA0 => 278,
            0xB0 => 400,
            _ => FALLBACK_GLYPH_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|part| u8::from_str_radix(part, 16).ok())
        };
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    fn operands(self) -> String {
        format!(
            "{:.3} {:.3} {:.3}",
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fill,
    Stroke,
}

impl Paint {
    fn operator(self) -> &'static str {
        match self {
            Paint::Fill => "f",
            Paint::Stroke => "S",
        }
    }
}

/// Handle returned by [`PdfBuilder::add_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageId(usize);

struct ImageXObject {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub producer: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Builder for a multi-page PDF document. Starts with one empty page.
pub struct PdfBuilder {
    width_mm: f64,
    height_mm: f64,
    pages: Vec<Vec<u8>>,
    current: usize,
    images: Vec<ImageXObject>,
    info: DocumentInfo,
}

impl PdfBuilder {
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
            pages: vec![Vec::with_capacity(4096)],
            current: 0,
            images: Vec::new(),
            info: DocumentInfo::default(),
        }
    }

    pub fn a4() -> Self {
        Self::new(A4_WIDTH_MM, A4_HEIGHT_MM)
    }

    pub fn with_info(mut self, info: DocumentInfo) -> Self {
        self.info = info;
        self
    }

    pub fn width_mm(&self) -> f64 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Zero-based index of the page operators are written to.
    pub fn current_page(&self) -> usize {
        self.current
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// Append a page and make it current.
    pub fn add_page(&mut self) -> &mut Self {
        self.pages.push(Vec::with_capacity(4096));
        self.current = self.pages.len() - 1;
        self
    }

    /// Redirect subsequent operators to an existing page (used for footers).
    pub fn select_page(&mut self, index: usize) -> &mut Self {
        if index < self.pages.len() {
            self.current = index;
        }
        self
    }

    // -----------------------------------------------------------------------
    // Graphics state
    // -----------------------------------------------------------------------

    /// Non-stroking color; also used for text.
    pub fn fill_color(&mut self, color: Rgb) -> &mut Self {
        let op = format!("{} rg", color.operands());
        self.push_op(op.as_bytes())
    }

    pub fn stroke_color(&mut self, color: Rgb) -> &mut Self {
        let op = format!("{} RG", color.operands());
        self.push_op(op.as_bytes())
    }

    pub fn line_width(&mut self, width_mm: f64) -> &mut Self {
        let op = format!("{:.2} w", width_mm * PT_PER_MM);
        self.push_op(op.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, paint: Paint) -> &mut Self {
        let op = format!(
            "{:.2} {:.2} {:.2} {:.2} re {}",
            self.px(x),
            self.py(y + height),
            width * PT_PER_MM,
            height * PT_PER_MM,
            paint.operator()
        );
        self.push_op(op.as_bytes())
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> &mut Self {
        let op = format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            self.px(x1),
            self.py(y1),
            self.px(x2),
            self.py(y2)
        );
        self.push_op(op.as_bytes())
    }

    /// Draw a single line of text with its baseline at `y`.
    pub fn text(&mut self, font: Font, size_pt: f64, x: f64, y: f64, text: &str) -> &mut Self {
        let mut op = format!(
            "BT /{} {:.2} Tf 1 0 0 1 {:.2} {:.2} Tm ",
            font.resource_name(),
            size_pt,
            self.px(x),
            self.py(y)
        )
        .into_bytes();
        op.extend(literal_string(&encode_win_ansi(text)));
        op.extend_from_slice(b" Tj ET");
        self.push_op(&op)
    }

    /// Register an 8-bit RGB raster. Returns `None` when the buffer length
    /// does not match the dimensions.
    pub fn add_image(&mut self, width: u32, height: u32, rgb: Vec<u8>) -> Option<ImageId> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(3)?;
        if width == 0 || height == 0 || rgb.len() != expected {
            return None;
        }
        self.images.push(ImageXObject { width, height, rgb });
        Some(ImageId(self.images.len() - 1))
    }

    /// Place a registered image with its top-left corner at (`x`, `y`).
    pub fn draw_image(&mut self, id: ImageId, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        if id.0 >= self.images.len() {
            return self;
        }
        let op = format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im{} Do Q",
            width * PT_PER_MM,
            height * PT_PER_MM,
            self.px(x),
            self.py(y + height),
            id.0
        );
        self.push_op(op.as_bytes())
    }

    fn push_op(&mut self, op: &[u8]) -> &mut Self {
        if let Some(page) = self.pages.get_mut(self.current) {
            page.extend_from_slice(op);
            page.push(b'\n');
        }
        self
    }

    fn px(&self, x_mm: f64) -> f64 {
        x_mm * PT_PER_MM
    }

    fn py(&self, y_mm: f64) -> f64 {
        (self.height_mm - y_mm) * PT_PER_MM
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serialize the document: catalog, page tree, fonts, info, images, pages,
    /// cross-reference table and trailer.
    pub fn build(&self) -> Vec<u8> {
        const CATALOG_ID: usize = 1;
        const PAGES_ID: usize = 2;
        const FONT_REGULAR_ID: usize = 3;
        const FONT_BOLD_ID: usize = 4;
        const INFO_ID: usize = 5;
        let first_image_id = 6;
        let first_page_id = first_image_id + self.images.len();
        let object_count = first_page_id - 1 + self.pages.len() * 2;

        let mut out: Vec<u8> = Vec::with_capacity(
            8192 + self.pages.iter().map(Vec::len).sum::<usize>()
                + self.images.iter().map(|img| img.rgb.len()).sum::<usize>(),
        );
        let mut offsets = vec![0usize; object_count + 1];
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        write_object(
            &mut out,
            &mut offsets,
            CATALOG_ID,
            format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>").as_bytes(),
        );

        let kids = (0..self.pages.len())
            .map(|index| format!("{} 0 R", first_page_id + index * 2))
            .collect::<Vec<_>>()
            .join(" ");
        write_object(
            &mut out,
            &mut offsets,
            PAGES_ID,
            format!(
                "<< /Type /Pages /Kids [{kids}] /Count {} >>",
                self.pages.len()
            )
            .as_bytes(),
        );

        for (id, font) in [(FONT_REGULAR_ID, Font::Regular), (FONT_BOLD_ID, Font::Bold)] {
            write_object(
                &mut out,
                &mut offsets,
                id,
                format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    font.base_font()
                )
                .as_bytes(),
            );
        }

        write_object(&mut out, &mut offsets, INFO_ID, &self.info_dictionary());

        for (index, image) in self.images.iter().enumerate() {
            let mut body = format!(
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
                 /BitsPerComponent 8 /Length {} >>\nstream\n",
                image.width,
                image.height,
                image.rgb.len()
            )
            .into_bytes();
            body.extend_from_slice(&image.rgb);
            body.extend_from_slice(b"\nendstream");
            write_object(&mut out, &mut offsets, first_image_id + index, &body);
        }

        let mut resources = format!(
            "<< /Font << /F1 {FONT_REGULAR_ID} 0 R /F2 {FONT_BOLD_ID} 0 R >>"
        );
        if !self.images.is_empty() {
            resources.push_str(" /XObject <<");
            for index in 0..self.images.len() {
                resources.push_str(&format!(" /Im{index} {} 0 R", first_image_id + index));
            }
            resources.push_str(" >>");
        }
        resources.push_str(" >>");

        for (index, content) in self.pages.iter().enumerate() {
            let page_id = first_page_id + index * 2;
            let content_id = page_id + 1;
            write_object(
                &mut out,
                &mut offsets,
                page_id,
                format!(
                    "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {:.2} {:.2}] \
                     /Resources {resources} /Contents {content_id} 0 R >>",
                    self.width_mm * PT_PER_MM,
                    self.height_mm * PT_PER_MM
                )
                .as_bytes(),
            );
            let mut body = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            body.extend_from_slice(content);
            body.extend_from_slice(b"\nendstream");
            write_object(&mut out, &mut offsets, content_id, &body);
        }

        let xref_offset = out.len();
        let digest = format!("{:x}", md5::compute(&out));
        out.extend_from_slice(format!("xref\n0 {}\n", object_count + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {CATALOG_ID} 0 R /Info {INFO_ID} 0 R \
                 /ID [<{digest}> <{digest}>] >>\nstartxref\n{xref_offset}\n%%EOF\n",
                object_count + 1
            )
            .as_bytes(),
        );
        out
    }

    fn info_dictionary(&self) -> Vec<u8> {
        let mut body = b"<<".to_vec();
        for (key, value) in [
            ("Title", &self.info.title),
            ("Author", &self.info.author),
            ("Subject", &self.info.subject),
            ("Producer", &self.info.producer),
        ] {
            if value.trim().is_empty() {
                continue;
            }
            body.extend_from_slice(format!(" /{key} ").as_bytes());
            body.extend(literal_string(&encode_win_ansi(value)));
        }
        let created = self.info.created_at.unwrap_or_else(Utc::now);
        body.extend_from_slice(
            format!(" /CreationDate (D:{}Z) >>", created.format("%Y%m%d%H%M%S")).as_bytes(),
        );
        body
    }
}

fn write_object(out: &mut Vec<u8>, offsets: &mut [usize], id: usize, body: &[u8]) {
    if let Some(slot) = offsets.get_mut(id) {
        *slot = out.len();
    }
    out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}

/// Wrap already-encoded bytes in a PDF literal string, escaping delimiters.
fn literal_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &byte in bytes {
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.push(b')');
    out
}

/// Encode text as WinAnsi (CP1252). Unmappable characters become `?`,
/// control characters are dropped and whitespace controls become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|ch| {
            let code = ch as u32;
            match code {
                0x20..=0x7E => Some(code as u8),
                0x09 | 0x0A | 0x0D => Some(b' '),
                0x00..=0x1F | 0x7F..=0x9F => None,
                0xA0..=0xFF => Some(code as u8),
                _ => Some(win_ansi_special(ch).unwrap_or(b'?')),
            }
        })
        .collect()
}

fn win_ansi_special(ch: char) -> Option<u8> {
    let byte = match ch {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        '\u{2009}' | '\u{202F}' => b' ',
        _ => return None,
    };
    Some(byte)
}

/// Rendered width of a single line of text, in millimetres.
pub fn text_width_mm(font: Font, size_pt: f64, text: &str) -> f64 {
    let units: u32 = encode_win_ansi(text)
        .into_iter()
        .map(|byte| u32::from(font.glyph_width(byte)))
        .sum();
    f64::from(units) / 1000.0 * size_pt / PT_PER_MM
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .rposition(|window| window == needle)
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    #[test]
    fn empty_document_has_header_and_trailer() {
        let bytes = PdfBuilder::a4().build();
        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert_eq!(count(&bytes, b"/Type /Page "), 1);
        assert!(find(&bytes, b"/Count 1").is_some());
    }

    #[test]
    fn xref_offsets_point_at_their_objects() {
        let mut pdf = PdfBuilder::a4();
        pdf.text(Font::Bold, 12.0, 10.0, 10.0, "Bonjour")
            .add_page()
            .text(Font::Regular, 10.0, 10.0, 10.0, "Page deux");
        let id = pdf.add_image(2, 1, vec![255, 0, 0, 0, 0, 255]).expect("valid raster");
        pdf.draw_image(id, 10.0, 20.0, 10.0, 5.0);
        let bytes = pdf.build();

        let startxref = rfind(&bytes, b"startxref\n").expect("startxref") + b"startxref\n".len();
        let end = startxref + find(&bytes[startxref..], b"\n").expect("offset line");
        let xref_at: usize = std::str::from_utf8(&bytes[startxref..end])
            .expect("ascii offset")
            .parse()
            .expect("numeric offset");
        assert!(bytes[xref_at..].starts_with(b"xref\n0 11\n"));

        let entries_start = xref_at + b"xref\n0 11\n".len() + 20;
        for id in 1..=10usize {
            let entry = &bytes[entries_start + (id - 1) * 20..entries_start + id * 20];
            let offset: usize = std::str::from_utf8(&entry[..10])
                .expect("ascii entry")
                .parse()
                .expect("numeric entry");
            let marker = format!("{id} 0 obj\n");
            assert!(
                bytes[offset..].starts_with(marker.as_bytes()),
                "object {id} not at offset {offset}"
            );
        }
    }

    #[test]
    fn text_is_escaped_and_win_ansi_encoded() {
        let mut pdf = PdfBuilder::a4();
        pdf.text(Font::Regular, 10.0, 0.0, 0.0, "Réf (x) \\ 5€");
        let bytes = pdf.build();
        assert!(find(&bytes, b"(R\xE9f \\(x\\) \\\\ 5\x80) Tj").is_some());
    }

    #[test]
    fn encodes_unmappable_characters_as_question_marks() {
        assert_eq!(encode_win_ansi("a\u{3b1}b"), b"a?b".to_vec());
        assert_eq!(encode_win_ansi("1\u{202F}000"), b"1 000".to_vec());
        assert_eq!(encode_win_ansi("x\u{7}y\nz"), b"xy z".to_vec());
    }

    #[test]
    fn select_page_redirects_operators() {
        let mut pdf = PdfBuilder::a4();
        pdf.add_page().add_page();
        assert_eq!(pdf.page_count(), 3);
        assert_eq!(pdf.current_page(), 2);
        pdf.select_page(0);
        assert_eq!(pdf.current_page(), 0);
        pdf.select_page(9);
        assert_eq!(pdf.current_page(), 0);
    }

    #[test]
    fn rejects_images_with_wrong_buffer_length() {
        let mut pdf = PdfBuilder::a4();
        assert!(pdf.add_image(2, 2, vec![0; 5]).is_none());
        assert!(pdf.add_image(0, 2, Vec::new()).is_none());
    }

    #[test]
    fn measures_text_with_font_metrics() {
        let regular = text_width_mm(Font::Regular, 10.0, "Total");
        let bold = text_width_mm(Font::Bold, 10.0, "Total");
        assert!(regular > 0.0);
        assert!(bold > regular);
        // "0" is 556 units: 5.56pt at 10pt.
        let zero = text_width_mm(Font::Regular, 10.0, "0");
        assert!((zero - 5.56 / PT_PER_MM).abs() < 1e-9);
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(Rgb::from_hex("#1F3A5F"), Some(Rgb::new(0x1F, 0x3A, 0x5F)));
        assert_eq!(Rgb::from_hex("ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#GG0000"), None);
    }

    #[test]
    fn info_dictionary_carries_metadata() {
        let created = DateTime::parse_from_rfc3339("2026-10-19T08:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        let pdf = PdfBuilder::a4().with_info(DocumentInfo {
            title: "Facture".to_string(),
            producer: "tests".to_string(),
            created_at: Some(created),
            ..DocumentInfo::default()
        });
        let bytes = pdf.build();
        assert!(find(&bytes, b"/Title (Facture)").is_some());
        assert!(find(&bytes, b"/CreationDate (D:20261019080000Z)").is_some());
        assert!(find(&bytes, b"/Author").is_none());
    }
}
