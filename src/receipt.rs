//! Invoice document rendering.
//!
//! [`InvoiceModel::build`] resolves every printed string (labels, localized
//! dates, converted and formatted amounts) from an [`Order`];
//! [`render_invoice`] lays the model out on A4 pages in a fixed order:
//! branded header band, invoice number and date, customer/delivery block,
//! item table, financial summary, closing message. A final pass stamps the
//! page footer on every page.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::currency::CurrencyContext;
use crate::i18n::Language;
use crate::layout::{line_height, Align, Canvas, Column, Margins, Table, TableStyle};
use crate::logo;
use crate::order::Order;
use crate::pdf::{DocumentInfo, Font, ImageId, Paint, PdfBuilder, Rgb};

const HEADER_BAND_HEIGHT: f64 = 36.0;
const LOGO_HEIGHT: f64 = 20.0;
const LOGO_MAX_WIDTH: f64 = 45.0;
const COLUMN_GAP: f64 = 10.0;
const SUMMARY_WIDTH: f64 = 85.0;
const FOOTER_RULE_OFFSET: f64 = 15.0;
const FOOTER_BASELINE_OFFSET: f64 = 10.0;

const TEXT_COLOR: Rgb = Rgb::new(33, 33, 33);
const MUTED_COLOR: Rgb = Rgb::new(110, 117, 125);
const RULE_COLOR: Rgb = Rgb::new(210, 214, 220);

// Share of the content width per item column, in display order.
const COLUMN_SHARES: [f64; 6] = [0.29, 0.15, 0.16, 0.09, 0.155, 0.155];

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub organization_name: String,
    pub store_address: Option<String>,
    pub store_phone: Option<String>,
    pub store_email: Option<String>,
    pub footer_text: Option<String>,
    pub brand_color: Rgb,
    /// Data URL, `file://` URL or path.
    pub logo_source: Option<String>,
    pub currency: CurrencyContext,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            organization_name: "Boutique".to_string(),
            store_address: None,
            store_phone: None,
            store_email: None,
            footer_text: None,
            brand_color: Rgb::new(31, 58, 95),
            logo_source: None,
            currency: CurrencyContext::base(),
        }
    }
}

impl LayoutConfig {
    fn contact_line(&self) -> Option<String> {
        let parts: Vec<&str> = [self.store_phone.as_deref(), self.store_email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join("  ·  "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderWarning {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct InvoiceRender {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub warnings: Vec<RenderWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoBlock {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub label: String,
    pub amount: String,
    pub emphasize: bool,
}

/// Everything printed on the invoice, already localized and formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceModel {
    pub language: Language,
    pub document_title: String,
    pub title: String,
    pub number_line: String,
    pub date_line: String,
    /// Status and payment method, when the order carries them.
    pub details: Vec<String>,
    pub customer: InfoBlock,
    pub delivery: InfoBlock,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub summary: Vec<SummaryLine>,
    pub notes: Option<String>,
    pub thank_you: String,
}

impl InvoiceModel {
    pub fn build(order: &Order, language: Language, currency: &CurrencyContext) -> Self {
        let labels = language.labels();
        let or_na = |value: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                labels.not_available.to_string()
            } else {
                trimmed.to_string()
            }
        };
        let line = |label: &str, value: &str| language.label_value(label, &or_na(value));

        let mut details = Vec::new();
        if let Some(status) = non_empty(order.status.as_deref()) {
            details.push(language.label_value(labels.status, status));
        }
        if let Some(method) = non_empty(order.payment_method.as_deref()) {
            details.push(language.label_value(labels.payment_method, method));
        }

        let customer = InfoBlock {
            title: labels.customer_section.to_string(),
            lines: vec![
                line(labels.name, &order.customer.name),
                line(labels.email, &order.customer.email),
                line(labels.phone, &order.customer.phone),
                line(labels.address, &order.customer.address),
                line(labels.city, &order.customer.city),
                line(labels.postal_code, &order.customer.postal_code),
                line(labels.country, &order.customer.country),
            ],
        };
        let delivery = InfoBlock {
            title: labels.delivery_section.to_string(),
            lines: vec![
                line(labels.name, &order.delivery.name),
                line(labels.phone, &order.delivery.phone),
                line(labels.address, &order.delivery.address),
                line(labels.city, &order.delivery.city),
                line(labels.postal_code, &order.delivery.postal_code),
                line(labels.country, &order.delivery.country),
            ],
        };

        let rows = order
            .items
            .iter()
            .map(|item| {
                vec![
                    or_na(&item.name),
                    non_empty(Some(&item.reference)).unwrap_or("-").to_string(),
                    item.size_color(),
                    qty(item.quantity),
                    currency.format(item.unit_price),
                    currency.format(item.line_total()),
                ]
            })
            .collect();

        let financials = &order.financials;
        let summary = vec![
            SummaryLine {
                label: labels.subtotal.to_string(),
                amount: currency.format(financials.subtotal),
                emphasize: false,
            },
            SummaryLine {
                label: labels.discount.to_string(),
                amount: currency.format(-financials.discount),
                emphasize: false,
            },
            SummaryLine {
                label: labels.shipping.to_string(),
                amount: currency.format(financials.shipping),
                emphasize: false,
            },
            SummaryLine {
                label: labels.total.to_string(),
                amount: currency.format(financials.total()),
                emphasize: true,
            },
        ];

        Self {
            language,
            document_title: labels.document_title.to_string(),
            title: labels.invoice_title.to_string(),
            number_line: line(labels.invoice_number, &order.order_number),
            date_line: language.label_value(labels.date, &language.format_raw_date(&order.order_date)),
            details,
            customer,
            delivery,
            columns: [
                labels.col_product,
                labels.col_reference,
                labels.col_size_color,
                labels.col_quantity,
                labels.col_unit_price,
                labels.col_line_total,
            ]
            .iter()
            .map(|label| label.to_string())
            .collect(),
            rows,
            summary,
            notes: non_empty(order.notes.as_deref()).map(str::to_string),
            thank_you: labels.thank_you.to_string(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn qty(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if (value.round() - value).abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// `facture_<orderNumber>_<FR|EN>.pdf`; characters unsafe in file names are
/// replaced with `_`.
pub fn invoice_filename(order_number: &str, language: Language) -> String {
    let sanitized: String = order_number
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let number = if sanitized.is_empty() {
        "NA"
    } else {
        sanitized.as_str()
    };
    format!("facture_{number}_{}.pdf", language.file_suffix())
}

fn order_warnings(order: &Order) -> Vec<RenderWarning> {
    let mut warnings: Vec<RenderWarning> = order
        .coerced_fields
        .iter()
        .map(|field| RenderWarning {
            code: "field_coerced".to_string(),
            message: format!("Field {field} was not numeric and was printed as 0"),
        })
        .collect();
    if !order.items.is_empty() && !order.financials.subtotal_supplied {
        warnings.push(RenderWarning {
            code: "subtotal_missing".to_string(),
            message: "Order has items but no subtotal; subtotal printed as 0".to_string(),
        });
    }
    warnings
}

struct PlacedLogo {
    id: ImageId,
    width: f64,
}

fn embed_logo(
    pdf: &mut PdfBuilder,
    config: &LayoutConfig,
    warnings: &mut Vec<RenderWarning>,
) -> Option<PlacedLogo> {
    let source = non_empty(config.logo_source.as_deref())?;
    let image = match logo::load_logo(source) {
        Ok(image) => image,
        Err(e) => {
            warn!(error = %e, "Logo unavailable, using text header");
            warnings.push(RenderWarning {
                code: "logo_unavailable".to_string(),
                message: format!("{e}; using text header fallback"),
            });
            return None;
        }
    };
    let width = (LOGO_HEIGHT * image.aspect_ratio()).min(LOGO_MAX_WIDTH);
    match pdf.add_image(image.width, image.height, image.rgb) {
        Some(id) => Some(PlacedLogo { id, width }),
        None => {
            warnings.push(RenderWarning {
                code: "logo_unavailable".to_string(),
                message: "Logo raster could not be embedded; using text header fallback"
                    .to_string(),
            });
            None
        }
    }
}

/// Render `order` as a paginated PDF in `language`.
pub fn render_invoice(order: &Order, language: Language, config: &LayoutConfig) -> InvoiceRender {
    let model = InvoiceModel::build(order, language, &config.currency);
    let mut warnings = order_warnings(order);

    let mut pdf = PdfBuilder::a4().with_info(DocumentInfo {
        title: model.document_title.clone(),
        author: config.organization_name.clone(),
        subject: String::new(),
        producer: crate::producer(),
        created_at: None,
    });
    let placed_logo = embed_logo(&mut pdf, config, &mut warnings);
    let mut canvas = Canvas::new(pdf, Margins::default());

    draw_header_band(&mut canvas, &model, config, placed_logo.as_ref());
    draw_invoice_meta(&mut canvas, &model);
    draw_party_blocks(&mut canvas, &model, config);
    draw_items(&mut canvas, &model, config);
    draw_summary(&mut canvas, &model, config);
    draw_closing(&mut canvas, &model, config);

    let mut pdf = canvas.into_pdf();
    stamp_footers(&mut pdf, &model, config);

    let page_count = pdf.page_count();
    let bytes = pdf.build();
    let filename = invoice_filename(&order.order_number, language);
    for warning in &warnings {
        warn!(code = %warning.code, "{}", warning.message);
    }
    info!(
        filename = %filename,
        language = language.code(),
        items = order.items.len(),
        pages = page_count,
        size = bytes.len(),
        warnings = warnings.len(),
        "Invoice rendered"
    );

    InvoiceRender {
        filename,
        bytes,
        page_count,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn draw_header_band(
    canvas: &mut Canvas,
    model: &InvoiceModel,
    config: &LayoutConfig,
    placed_logo: Option<&PlacedLogo>,
) {
    let left = canvas.left();
    let width = canvas.content_width();
    let page_width = canvas.pdf().width_mm();
    canvas
        .pdf()
        .fill_color(config.brand_color)
        .rect(0.0, 0.0, page_width, HEADER_BAND_HEIGHT, Paint::Fill);

    let mut text_x = left;
    if let Some(placed) = placed_logo {
        canvas.pdf().draw_image(placed.id, left, 8.0, placed.width, LOGO_HEIGHT);
        text_x += placed.width + 4.0;
    }

    canvas.pdf().fill_color(Rgb::WHITE);
    canvas.text_in_box(Font::Bold, 22.0, left, width, 18.0, &model.title, Align::Right);
    canvas
        .pdf()
        .text(Font::Bold, 17.0, text_x, 15.0, &config.organization_name);

    let mut baseline = 21.5;
    for line in [
        non_empty(config.store_address.as_deref()).map(str::to_string),
        config.contact_line(),
    ]
    .into_iter()
    .flatten()
    {
        canvas.pdf().text(Font::Regular, 8.5, text_x, baseline, &line);
        baseline += 4.2;
    }

    canvas.set_cursor(HEADER_BAND_HEIGHT + 8.0);
}

fn draw_invoice_meta(canvas: &mut Canvas, model: &InvoiceModel) {
    canvas.paragraph(Font::Bold, 12.0, TEXT_COLOR, &model.number_line, Align::Left);
    canvas.paragraph(Font::Regular, 10.0, TEXT_COLOR, &model.date_line, Align::Left);
    for detail in &model.details {
        canvas.paragraph(Font::Regular, 9.0, MUTED_COLOR, detail, Align::Left);
    }
    canvas.advance(5.0);
}

fn draw_party_blocks(canvas: &mut Canvas, model: &InvoiceModel, config: &LayoutConfig) {
    let column_width = (canvas.content_width() - COLUMN_GAP) / 2.0;
    let block_height = |block: &InfoBlock| {
        line_height(10.5)
            + 2.0
            + block
                .lines
                .iter()
                .map(|line| {
                    crate::layout::wrap_text(line, Font::Regular, 9.0, column_width).len() as f64
                })
                .sum::<f64>()
                * line_height(9.0)
    };
    let height = block_height(&model.customer).max(block_height(&model.delivery));
    canvas.ensure_space(height);

    let top = canvas.cursor();
    let mut bottom = top;
    for (index, block) in [&model.customer, &model.delivery].into_iter().enumerate() {
        let x = canvas.left() + index as f64 * (column_width + COLUMN_GAP);
        canvas.set_cursor(top);
        canvas.paragraph_in(
            Font::Bold,
            10.5,
            config.brand_color,
            x,
            column_width,
            &block.title,
            Align::Left,
        );
        let rule_y = canvas.cursor() + 0.5;
        canvas
            .pdf()
            .stroke_color(config.brand_color)
            .line_width(0.3)
            .line(x, rule_y, x + column_width, rule_y);
        canvas.advance(1.5);
        for line in &block.lines {
            canvas.paragraph_in(
                Font::Regular,
                9.0,
                TEXT_COLOR,
                x,
                column_width,
                line,
                Align::Left,
            );
        }
        bottom = bottom.max(canvas.cursor());
    }
    canvas.set_cursor(bottom + 6.0);
}

fn draw_items(canvas: &mut Canvas, model: &InvoiceModel, config: &LayoutConfig) {
    let content_width = canvas.content_width();
    let aligns = [
        Align::Left,
        Align::Left,
        Align::Center,
        Align::Right,
        Align::Right,
        Align::Right,
    ];
    let columns = model
        .columns
        .iter()
        .zip(COLUMN_SHARES.iter().zip(aligns))
        .map(|(header, (share, align))| Column::new(header.clone(), content_width * share, align))
        .collect();
    let table = Table::new(
        columns,
        TableStyle {
            header_fill: config.brand_color,
            ..TableStyle::default()
        },
    );
    let summary = table.draw(canvas, &model.rows);
    tracing::debug!(
        rows = summary.rows,
        first_page = summary.first_page,
        last_page = summary.last_page,
        "Item table laid out"
    );
    canvas.advance(6.0);
}

fn draw_summary(canvas: &mut Canvas, model: &InvoiceModel, config: &LayoutConfig) {
    let plain_step = line_height(10.0);
    let total_height = line_height(11.5) + 3.0;
    let plain_lines = model.summary.iter().filter(|l| !l.emphasize).count();
    canvas.ensure_space(plain_step * plain_lines as f64 + 2.0 + total_height);

    let x = canvas.right() - SUMMARY_WIDTH;
    let inner_x = x + 2.0;
    let inner_width = SUMMARY_WIDTH - 4.0;
    let block_top = canvas.cursor() - 1.0;
    for line in &model.summary {
        let top = canvas.cursor();
        if line.emphasize {
            canvas.advance(1.0);
            let top = canvas.cursor();
            canvas
                .pdf()
                .fill_color(config.brand_color)
                .rect(x, top, SUMMARY_WIDTH, total_height, Paint::Fill)
                .fill_color(Rgb::WHITE);
            let baseline = top + 1.5 + 11.5 * 0.78 / crate::pdf::PT_PER_MM;
            canvas.text_in_box(Font::Bold, 11.5, inner_x, inner_width, baseline, &line.label, Align::Left);
            canvas.text_in_box(Font::Bold, 11.5, inner_x, inner_width, baseline, &line.amount, Align::Right);
            canvas.set_cursor(top + total_height);
        } else {
            canvas.pdf().fill_color(TEXT_COLOR);
            let baseline = top + 10.0 * 0.78 / crate::pdf::PT_PER_MM;
            canvas.text_in_box(Font::Regular, 10.0, inner_x, inner_width, baseline, &line.label, Align::Left);
            canvas.text_in_box(Font::Regular, 10.0, inner_x, inner_width, baseline, &line.amount, Align::Right);
            canvas.set_cursor(top + plain_step);
        }
    }
    let block_height = canvas.cursor() - block_top;
    canvas
        .pdf()
        .stroke_color(config.brand_color)
        .line_width(0.3)
        .rect(x, block_top, SUMMARY_WIDTH, block_height, Paint::Stroke);
}

fn draw_closing(canvas: &mut Canvas, model: &InvoiceModel, config: &LayoutConfig) {
    if let Some(notes) = &model.notes {
        canvas.advance(6.0);
        let heading = model.language.labels().notes;
        canvas.paragraph(Font::Bold, 10.0, TEXT_COLOR, heading, Align::Left);
        canvas.paragraph(Font::Regular, 9.0, TEXT_COLOR, notes, Align::Left);
    }

    canvas.advance(10.0);
    canvas.paragraph(Font::Bold, 11.0, config.brand_color, &model.thank_you, Align::Center);
    if let Some(footer) = non_empty(config.footer_text.as_deref()) {
        canvas.advance(1.0);
        canvas.paragraph(Font::Regular, 9.0, MUTED_COLOR, footer, Align::Center);
    }
}

fn stamp_footers(pdf: &mut PdfBuilder, model: &InvoiceModel, config: &LayoutConfig) {
    let margins = Margins::default();
    let total = pdf.page_count();
    let (left, right) = (margins.left, pdf.width_mm() - margins.right);
    let rule_y = pdf.height_mm() - FOOTER_RULE_OFFSET;
    let baseline = pdf.height_mm() - FOOTER_BASELINE_OFFSET;
    let org_line = [Some(config.organization_name.clone()), config.contact_line()]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("  ·  ");
    let page_label = model.language.labels().page;

    for index in 0..total {
        let page_text = format!("{page_label} {} / {total}", index + 1);
        let page_x = right - crate::pdf::text_width_mm(Font::Regular, 8.0, &page_text);
        pdf.select_page(index)
            .stroke_color(RULE_COLOR)
            .line_width(0.2)
            .line(left, rule_y, right, rule_y)
            .fill_color(MUTED_COLOR)
            .text(Font::Regular, 8.0, left, baseline, &org_line)
            .text(Font::Regular, 8.0, page_x, baseline, &page_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use base64::Engine as _;
    use serde_json::json;

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    fn sample_order() -> Order {
        Order::from_value(&json!({
            "id": "17",
            "numero_commande": "CMD-2026-0017",
            "date_commande": "2026-08-03 10:15:00",
            "customer": {
                "name": "Amira Ben Salah",
                "email": "amira@example.tn",
                "phone": "+216 20 000 000",
                "address": "12 rue de Marseille",
                "city": "Tunis",
                "postalCode": "1000",
                "country": "Tunisie"
            },
            "items": [
                {"name": "Robe en lin", "reference": "RL-01", "size": "M", "color": "Bleu", "quantity": 2, "unitPrice": 45.5},
                {"name": "Foulard", "reference": "", "quantity": "1", "unitPrice": "12,00"}
            ],
            "financials": {"subtotal": 103.0, "discount": 10.0, "shipping": 7.0},
            "statut": "livrée",
            "mode_paiement": "Paiement à la livraison"
        }))
        .expect("valid order")
    }

    #[test]
    fn summary_block_is_framed_once() {
        let render = render_invoice(&sample_order(), Language::En, &LayoutConfig::default());
        assert_eq!(count(&render.bytes, b" re S"), 1);
        assert!(count(&render.bytes, b" re f") >= 2);
    }

    #[test]
    fn empty_items_render_zero_row_table() {
        let order = Order::from_value(&json!({"numero_commande": "A1", "items": []})).expect("order");
        let model = InvoiceModel::build(&order, Language::Fr, &CurrencyContext::base());
        assert!(model.rows.is_empty());
        assert_eq!(model.columns.len(), 6);

        let render = render_invoice(&order, Language::Fr, &LayoutConfig::default());
        assert!(render.bytes.starts_with(b"%PDF-1.4"));
        assert!(render.bytes.ends_with(b"%%EOF\n"));
        assert_eq!(render.page_count, 1);
        assert!(render.warnings.is_empty());
    }

    #[test]
    fn unusable_amounts_print_as_zero_never_nan() {
        let order = Order::from_value(&json!({
            "numero_commande": "A2",
            "items": [{"name": "X", "quantity": "abc", "unitPrice": null}],
            "financials": {"subtotal": "n/a", "discount": null, "shipping": {"x": 1}, "total": "NaN"}
        }))
        .expect("order");
        for language in [Language::Fr, Language::En] {
            let model = InvoiceModel::build(&order, language, &CurrencyContext::base());
            assert_eq!(model.rows[0][4], "0.00 TND");
            assert_eq!(model.rows[0][5], "0.00 TND");
            for line in &model.summary {
                assert_eq!(line.amount, "0.00 TND", "{}", line.label);
            }
            let render = render_invoice(&order, language, &LayoutConfig::default());
            assert_eq!(count(&render.bytes, b"NaN"), 0);
            assert!(render.warnings.iter().any(|w| w.code == "field_coerced"));
        }
    }

    #[test]
    fn total_is_derived_when_not_supplied() {
        let model = InvoiceModel::build(&sample_order(), Language::Fr, &CurrencyContext::base());
        let total = model.summary.last().expect("total line");
        assert!(total.emphasize);
        assert_eq!(total.amount, "100.00 TND");
        assert_eq!(model.summary[1].amount, "-10.00 TND");
    }

    #[test]
    fn supplied_total_wins_over_derivation() {
        let order = Order::from_value(&json!({
            "numero_commande": "A3",
            "financials": {"subtotal": 50, "shipping": 5, "discount": 0},
            "total_order": "49.90"
        }))
        .expect("order");
        let model = InvoiceModel::build(&order, Language::En, &CurrencyContext::base());
        assert_eq!(model.summary[3].amount, "49.90 TND");
    }

    #[test]
    fn language_switch_changes_labels_not_numbers() {
        let order = sample_order();
        let fr = InvoiceModel::build(&order, Language::Fr, &CurrencyContext::base());
        let en = InvoiceModel::build(&order, Language::En, &CurrencyContext::base());

        assert_ne!(fr.title, en.title);
        assert_ne!(fr.customer.title, en.customer.title);
        assert_ne!(fr.delivery.title, en.delivery.title);
        assert_ne!(fr.columns, en.columns);
        assert_eq!(fr.date_line, "Date : 3 août 2026");
        assert_eq!(en.date_line, "Date: August 3, 2026");

        for (fr_row, en_row) in fr.rows.iter().zip(&en.rows) {
            assert_eq!(fr_row[3..], en_row[3..]);
        }
        let amounts = |model: &InvoiceModel| {
            model
                .summary
                .iter()
                .map(|line| line.amount.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(amounts(&fr), amounts(&en));
        for (fr_line, en_line) in fr.summary.iter().zip(&en.summary).take(3) {
            assert_ne!(fr_line.label, en_line.label);
        }
    }

    #[test]
    fn each_order_number_appears_once_and_names_the_file() {
        let first = sample_order();
        let mut second = first.clone();
        second.order_id = Some("18".to_string());
        second.order_number = "CMD-2026-0018".to_string();

        let config = LayoutConfig::default();
        let a = render_invoice(&first, Language::Fr, &config);
        let b = render_invoice(&second, Language::Fr, &config);

        assert_eq!(a.filename, "facture_CMD-2026-0017_FR.pdf");
        assert_eq!(b.filename, "facture_CMD-2026-0018_FR.pdf");
        assert_eq!(count(&a.bytes, b"CMD-2026-0017"), 1);
        assert_eq!(count(&b.bytes, b"CMD-2026-0018"), 1);
        assert_eq!(count(&a.bytes, b"CMD-2026-0018"), 0);
    }

    #[test]
    fn delivery_block_mirrors_customer_when_absent() {
        let model = InvoiceModel::build(&sample_order(), Language::En, &CurrencyContext::base());
        let customer = &model.customer.lines;
        let delivery = &model.delivery.lines;
        // Delivery has no email row.
        assert_eq!(delivery[0], customer[0]);
        assert_eq!(delivery[1..], customer[2..]);
        assert_eq!(delivery[2], "Address: 12 rue de Marseille");
    }

    #[test]
    fn empty_fields_print_not_available() {
        let order = Order::from_value(&json!({"id": 5})).expect("order");
        let model = InvoiceModel::build(&order, Language::Fr, &CurrencyContext::base());
        assert_eq!(model.customer.lines[0], "Nom : N/A");
        assert_eq!(model.date_line, "Date : N/A");
        assert_eq!(model.number_line, "Facture N° : 5");
        assert!(model.details.is_empty());
        assert!(model.notes.is_none());
    }

    #[test]
    fn conditional_details_follow_the_order() {
        let model = InvoiceModel::build(&sample_order(), Language::Fr, &CurrencyContext::base());
        assert_eq!(
            model.details,
            vec![
                "Statut : livrée".to_string(),
                "Mode de paiement : Paiement à la livraison".to_string()
            ]
        );
    }

    #[test]
    fn item_rows_format_quantity_and_size_color() {
        let model = InvoiceModel::build(&sample_order(), Language::En, &CurrencyContext::base());
        assert_eq!(
            model.rows[0],
            vec!["Robe en lin", "RL-01", "M / Bleu", "2", "45.50 TND", "91.00 TND"]
        );
        assert_eq!(model.rows[1][1], "-");
        assert_eq!(model.rows[1][2], "- / -");
        assert_eq!(model.rows[1][5], "12.00 TND");
    }

    #[test]
    fn display_currency_converts_amounts() {
        let eur = CurrencyContext::new(Currency::Eur, 0.3).expect("rate");
        let model = InvoiceModel::build(&sample_order(), Language::Fr, &eur);
        assert_eq!(model.summary[3].amount, "30.00 EUR");
        assert_eq!(model.rows[0][4], "13.65 EUR");
    }

    #[test]
    fn long_orders_paginate_with_numbered_footers() {
        let items: Vec<_> = (0..90)
            .map(|i| json!({"name": format!("Article {i}"), "quantity": 1, "unitPrice": 10}))
            .collect();
        let order = Order::from_value(&json!({
            "numero_commande": "BIG-1",
            "items": items,
            "sous_total": 900
        }))
        .expect("order");
        let render = render_invoice(&order, Language::En, &LayoutConfig::default());
        assert!(render.page_count >= 3);
        let first = format!("Page 1 / {}", render.page_count);
        let last = format!("Page {0} / {0}", render.page_count);
        assert_eq!(count(&render.bytes, first.as_bytes()), 1);
        assert_eq!(count(&render.bytes, last.as_bytes()), 1);
        assert_eq!(count(&render.bytes, b"/Type /Page "), render.page_count);
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(invoice_filename("CMD/12 34", Language::En), "facture_CMD_12_34_EN.pdf");
        assert_eq!(invoice_filename("  ", Language::Fr), "facture_NA_FR.pdf");
    }

    #[test]
    fn missing_subtotal_with_items_is_flagged() {
        let order = Order::from_value(&json!({
            "numero_commande": "A4",
            "items": [{"name": "X", "quantity": 1, "unitPrice": 5}]
        }))
        .expect("order");
        let render = render_invoice(&order, Language::Fr, &LayoutConfig::default());
        assert!(render.warnings.iter().any(|w| w.code == "subtotal_missing"));
    }

    #[test]
    fn broken_logo_falls_back_to_text_header() {
        let config = LayoutConfig {
            logo_source: Some("/nonexistent/logo.png".to_string()),
            ..LayoutConfig::default()
        };
        let render = render_invoice(&sample_order(), Language::Fr, &config);
        assert!(render.warnings.iter().any(|w| w.code == "logo_unavailable"));
        assert_eq!(count(&render.bytes, b"/Subtype /Image"), 0);
    }

    #[test]
    fn valid_logo_is_embedded() {
        let img = image::RgbImage::from_pixel(8, 4, image::Rgb([10, 20, 30]));
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut png, image::ImageFormat::Png)
            .expect("encode png");
        let encoded = base64::engine::general_purpose::STANDARD.encode(png.into_inner());
        let config = LayoutConfig {
            logo_source: Some(format!("data:image/png;base64,{encoded}")),
            ..LayoutConfig::default()
        };
        let render = render_invoice(&sample_order(), Language::Fr, &config);
        assert_eq!(count(&render.bytes, b"/Subtype /Image"), 1);
        assert!(render.warnings.iter().all(|w| w.code != "logo_unavailable"));
    }
}
