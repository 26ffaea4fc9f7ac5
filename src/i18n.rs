//! Invoice languages: label tables and localized dates.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
}

/// Every user-visible string printed on the invoice.
#[derive(Debug)]
pub struct Labels {
    pub document_title: &'static str,
    pub invoice_title: &'static str,
    pub invoice_number: &'static str,
    pub date: &'static str,
    pub status: &'static str,
    pub payment_method: &'static str,
    pub customer_section: &'static str,
    pub delivery_section: &'static str,
    pub name: &'static str,
    pub email: &'static str,
    pub phone: &'static str,
    pub address: &'static str,
    pub city: &'static str,
    pub postal_code: &'static str,
    pub country: &'static str,
    pub col_product: &'static str,
    pub col_reference: &'static str,
    pub col_size_color: &'static str,
    pub col_quantity: &'static str,
    pub col_unit_price: &'static str,
    pub col_line_total: &'static str,
    pub subtotal: &'static str,
    pub discount: &'static str,
    pub shipping: &'static str,
    pub total: &'static str,
    pub notes: &'static str,
    pub thank_you: &'static str,
    pub page: &'static str,
    pub not_available: &'static str,
}

static FR_LABELS: Labels = Labels {
    document_title: "Facture",
    invoice_title: "FACTURE",
    invoice_number: "Facture N°",
    date: "Date",
    status: "Statut",
    payment_method: "Mode de paiement",
    customer_section: "Informations client",
    delivery_section: "Adresse de livraison",
    name: "Nom",
    email: "Email",
    phone: "Téléphone",
    address: "Adresse",
    city: "Ville",
    postal_code: "Code postal",
    country: "Pays",
    col_product: "Produit",
    col_reference: "Référence",
    col_size_color: "Taille/Couleur",
    col_quantity: "Qté",
    col_unit_price: "Prix unitaire",
    col_line_total: "Total",
    subtotal: "Sous-total",
    discount: "Remise",
    shipping: "Frais de livraison",
    total: "Total",
    notes: "Remarques",
    thank_you: "Merci pour votre commande !",
    page: "Page",
    not_available: "N/A",
};

static EN_LABELS: Labels = Labels {
    document_title: "Invoice",
    invoice_title: "INVOICE",
    invoice_number: "Invoice No.",
    date: "Date",
    status: "Status",
    payment_method: "Payment method",
    customer_section: "Customer information",
    delivery_section: "Delivery address",
    name: "Name",
    email: "Email",
    phone: "Phone",
    address: "Address",
    city: "City",
    postal_code: "Postal code",
    country: "Country",
    col_product: "Product",
    col_reference: "Reference",
    col_size_color: "Size/Color",
    col_quantity: "Quantity",
    col_unit_price: "Unit Price",
    col_line_total: "Line Total",
    subtotal: "Subtotal",
    discount: "Discount",
    shipping: "Shipping",
    total: "Total",
    notes: "Notes",
    thank_you: "Thank you for your order!",
    page: "Page",
    not_available: "N/A",
};

const MONTHS_FR: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl Language {
    /// Lenient lookup used for stored preferences; anything unknown is French.
    pub fn from_value(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fr" | "fr-fr" | "fr_fr" | "french" | "francais" | "français" => Some(Self::Fr),
            "en" | "en-us" | "en-gb" | "en_us" | "english" | "anglais" => Some(Self::En),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
        }
    }

    /// Uppercase tag used in artifact file names.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Language::Fr => "FR",
            Language::En => "EN",
        }
    }

    pub fn labels(self) -> &'static Labels {
        match self {
            Language::Fr => &FR_LABELS,
            Language::En => &EN_LABELS,
        }
    }

    /// French typography puts a space before the colon.
    pub fn label_value(self, label: &str, value: &str) -> String {
        match self {
            Language::Fr => format!("{label} : {value}"),
            Language::En => format!("{label}: {value}"),
        }
    }

    pub fn format_date(self, date: NaiveDate) -> String {
        let month_index = date.month0() as usize;
        match self {
            Language::Fr => format!(
                "{} {} {}",
                date.day(),
                MONTHS_FR.get(month_index).copied().unwrap_or_default(),
                date.year()
            ),
            Language::En => format!(
                "{} {}, {}",
                MONTHS_EN.get(month_index).copied().unwrap_or_default(),
                date.day(),
                date.year()
            ),
        }
    }

    /// Localize a raw order date. Unrecognised formats are printed verbatim,
    /// an empty value prints the "not available" label.
    pub fn format_raw_date(self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.labels().not_available.to_string();
        }
        match parse_order_date(trimmed) {
            Some(date) => self.format_date(date),
            None => trimmed.to_string(),
        }
    }
}

/// Accepts RFC 3339, the MySQL `DATETIME` layout the PHP backend emits, and
/// plain dates.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.date_naive());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed.date());
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    None
}
