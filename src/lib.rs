//! Storefront invoice generator.
//!
//! Turns storefront order JSON (as returned by the PHP order endpoints) into a
//! bilingual (French/English) A4 PDF invoice named
//! `facture_<orderNumber>_<FR|EN>.pdf`.
//!
//! The pipeline is: [`order::Order::from_value`] normalises the loose payload
//! once at the boundary, [`receipt::InvoiceModel`] resolves every printed
//! string, and [`receipt::render_invoice`] lays the document out with the
//! [`layout`] primitives over the [`pdf`] writer.

pub mod api;
pub mod config;
pub mod context;
pub mod currency;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod i18n;
pub mod layout;
pub mod logo;
pub mod order;
pub mod pdf;
pub mod receipt;

pub use error::{InvoiceError, Result};
pub use i18n::Language;
pub use order::Order;
pub use receipt::{render_invoice, InvoiceModel, InvoiceRender, LayoutConfig, RenderWarning};

/// `--version` text with the embedded build metadata.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_SHA"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Producer string written into generated documents.
pub fn producer() -> String {
    format!(
        "storefront-invoice {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_SHA")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings_carry_build_metadata() {
        assert!(LONG_VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(producer().starts_with("storefront-invoice "));
        assert!(producer().ends_with(&format!("({})", env!("BUILD_GIT_SHA"))));
        chrono::DateTime::parse_from_rfc3339(env!("BUILD_TIMESTAMP"))
            .expect("build timestamp is RFC 3339");
    }
}
