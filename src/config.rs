//! Process configuration from `INVOICE_*` environment variables.
//!
//! The CLI loads a `.env` file first (dotenvy), then calls
//! [`AppConfig::from_env`]. Command-line flags override individual fields
//! afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::DEFAULT_TIMEOUT;
use crate::currency::CurrencyContext;
use crate::diagnostics;
use crate::error::{InvoiceError, Result};
use crate::i18n::Language;
use crate::pdf::Rgb;
use crate::receipt::LayoutConfig;

pub const DEFAULT_ORDER_ENDPOINT: &str = "get_order.php";
pub const DEFAULT_OUTPUT_DIR: &str = "invoices";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: Option<String>,
    pub order_endpoint: String,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Forced invoice language; `None` defers to the stored preference.
    pub language: Option<Language>,
    pub organization_name: String,
    pub store_address: Option<String>,
    pub store_phone: Option<String>,
    pub store_email: Option<String>,
    pub footer_text: Option<String>,
    pub logo_source: Option<String>,
    pub brand_color: Rgb,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let layout = LayoutConfig::default();
        Self {
            api_base_url: None,
            order_endpoint: DEFAULT_ORDER_ENDPOINT.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            data_dir: diagnostics::default_data_dir(),
            language: None,
            organization_name: layout.organization_name,
            store_address: None,
            store_phone: None,
            store_email: None,
            footer_text: None,
            logo_source: None,
            brand_color: layout.brand_color,
            http_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        config.api_base_url = get("INVOICE_API_URL");
        if let Some(endpoint) = get("INVOICE_ORDER_ENDPOINT") {
            config.order_endpoint = endpoint;
        }
        if let Some(dir) = get("INVOICE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("INVOICE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("INVOICE_LANG") {
            config.language = Some(Language::parse(&raw).ok_or_else(|| {
                InvoiceError::Config(format!("INVOICE_LANG must be fr or en, got {raw:?}"))
            })?);
        }
        if let Some(name) = get("INVOICE_ORG_NAME") {
            config.organization_name = name;
        }
        config.store_address = get("INVOICE_STORE_ADDRESS");
        config.store_phone = get("INVOICE_STORE_PHONE");
        config.store_email = get("INVOICE_STORE_EMAIL");
        config.footer_text = get("INVOICE_FOOTER");
        config.logo_source = get("INVOICE_LOGO");
        if let Some(raw) = get("INVOICE_BRAND_COLOR") {
            config.brand_color = parse_brand_color(&raw)?;
        }
        if let Some(raw) = get("INVOICE_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                InvoiceError::Config(format!(
                    "INVOICE_HTTP_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            if secs == 0 {
                return Err(InvoiceError::Config(
                    "INVOICE_HTTP_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn layout_config(&self, currency: CurrencyContext) -> LayoutConfig {
        LayoutConfig {
            organization_name: self.organization_name.clone(),
            store_address: self.store_address.clone(),
            store_phone: self.store_phone.clone(),
            store_email: self.store_email.clone(),
            footer_text: self.footer_text.clone(),
            brand_color: self.brand_color,
            logo_source: self.logo_source.clone(),
            currency,
        }
    }
}

pub fn parse_brand_color(raw: &str) -> Result<Rgb> {
    Rgb::from_hex(raw).ok_or_else(|| {
        InvoiceError::Config(format!(
            "INVOICE_BRAND_COLOR must look like #1F3A5F, got {raw:?}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.order_endpoint, DEFAULT_ORDER_ENDPOINT);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.language, None);
        assert_eq!(config.http_timeout, DEFAULT_TIMEOUT);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("INVOICE_API_URL", "shop.example.tn/api"),
            ("INVOICE_ORDER_ENDPOINT", "commande.php"),
            ("INVOICE_OUTPUT_DIR", "/tmp/factures"),
            ("INVOICE_DATA_DIR", "/tmp/data"),
            ("INVOICE_LANG", "en"),
            ("INVOICE_ORG_NAME", "Dattes du Sud"),
            ("INVOICE_STORE_ADDRESS", "Avenue Habib Bourguiba, Tozeur"),
            ("INVOICE_STORE_PHONE", "+216 76 000 000"),
            ("INVOICE_STORE_EMAIL", "contact@dattes.tn"),
            ("INVOICE_FOOTER", "Livraison sous 48h"),
            ("INVOICE_LOGO", "/srv/logo.png"),
            ("INVOICE_BRAND_COLOR", "#8B5A2B"),
            ("INVOICE_HTTP_TIMEOUT_SECS", "12"),
        ]))
        .expect("config");

        assert_eq!(config.api_base_url.as_deref(), Some("shop.example.tn/api"));
        assert_eq!(config.order_endpoint, "commande.php");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/factures"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.language, Some(Language::En));
        assert_eq!(config.brand_color, Rgb::new(0x8B, 0x5A, 0x2B));
        assert_eq!(config.http_timeout, Duration::from_secs(12));

        let layout = config.layout_config(CurrencyContext::base());
        assert_eq!(layout.organization_name, "Dattes du Sud");
        assert_eq!(layout.footer_text.as_deref(), Some("Livraison sous 48h"));
        assert_eq!(layout.logo_source.as_deref(), Some("/srv/logo.png"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = AppConfig::from_lookup(lookup(&[("INVOICE_ORG_NAME", "   "), ("INVOICE_LOGO", "")]))
            .expect("config");
        assert_eq!(config.organization_name, LayoutConfig::default().organization_name);
        assert!(config.logo_source.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        for (key, value) in [
            ("INVOICE_LANG", "de"),
            ("INVOICE_BRAND_COLOR", "blue"),
            ("INVOICE_HTTP_TIMEOUT_SECS", "soon"),
            ("INVOICE_HTTP_TIMEOUT_SECS", "0"),
        ] {
            let result = AppConfig::from_lookup(lookup(&[(key, value)]));
            assert!(
                matches!(result, Err(InvoiceError::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        std::env::set_var("INVOICE_ORDER_ENDPOINT", "order_details.php");
        std::env::set_var("INVOICE_LANG", "fr");
        let config = AppConfig::from_env();
        std::env::remove_var("INVOICE_ORDER_ENDPOINT");
        std::env::remove_var("INVOICE_LANG");

        let config = config.expect("config");
        assert_eq!(config.order_endpoint, "order_details.php");
        assert_eq!(config.language, Some(Language::Fr));
    }
}
