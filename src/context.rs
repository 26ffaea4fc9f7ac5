//! Session and display preferences, injected at the composition root.
//!
//! [`AppContext`] is plain data: the CLI loads it once from the
//! [`PreferenceStore`], passes it where needed, and saves it back after a
//! `prefs` command changes it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::currency::{Currency, CurrencyContext};
use crate::db::PreferenceStore;
use crate::error::Result;
use crate::i18n::Language;

const SESSION_CATEGORY: &str = "session";
const CURRENCY_CATEGORY: &str = "currency";
const INVOICE_CATEGORY: &str = "invoice";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Guest,
    Customer,
    Manager,
    Admin,
}

// Role names as the backends spell them.
const ROLE_TABLE: &[(&str, Role)] = &[
    ("admin", Role::Admin),
    ("administrateur", Role::Admin),
    ("administrator", Role::Admin),
    ("superadmin", Role::Admin),
    ("manager", Role::Manager),
    ("gestionnaire", Role::Manager),
    ("customer", Role::Customer),
    ("client", Role::Customer),
    ("user", Role::Customer),
    ("utilisateur", Role::Customer),
    ("guest", Role::Guest),
    ("visiteur", Role::Guest),
];

impl Role {
    pub fn from_value(value: &str) -> Option<Self> {
        let needle = value.trim().to_ascii_lowercase();
        ROLE_TABLE
            .iter()
            .find(|(name, _)| *name == needle)
            .map(|(_, role)| *role)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Customer => "customer",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub role: Role,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>, role: Role) -> Self {
        let user_id = user_id.into();
        let user_id = Some(user_id.trim().to_string()).filter(|id| !id.is_empty());
        Self { user_id, role }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppContext {
    pub session: SessionContext,
    pub currency: CurrencyContext,
    pub language: Language,
}

impl AppContext {
    /// Read persisted preferences. Invalid stored values are logged and
    /// replaced by defaults so a bad row never blocks invoice generation.
    pub fn load(store: &PreferenceStore) -> Self {
        let session = match store.get_setting(SESSION_CATEGORY, "user_id") {
            Some(user_id) => {
                let role = store
                    .get_setting(SESSION_CATEGORY, "role")
                    .map(|raw| {
                        Role::from_value(&raw).unwrap_or_else(|| {
                            warn!(role = %raw, "Unknown stored role, treating as guest");
                            Role::Guest
                        })
                    })
                    .unwrap_or_default();
                SessionContext::signed_in(user_id, role)
            }
            None => SessionContext::anonymous(),
        };

        let currency = Self::load_currency(store);
        let language = Language::from_value(
            store
                .get_setting(INVOICE_CATEGORY, "language")
                .as_deref(),
        );

        Self {
            session,
            currency,
            language,
        }
    }

    fn load_currency(store: &PreferenceStore) -> CurrencyContext {
        let Some(code) = store.get_setting(CURRENCY_CATEGORY, "code") else {
            return CurrencyContext::base();
        };
        let Some(display) = Currency::from_code(&code) else {
            warn!(code = %code, "Unknown stored currency, using base currency");
            return CurrencyContext::base();
        };
        let rate = store
            .get_setting(CURRENCY_CATEGORY, "rate")
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .unwrap_or(1.0);
        CurrencyContext::new(display, rate).unwrap_or_else(|e| {
            warn!(error = %e, "Stored currency preference rejected, using base currency");
            CurrencyContext::base()
        })
    }

    pub fn save(&self, store: &PreferenceStore) -> Result<()> {
        match &self.session.user_id {
            Some(user_id) => {
                store.set_setting(SESSION_CATEGORY, "user_id", user_id)?;
                store.set_setting(SESSION_CATEGORY, "role", self.session.role.as_str())?;
            }
            None => store.delete_all_settings(SESSION_CATEGORY)?,
        }
        store.set_setting(CURRENCY_CATEGORY, "code", self.currency.display().code())?;
        store.set_setting(CURRENCY_CATEGORY, "rate", &self.currency.rate().to_string())?;
        store.set_setting(INVOICE_CATEGORY, "language", self.language.code())?;
        Ok(())
    }

    pub fn clear(store: &PreferenceStore) -> Result<()> {
        for category in [SESSION_CATEGORY, CURRENCY_CATEGORY, INVOICE_CATEGORY] {
            store.delete_all_settings(category)?;
        }
        Ok(())
    }
}
