//! `facture` - bilingual PDF invoices for storefront orders.
//!
//! # Usage
//!
//! ```bash
//! # Render an order exported from the storefront
//! facture render --input order.json --lang en
//!
//! # Fetch an order from the storefront API and open the PDF
//! facture fetch 1042 --open
//!
//! # Show how an order payload is interpreted
//! facture inspect --input order.json
//!
//! # Persist display preferences
//! facture prefs currency EUR --rate 0.30
//! facture prefs language en
//! ```

#![forbid(unsafe_code)]

use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info, warn};

use storefront_invoice_lib::api::OrderClient;
use storefront_invoice_lib::config::AppConfig;
use storefront_invoice_lib::context::{AppContext, Role, SessionContext};
use storefront_invoice_lib::currency::{Currency, CurrencyContext};
use storefront_invoice_lib::db::{InvoiceLogEntry, PreferenceStore};
use storefront_invoice_lib::{diagnostics, export, render_invoice, InvoiceError, Language, Order};

/// Exit status for bad configuration or invalid option values.
const EXIT_CONFIG: i32 = 2;
const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "facture")]
#[command(author, version, long_version = storefront_invoice_lib::LONG_VERSION)]
#[command(about = "Bilingual PDF invoices for storefront orders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an invoice from an order JSON file (`-` reads stdin)
    Render {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fetch an order from the storefront API and render its invoice
    Fetch {
        /// Order id as known to the storefront backend
        order_id: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the normalised order as JSON without rendering
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List recently generated invoices
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Show or change stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Invoice language (`fr` or `en`)
    #[arg(short, long)]
    lang: Option<String>,

    /// Output directory (defaults to INVOICE_OUTPUT_DIR)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Open the PDF in the system viewer
    #[arg(long)]
    open: bool,

    /// Display currency code (`TND`, `EUR`, `USD`)
    #[arg(long)]
    currency: Option<String>,

    /// Conversion rate from TND into the display currency
    #[arg(long, requires = "currency")]
    rate: Option<f64>,
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print stored preferences and the resolved context
    Show,
    /// Set the display currency
    Currency {
        code: String,
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Set the default invoice language
    Language { lang: String },
    /// Remember the signed-in storefront user
    User {
        user_id: String,
        /// Role (`customer`, `manager`, `admin`, `guest`)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
    /// Forget the signed-in user
    Logout,
    /// Remove all stored preferences
    Clear,
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("facture: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    };

    let guard = diagnostics::init_tracing(&diagnostics::log_dir(&config.data_dir));
    info!("Starting facture v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli, config).await {
        error!("Command failed: {e:#}");
        drop(guard);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    let is_config = err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<InvoiceError>(), Some(InvoiceError::Config(_))));
    if is_config {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}

fn invalid_option(message: String) -> anyhow::Error {
    InvoiceError::Config(message).into()
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let store = PreferenceStore::open(&config.data_dir).context("opening preference store")?;
    let app = AppContext::load(&store);

    match cli.command {
        Commands::Render { input, output } => {
            let order = read_order(&input)?;
            emit_invoice(&order, &output, &config, &app, &store)?;
        }
        Commands::Fetch { order_id, output } => {
            let base_url = config
                .api_base_url
                .as_deref()
                .ok_or_else(|| invalid_option("INVOICE_API_URL is not set".to_string()))?;
            let client = OrderClient::new(base_url, &config.order_endpoint, config.http_timeout)?;
            let payload = client
                .fetch_order(&order_id, &app.session)
                .await
                .with_context(|| format!("fetching order {order_id}"))?;
            let order = Order::from_value(&payload)?;
            emit_invoice(&order, &output, &config, &app, &store)?;
        }
        Commands::Inspect { input } => {
            let order = read_order(&input)?;
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Commands::History { limit } => {
            for entry in store.recent_invoices(limit)? {
                println!(
                    "{}  {}  {} page(s)  {} warning(s)  {}",
                    entry.created_at,
                    entry.order_number,
                    entry.page_count,
                    entry.warning_count,
                    entry.output_path
                );
            }
        }
        Commands::Prefs { action } => update_prefs(action, &store, app)?,
    }
    Ok(())
}

fn read_order(input: &Path) -> anyhow::Result<Order> {
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading order from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("reading order file {}", input.display()))?
    };
    let payload: Value = serde_json::from_str(&raw).context("order input is not valid JSON")?;
    Ok(Order::from_value(&payload)?)
}

fn resolve_language(flag: Option<&str>, config: &AppConfig, app: &AppContext) -> anyhow::Result<Language> {
    match flag {
        Some(raw) => {
            Language::parse(raw).ok_or_else(|| invalid_option(format!("unsupported language {raw:?}")))
        }
        None => Ok(config.language.unwrap_or(app.language)),
    }
}

fn resolve_currency(
    code: Option<&str>,
    rate: Option<f64>,
    app: &AppContext,
) -> anyhow::Result<CurrencyContext> {
    let Some(code) = code else {
        return Ok(app.currency);
    };
    let display = Currency::from_code(code)
        .ok_or_else(|| invalid_option(format!("unsupported currency {code:?}")))?;
    let rate = match rate {
        Some(rate) => rate,
        None if display == Currency::Tnd => 1.0,
        None if app.currency.display() == display => app.currency.rate(),
        None => {
            return Err(invalid_option(format!(
                "--rate is required to display amounts in {display}"
            )))
        }
    };
    Ok(CurrencyContext::new(display, rate)?)
}

fn emit_invoice(
    order: &Order,
    output: &OutputArgs,
    config: &AppConfig,
    app: &AppContext,
    store: &PreferenceStore,
) -> anyhow::Result<()> {
    let language = resolve_language(output.lang.as_deref(), config, app)?;
    let currency = resolve_currency(output.currency.as_deref(), output.rate, app)?;
    let render = render_invoice(order, language, &config.layout_config(currency));

    let out_dir = output.out.as_deref().unwrap_or(config.output_dir.as_path());
    let path = export::deliver(&render, out_dir, output.open)?;

    let entry = InvoiceLogEntry {
        order_number: order.order_number.clone(),
        language: language.code().to_string(),
        filename: render.filename.clone(),
        output_path: path.display().to_string(),
        page_count: render.page_count as i64,
        warning_count: render.warnings.len() as i64,
        created_at: String::new(),
    };
    if let Err(e) = store.record_invoice(&entry) {
        warn!("Could not record invoice history: {e}");
    }

    for warning in &render.warnings {
        eprintln!("warning [{}]: {}", warning.code, warning.message);
    }
    println!("{}", path.display());
    Ok(())
}

fn update_prefs(action: PrefsAction, store: &PreferenceStore, mut app: AppContext) -> anyhow::Result<()> {
    match action {
        PrefsAction::Show => {
            let report = serde_json::json!({
                "stored": store.get_all_settings(),
                "resolved": app,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        PrefsAction::Currency { code, rate } => {
            app.currency = resolve_currency(Some(code.as_str()), rate, &app)?;
        }
        PrefsAction::Language { lang } => {
            app.language = Language::parse(&lang)
                .ok_or_else(|| invalid_option(format!("unsupported language {lang:?}")))?;
        }
        PrefsAction::User { user_id, role } => {
            let role = Role::from_value(&role)
                .ok_or_else(|| invalid_option(format!("unknown role {role:?}")))?;
            app.session = SessionContext::signed_in(user_id, role);
            if !app.session.is_signed_in() {
                return Err(invalid_option("user id must not be empty".to_string()));
            }
        }
        PrefsAction::Logout => app.session = SessionContext::anonymous(),
        PrefsAction::Clear => {
            AppContext::clear(store)?;
            info!("Preferences cleared");
            return Ok(());
        }
    }
    app.save(store)?;
    info!(
        language = app.language.code(),
        currency = %app.currency.display(),
        signed_in = app.session.is_signed_in(),
        "Preferences saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_option_values_exit_as_configuration_errors() {
        let app = AppContext::default();
        let config = AppConfig::default();

        let err = resolve_language(Some("de"), &config, &app).expect_err("unknown language");
        assert_eq!(exit_code(&err), EXIT_CONFIG);

        let err = resolve_currency(Some("GBP"), None, &app).expect_err("unknown currency");
        assert_eq!(exit_code(&err), EXIT_CONFIG);

        let err = resolve_currency(Some("EUR"), None, &app).expect_err("missing rate");
        assert_eq!(exit_code(&err), EXIT_CONFIG);

        let err = resolve_currency(Some("USD"), Some(-1.0), &app).expect_err("negative rate");
        assert_eq!(exit_code(&err), EXIT_CONFIG);
    }

    #[test]
    fn config_errors_keep_their_code_through_context() {
        let err = Err::<(), _>(invalid_option("bad".to_string()))
            .context("rendering invoice")
            .expect_err("error");
        assert_eq!(exit_code(&err), EXIT_CONFIG);
    }

    #[test]
    fn runtime_failures_exit_with_one() {
        let err = anyhow::Error::from(InvoiceError::Api("Order not found".to_string()));
        assert_eq!(exit_code(&err), EXIT_FAILURE);
        let err = read_order(Path::new("/nonexistent/order.json")).expect_err("missing file");
        assert_eq!(exit_code(&err), EXIT_FAILURE);
    }

    #[test]
    fn valid_options_resolve() {
        let app = AppContext::default();
        let config = AppConfig::default();
        assert_eq!(resolve_language(Some("en"), &config, &app).expect("en"), Language::En);
        assert_eq!(resolve_language(None, &config, &app).expect("default"), Language::Fr);
        let currency = resolve_currency(Some("EUR"), Some(0.3), &app).expect("eur");
        assert_eq!(currency.display(), Currency::Eur);
        assert_eq!(resolve_currency(None, None, &app).expect("base"), CurrencyContext::base());
    }
}
