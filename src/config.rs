use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SHIPPING_API_BASE_URL: &str = "https://ssapi.shipstation.com";
const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
const DEFAULT_WAREHOUSE_LOCATION: &str = "5505 O Street";

/// Who owns the orders arriving from a given shipping-platform store.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BrandDescriptor {
    pub brand_id: String,
    #[serde(default)]
    pub brand_name: Option<String>,
    /// Overrides the address used for order and tracking notifications.
    #[serde(default)]
    pub notification_email: Option<String>,
}

/// How orders from a shipping-platform store are ingested.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreRoute {
    /// A brand customer's own store: brand-scoped SKU lookups.
    Brand(BrandDescriptor),
    /// A house marketplace account: no brand until a product resolves.
    Marketplace { order_source: String },
    /// Orders handled by another path (manual entry, other webhooks).
    Excluded,
}

/// An e-commerce storefront that posts order webhooks directly.
#[derive(Clone, Debug, Deserialize)]
pub struct ShopRoute {
    #[serde(flatten)]
    pub brand: BrandDescriptor,
    #[serde(default = "default_shop_order_source")]
    pub order_source: String,
    /// Shared secret used to verify `X-Shopify-Hmac-Sha256`.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Order ingestion tables: store classification and the referral fee schedule.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionConfig {
    #[serde(default)]
    pub stores: HashMap<String, StoreRoute>,

    #[serde(default)]
    pub shopify_shops: HashMap<String, ShopRoute>,

    /// Referral fee rate keyed by lowercase order source (e.g. "amazon").
    #[serde(default = "default_referral_fee_rates")]
    pub referral_fee_rates: HashMap<String, Decimal>,

    #[serde(default)]
    pub default_referral_fee_rate: Decimal,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            stores: HashMap::new(),
            shopify_shops: HashMap::new(),
            referral_fee_rates: default_referral_fee_rates(),
            default_referral_fee_rate: Decimal::ZERO,
        }
    }
}

/// Shipping platform (ShipStation) credentials and endpoints
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShippingConfig {
    #[serde(default = "default_shipping_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Ship-from location stamped on mirrored orders.
    #[serde(default = "default_warehouse_location")]
    pub warehouse_location: String,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_shipping_api_base_url(),
            api_key: None,
            api_secret: None,
            request_timeout_secs: default_request_timeout_secs(),
            warehouse_location: default_warehouse_location(),
        }
    }
}

/// Email notification settings
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// SendGrid key; when absent notifications are only logged
    #[serde(default)]
    pub sendgrid_api_key: Option<String>,
    #[serde(default = "default_sendgrid_base_url")]
    pub sendgrid_base_url: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Warehouse operations inbox, copied on new orders and unmapped SKU alerts
    #[serde(default)]
    pub ops_email: Option<String>,
    #[serde(default)]
    pub alert_on_unmapped_sku: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            sendgrid_base_url: default_sendgrid_base_url(),
            from_email: default_from_email(),
            ops_email: None,
            alert_on_unmapped_sku: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Outbox dispatcher tuning
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxConfig {
    #[serde(default = "default_true_bool")]
    pub enabled: bool,
    #[serde(default = "default_outbox_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_outbox_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_outbox_max_attempts")]
    pub max_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_outbox_poll_interval_ms(),
            batch_size: default_outbox_batch_size(),
            max_attempts: default_outbox_max_attempts(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port (1024-65535)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Maximum request body size in bytes (default 2MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    #[serde(default)]
    pub shipping: ShippingConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub outbox: OutboxConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a new configuration with defaults for every optional section
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            max_body_size: default_max_body_size(),
            shipping: ShippingConfig::default(),
            notifications: NotificationConfig::default(),
            outbox: OutboxConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.outbox.max_attempts < 1 {
            let mut err = ValidationError::new("outbox_max_attempts");
            err.message = Some("outbox.max_attempts must be at least 1".into());
            errors.add("outbox", err);
        }

        let negative_rate = self
            .ingestion
            .referral_fee_rates
            .values()
            .chain(std::iter::once(&self.ingestion.default_referral_fee_rate))
            .any(|rate| rate.is_sign_negative() || *rate > Decimal::ONE);
        if negative_rate {
            let mut err = ValidationError::new("referral_fee_rate");
            err.message = Some("referral fee rates must lie between 0 and 1".into());
            errors.add("ingestion", err);
        }

        if self.is_production()
            && (self.shipping.api_key.is_none() || self.shipping.api_secret.is_none())
        {
            let mut err = ValidationError::new("shipping_credentials_required");
            err.message = Some(
                "Set APP__SHIPPING__API_KEY and APP__SHIPPING__API_SECRET in production".into(),
            );
            errors.add("shipping", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_true_bool() -> bool {
    true
}

fn default_max_body_size() -> usize {
    2 * 1024 * 1024
}

fn default_shipping_api_base_url() -> String {
    DEFAULT_SHIPPING_API_BASE_URL.to_string()
}

fn default_sendgrid_base_url() -> String {
    DEFAULT_SENDGRID_BASE_URL.to_string()
}

fn default_warehouse_location() -> String {
    DEFAULT_WAREHOUSE_LOCATION.to_string()
}

fn default_from_email() -> String {
    "orders@localhost".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_shop_order_source() -> String {
    "shopify".to_string()
}

fn default_outbox_poll_interval_ms() -> u64 {
    500
}

fn default_outbox_batch_size() -> u64 {
    20
}

fn default_outbox_max_attempts() -> i32 {
    8
}

fn default_referral_fee_rates() -> HashMap<String, Decimal> {
    HashMap::from([
        ("amazon".to_string(), dec!(0.15)),
        ("walmart".to_string(), dec!(0.15)),
    ])
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("threepl_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // APP__* variables are deserialized into AppConfig, so OTLP export is keyed off the
    // standard exporter variable instead.
    let otel_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();

    if otel_enabled {
        use opentelemetry::KeyValue;
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::{trace as sdktrace, Resource};

        let endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4317".to_string());
        let service_name =
            env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "threepl-api".to_string());

        let resource = Resource::new(vec![KeyValue::new("service.name", service_name)]);
        let tracer = match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_trace_config(sdktrace::config().with_resource(resource))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => tracer,
            Err(err) => {
                error!("Failed to install OTLP pipeline: {}", err);
                if json {
                    let _ = fmt().with_env_filter(filter_directive).json().try_init();
                } else {
                    let _ = fmt().with_env_filter(filter_directive).try_init();
                }
                return;
            }
        };

        let base = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .with(EnvFilter::new(filter_directive));

        if json {
            let _ = base.with(fmt::layer().json()).try_init();
        } else {
            let _ = base.with(fmt::layer()).try_init();
        }
    } else if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] but reads TOML files from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://threepl.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        stores = app_config.ingestion.stores.len(),
        shops = app_config.ingestion.shopify_shops.len(),
        "Configuration loaded successfully"
    );
    Ok(app_config)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn loads_store_directory_from_toml() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            database_url = "sqlite::memory:"

            [ingestion.stores."Bessie's Best"]
            kind = "brand"
            brand_id = "ops@bessiesbest.com"
            brand_name = "Bessie's Best"

            [ingestion.stores."Hometown Amazon"]
            kind = "marketplace"
            order_source = "amazon"

            [ingestion.stores."Manual Orders"]
            kind = "excluded"

            [ingestion.shopify_shops.enduristan]
            brand_id = "login@enduristan.com"
            brand_name = "Enduristan"
            webhook_secret = "shh"
            "#
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        let stores = &cfg.ingestion.stores;
        assert_eq!(stores.len(), 3);
        assert!(stores.values().any(|route| matches!(
            route,
            StoreRoute::Marketplace { order_source } if order_source == "amazon"
        )));
        assert!(stores.values().any(|route| *route == StoreRoute::Excluded));

        let shop = cfg.ingestion.shopify_shops.get("enduristan").unwrap();
        assert_eq!(shop.brand.brand_name.as_deref(), Some("Enduristan"));
        assert_eq!(shop.order_source, "shopify");
        assert_eq!(shop.webhook_secret.as_deref(), Some("shh"));
        assert_eq!(
            cfg.ingestion.referral_fee_rates.get("amazon"),
            Some(&dec!(0.15))
        );
    }
}
