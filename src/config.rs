use std::env;

/// Sweep tuning knobs. Kept separate from `Config` so tests can build them
/// without touching the environment.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Seconds between background sweep runs.
    pub interval_secs: u64,
    /// Maximum number of pending transactions examined per run.
    pub batch_size: i64,
    /// Transactions still pending past this age (seconds) are expired outright.
    pub max_age_secs: i64,
    /// A processor-reported failure only expires a transaction older than this (seconds).
    pub failure_age_secs: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5 * 60,
            batch_size: 50,
            max_age_secs: 24 * 3600,
            failure_age_secs: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,

    /// Shared secret for verifying inbound processor callbacks.
    /// When unset the webhook channel accepts unsigned requests (and warns).
    pub webhook_secret: Option<String>,
    /// Bearer secret for the /cron/reconcile trigger and admin endpoints.
    pub cron_secret: Option<String>,

    pub payplus_api_key: Option<String>,
    pub payplus_secret_key: Option<String>,
    pub payplus_page_uid: Option<String>,
    pub payplus_base_url: String,

    pub resend_api_key: Option<String>,
    pub email_from: String,

    pub sweep: SweepConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BILLING_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let sweep = SweepConfig {
            interval_secs: env_u64("SWEEP_INTERVAL_SECS", 5 * 60),
            batch_size: env_u64("SWEEP_BATCH_SIZE", 50) as i64,
            max_age_secs: env_u64("SWEEP_MAX_AGE_SECS", 24 * 3600) as i64,
            failure_age_secs: env_u64("SWEEP_FAILURE_AGE_SECS", 3600) as i64,
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "renobudget_billing.db".to_string()),
            base_url,
            dev_mode,
            webhook_secret: env::var("WEBHOOK_SECRET").ok(),
            cron_secret: env::var("CRON_SECRET").ok(),
            payplus_api_key: env::var("PAYPLUS_API_KEY").ok(),
            payplus_secret_key: env::var("PAYPLUS_SECRET_KEY").ok(),
            payplus_page_uid: env::var("PAYPLUS_PAGE_UID").ok(),
            payplus_base_url: env::var("PAYPLUS_BASE_URL")
                .unwrap_or_else(|_| "https://restapi.payplus.co.il/api/v1.0".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "RenoBudget <help@renobudget.example>".to_string()),
            sweep,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
