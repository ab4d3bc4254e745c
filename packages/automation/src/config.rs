use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Automation engine configuration loaded from environment variables.
///
/// Email credentials are optional: their absence fails the `send_email`
/// action only, never the engine itself.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resend API key. `None` means the email executor fails closed.
    pub resend_api_key: Option<String>,
    /// Sender address for outbound automation email.
    pub email_from: String,
    /// Email provider endpoint (overridable for tests).
    pub email_api_url: String,
    /// Public site URL, used for links in outbound content.
    pub site_url: Option<String>,
    /// Dispatcher queue capacity before events are dropped.
    pub queue_capacity: usize,
    /// Maximum events processed concurrently by the dispatcher pool.
    pub max_concurrency: usize,
    /// Whether the scheduled-continuation sweeper runs.
    pub resume_enabled: bool,
    /// Sweep interval in seconds.
    pub resume_interval_secs: u64,
    /// Maximum continuations claimed per sweep.
    pub resume_batch: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@fieldline.app".to_string()),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            site_url: env::var("SITE_URL").ok(),
            queue_capacity: env::var("AUTOMATION_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .context("AUTOMATION_QUEUE_CAPACITY must be a valid number")?,
            max_concurrency: env::var("AUTOMATION_MAX_CONCURRENCY")
                .unwrap_or_else(|_| "16".to_string())
                .parse()
                .context("AUTOMATION_MAX_CONCURRENCY must be a valid number")?,
            resume_enabled: env::var("AUTOMATION_RESUME_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            resume_interval_secs: env::var("AUTOMATION_RESUME_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("AUTOMATION_RESUME_INTERVAL_SECS must be a valid number")?,
            resume_batch: env::var("AUTOMATION_RESUME_BATCH")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("AUTOMATION_RESUME_BATCH must be a valid number")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            email_from: "no-reply@fieldline.app".to_string(),
            email_api_url: "https://api.resend.com/emails".to_string(),
            site_url: None,
            queue_capacity: 1024,
            max_concurrency: 16,
            resume_enabled: true,
            resume_interval_secs: 60,
            resume_batch: 50,
        }
    }
}
