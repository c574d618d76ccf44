use crate::client::retry::RetryConfig;
use crate::format::NumberFormat;

#[derive(Clone, Debug)]
pub struct Config {
    /// Server origin, without a trailing slash
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    pub number_format: NumberFormat,
    pub out_dir: String,
    /// Anti-forgery token attached to multipart uploads
    pub csrf_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 30,
            retry: RetryConfig {
                max_retries: 1,
                base_delay_ms: 200,
                max_delay_ms: 3000,
                jitter_factor: 0.3,
            },
            number_format: NumberFormat::ru(),
            out_dir: "out/dashboard".to_string(),
            csrf_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: std::env::var("RESERVOIR_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.base_url),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.request_timeout_secs),
            retry: RetryConfig {
                max_retries: std::env::var("FETCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry.max_retries),
                base_delay_ms: std::env::var("RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry.base_delay_ms),
                max_delay_ms: std::env::var("RETRY_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry.max_delay_ms),
                jitter_factor: d.retry.jitter_factor,
            },
            number_format: std::env::var("NUMBER_LOCALE")
                .ok()
                .and_then(|v| NumberFormat::for_locale(&v))
                .unwrap_or(d.number_format),
            out_dir: std::env::var("OUT_DIR").unwrap_or(d.out_dir),
            csrf_token: std::env::var("CSRF_TOKEN").ok().filter(|v| !v.is_empty()),
        }
    }
}
