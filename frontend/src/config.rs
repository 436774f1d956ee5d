use anyhow::anyhow;
use std::{env, time::Duration};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_DEDUPE_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Option<Duration>,
    pub dedupe_interval: Duration,
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: None,
            dedupe_interval: Duration::from_millis(DEFAULT_DEDUPE_INTERVAL_MS),
            access_token: None,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_base_url = lookup("HRMS_API_BASE_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let request_timeout = match lookup("HRMS_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid HRMS_REQUEST_TIMEOUT_SECS value: {}", raw))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let dedupe_interval_ms = match lookup("HRMS_DEDUPE_INTERVAL_MS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid HRMS_DEDUPE_INTERVAL_MS value: {}", raw))?,
            None => DEFAULT_DEDUPE_INTERVAL_MS,
        };

        let access_token = lookup("HRMS_ACCESS_TOKEN").filter(|value| !value.is_empty());

        Ok(Config {
            api_base_url,
            request_timeout,
            dedupe_interval: Duration::from_millis(dedupe_interval_ms),
            access_token,
        })
    }
}
