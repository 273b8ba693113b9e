use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://assessment.ksensetech.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PAGE_LIMIT: u32 = 20;
const DEFAULT_MAX_PAGE_FAILURES: u32 = 3;

/// Connection settings for the patient API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub page_limit: u32,
    pub max_page_failures: u32,
}

impl ApiSettings {
    pub const ENV_PREFIX: &'static str = "PATIENT_RISK_";
    pub const API_KEY: &'static str = "api_key";
    pub const BASE_URL: &'static str = "base_url";
    pub const TIMEOUT: &'static str = "timeout";
    pub const PAGE_LIMIT: &'static str = "page_limit";
    pub const MAX_PAGE_FAILURES: &'static str = "max_page_failures";

    /// Load settings from environment variables.
    ///
    /// * `PATIENT_RISK_API_KEY` — API token sent as `x-api-key` (required).
    /// * `PATIENT_RISK_BASE_URL` — API origin (default: `https://assessment.ksensetech.com`).
    /// * `PATIENT_RISK_TIMEOUT` — per-request timeout, e.g. `10s` or `750ms` (default: `10s`).
    /// * `PATIENT_RISK_PAGE_LIMIT` — records per page (default: 20).
    /// * `PATIENT_RISK_MAX_PAGE_FAILURES` — exhausted retry rounds tolerated on one page
    ///   before traversal stops (default: 3).
    pub fn from_env() -> Result<Self> {
        let vars = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(Self::ENV_PREFIX)
                    .map(|name| (name.to_ascii_lowercase(), value))
            })
            .collect();
        Self::from_map(vars)
    }

    /// Build settings from lowercase keys (`api_key`, `base_url`, ...).
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = lookup(Self::API_KEY).with_context(|| {
            format!(
                "{}{} must be set to the patient API key",
                Self::ENV_PREFIX,
                Self::API_KEY.to_ascii_uppercase()
            )
        })?;
        let base_url = lookup(Self::BASE_URL)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let timeout = match lookup(Self::TIMEOUT) {
            Some(raw) => humantime::parse_duration(&raw)
                .with_context(|| format!("invalid timeout `{raw}`"))?,
            None => DEFAULT_TIMEOUT,
        };
        let page_limit = parse_positive(lookup(Self::PAGE_LIMIT), Self::PAGE_LIMIT)?
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        let max_page_failures =
            parse_positive(lookup(Self::MAX_PAGE_FAILURES), Self::MAX_PAGE_FAILURES)?
                .unwrap_or(DEFAULT_MAX_PAGE_FAILURES);

        Ok(Self {
            api_key,
            base_url,
            timeout,
            page_limit,
            max_page_failures,
        })
    }

    /// Collection endpoint for one page; page 1 omits the `page` parameter.
    pub fn page_url(&self, limit: u32, page: u32) -> String {
        if page <= 1 {
            format!("{}/api/patients?limit={}", self.base_url, limit)
        } else {
            format!(
                "{}/api/patients?limit={}&page={}",
                self.base_url, limit, page
            )
        }
    }
}

fn parse_positive(raw: Option<String>, key: &str) -> Result<Option<u32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: u32 = raw
        .parse()
        .with_context(|| format!("{key} must be a positive integer (got `{raw}`)"))?;
    if value == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Some(value))
}
