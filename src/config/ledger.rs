//! Redemption and transfer job configuration.

use serde::Deserialize;

/// Redemption configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedemptionConfig {
    /// Prefix of the scan payload `{base_url}/redeem/{token}`.
    pub base_url: String,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Step transfer job configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Accounts transferred in parallel.
    pub concurrency: usize,
    /// Watermark key for catch-up runs.
    pub job_name: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            job_name: "daily_step_transfer".to_string(),
        }
    }
}
