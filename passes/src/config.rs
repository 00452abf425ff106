use chrono::Duration;
use std::time::Duration as StdDuration;

use crate::assign::DepartmentTable;
use crate::error::PassError;
use crate::expiry::ExpiryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassesConfig {
    pub expiry: ExpiryPolicy,
    pub debounce_window: Duration,
    pub departments: DepartmentTable,
    pub hard_delete_interval: StdDuration,
    pub cleanup_interval: StdDuration,
}

impl Default for PassesConfig {
    fn default() -> Self {
        Self {
            expiry: ExpiryPolicy::default(),
            debounce_window: Duration::seconds(10),
            departments: DepartmentTable::default(),
            hard_delete_interval: StdDuration::from_secs(2 * 60),
            cleanup_interval: StdDuration::from_secs(10 * 60),
        }
    }
}

/// Read overrides from the environment. Unset variables keep their defaults;
/// malformed ones are an error naming the variable.
///
/// Durations use humantime syntax (`3days`, `24h`, `90s`).
pub fn load_from_env() -> Result<PassesConfig, PassError> {
    let mut cfg = PassesConfig::default();

    if let Some(d) = env_duration("PASS_RETENTION")? {
        cfg.expiry.retention = to_chrono("PASS_RETENTION", d)?;
    }
    if let Some(d) = env_duration("PASS_GRANT_WINDOW")? {
        cfg.expiry.grant_window = to_chrono("PASS_GRANT_WINDOW", d)?;
    }
    if let Some(d) = env_duration("PASS_URGENT_WINDOW")? {
        cfg.expiry.urgent_window = to_chrono("PASS_URGENT_WINDOW", d)?;
    }
    if let Some(d) = env_duration("PASS_DEBOUNCE_WINDOW")? {
        cfg.debounce_window = to_chrono("PASS_DEBOUNCE_WINDOW", d)?;
    }
    if let Ok(raw) = std::env::var("PASS_HOD_DEPARTMENTS") {
        cfg.departments = DepartmentTable::from_json(&raw)?;
    }
    if let Some(d) = env_duration("SWEEP_HARD_DELETE_INTERVAL")? {
        cfg.hard_delete_interval = non_zero("SWEEP_HARD_DELETE_INTERVAL", d)?;
    }
    if let Some(d) = env_duration("SWEEP_CLEANUP_INTERVAL")? {
        cfg.cleanup_interval = non_zero("SWEEP_CLEANUP_INTERVAL", d)?;
    }

    Ok(cfg)
}

fn env_duration(var: &str) -> Result<Option<StdDuration>, PassError> {
    match std::env::var(var) {
        Ok(raw) => humantime::parse_duration(raw.trim())
            .map(Some)
            .map_err(|e| PassError::Config {
                var: var.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
        Err(_) => Ok(None),
    }
}

fn to_chrono(var: &str, d: StdDuration) -> Result<Duration, PassError> {
    Duration::from_std(d).map_err(|e| PassError::Config {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn non_zero(var: &str, d: StdDuration) -> Result<StdDuration, PassError> {
    if d.is_zero() {
        return Err(PassError::Config {
            var: var.to_string(),
            message: "interval must be greater than zero".to_string(),
        });
    }
    Ok(d)
}
