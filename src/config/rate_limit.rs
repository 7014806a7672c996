use super::parse_bool_env;
use crate::routes::RouteGroup;
use std::{env, str::FromStr};
use thiserror::Error;

/// Token bucket for one client IP: refill rate and bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("expected per_second:burst, got '{0}'")]
    Malformed(String),
    #[error("per_second and burst must both be positive in '{0}'")]
    Zero(String),
    #[error("unknown route group '{0}' (expected submit, public or admin)")]
    UnknownGroup(String),
}

impl FromStr for RateLimitRule {
    type Err = RateLimitError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || RateLimitError::Malformed(raw.to_string());
        let (per_second, burst_size) = raw.split_once(':').ok_or_else(malformed)?;
        let per_second: u64 = per_second.trim().parse().map_err(|_| malformed())?;
        let burst_size: u32 = burst_size.trim().parse().map_err(|_| malformed())?;

        if per_second == 0 || burst_size == 0 {
            return Err(RateLimitError::Zero(raw.to_string()));
        }
        Ok(Self {
            per_second,
            burst_size,
        })
    }
}

/// Anonymous submission is the only public write, so it gets the tightest bucket.
fn default_rule(group: RouteGroup) -> RateLimitRule {
    let (per_second, burst_size) = match group {
        RouteGroup::Submit => (2, 5),
        RouteGroup::PublicRead => (30, 60),
        RouteGroup::Admin => (10, 20),
    };
    RateLimitRule {
        per_second,
        burst_size,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    rules: [RateLimitRule; 3],
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: RouteGroup::ALL.map(default_rule),
        }
    }
}

impl RateLimitConfig {
    /// `RATE_LIMIT_ENABLED` toggles limiting; `RATE_LIMIT_CONFIG` overrides
    /// rules, e.g. `"5:10"` for every group or `"submit=1:3,admin=20:40"`.
    /// An invalid override is logged and the defaults are kept.
    pub fn from_env() -> Self {
        let mut cfg = Self {
            enabled: parse_bool_env("RATE_LIMIT_ENABLED", true),
            ..Self::default()
        };

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            match cfg.with_overrides(&raw) {
                Ok(updated) => cfg = updated,
                Err(err) => tracing::warn!("Ignoring RATE_LIMIT_CONFIG '{}': {}", raw, err),
            }
        }

        cfg
    }

    pub fn rule(&self, group: RouteGroup) -> RateLimitRule {
        self.rules[group as usize]
    }

    /// Apply comma-separated overrides left to right. Nothing is applied
    /// unless every item parses.
    pub fn with_overrides(mut self, raw: &str) -> Result<Self, RateLimitError> {
        for item in raw.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            match item.split_once('=') {
                None => self.rules = [item.parse()?; 3],
                Some((name, rule)) => {
                    let group = RouteGroup::from_name(name.trim())
                        .ok_or_else(|| RateLimitError::UnknownGroup(name.trim().to_string()))?;
                    self.rules[group as usize] = rule.trim().parse()?;
                }
            }
        }
        Ok(self)
    }
}
