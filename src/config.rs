//! Bootstrap configuration.
//!
//! Plain data with defaults; can be deserialized from any serde format and
//! overlaid with `DIST_SEQ_*` environment variables.

use crate::dist_error::DistError;
use crate::group::ThreadingMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings consumed by the bootstrap functions in [`crate::group`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Requested threading mode.
    pub threading: ThreadingMode,
    /// Receive timeout for the thread substrate; `None` blocks forever.
    pub recv_timeout_ms: Option<u64>,
    /// Overrides the host name reported by the substrate.
    pub host_name: Option<String>,
}

impl BootstrapConfig {
    pub const THREADING_VAR: &'static str = "DIST_SEQ_THREADING";
    pub const RECV_TIMEOUT_VAR: &'static str = "DIST_SEQ_RECV_TIMEOUT_MS";
    pub const HOST_VAR: &'static str = "DIST_SEQ_HOST";

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, DistError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup` for the `DIST_SEQ_*` keys.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, DistError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(Self::THREADING_VAR) {
            self.threading = mode.parse()?;
        }
        if let Some(ms) = lookup(Self::RECV_TIMEOUT_VAR) {
            let ms = ms.trim();
            self.recv_timeout_ms = Some(ms.parse().map_err(|_| {
                DistError::Bootstrap(format!(
                    "{} must be milliseconds, got `{ms}`",
                    Self::RECV_TIMEOUT_VAR
                ))
            })?);
        }
        if let Some(host) = lookup(Self::HOST_VAR).filter(|h| !h.trim().is_empty()) {
            self.host_name = Some(host.trim().to_string());
        }
        Ok(self)
    }

    pub fn with_threading(mut self, threading: ThreadingMode) -> Self {
        self.threading = threading;
        self
    }

    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.threading, ThreadingMode::Single);
        assert_eq!(cfg.recv_timeout(), None);
        assert_eq!(cfg.host_name, None);
    }

    #[test]
    fn overrides_apply() {
        let cfg = BootstrapConfig::default()
            .with_overrides(env(&[
                ("DIST_SEQ_THREADING", "serialized"),
                ("DIST_SEQ_RECV_TIMEOUT_MS", "250"),
                ("DIST_SEQ_HOST", "node3"),
            ]))
            .unwrap();
        assert_eq!(cfg.threading, ThreadingMode::Serialized);
        assert_eq!(cfg.recv_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(cfg.host_name.as_deref(), Some("node3"));
    }

    #[test]
    fn bad_override_is_an_error() {
        let err = BootstrapConfig::default()
            .with_overrides(env(&[("DIST_SEQ_RECV_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, DistError::Bootstrap(_)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: BootstrapConfig = serde_json::from_str(r#"{"threading":"funneled"}"#).unwrap();
        assert_eq!(cfg, BootstrapConfig::default().with_threading(ThreadingMode::Funneled));
    }
}
