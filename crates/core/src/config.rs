//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the core services as
//! `Arc<CoreConfig>`. Request handling never reads process-wide environment variables; the
//! `*_from_env_value` helpers take the already-read value so binaries decide where it comes
//! from.

use crate::constants::{
    DEFAULT_MAX_TRIPLES_PER_SHARE, DEFAULT_NO_ORGANISATION_PLACEHOLDERS,
    DEFAULT_UNKNOWN_ORGANISATION_LABEL,
};
use crate::{ConsultError, ConsultResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    no_organisation_placeholders: Vec<String>,
    unknown_organisation_label: String,
    max_triples_per_share: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            no_organisation_placeholders: DEFAULT_NO_ORGANISATION_PLACEHOLDERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            unknown_organisation_label: DEFAULT_UNKNOWN_ORGANISATION_LABEL.to_string(),
            max_triples_per_share: DEFAULT_MAX_TRIPLES_PER_SHARE,
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsultError::InvalidInput`] if the unknown-organisation label is blank, if it
    /// is itself one of the placeholders, or if `max_triples_per_share` is zero.
    pub fn new(
        no_organisation_placeholders: Vec<String>,
        unknown_organisation_label: String,
        max_triples_per_share: usize,
    ) -> ConsultResult<Self> {
        let unknown_organisation_label = unknown_organisation_label.trim().to_string();
        if unknown_organisation_label.is_empty() {
            return Err(ConsultError::InvalidInput(
                "unknown_organisation_label cannot be empty".into(),
            ));
        }

        let no_organisation_placeholders: Vec<String> = no_organisation_placeholders
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if no_organisation_placeholders.contains(&unknown_organisation_label) {
            return Err(ConsultError::InvalidInput(
                "unknown_organisation_label cannot also be a placeholder".into(),
            ));
        }

        if max_triples_per_share == 0 {
            return Err(ConsultError::InvalidInput(
                "max_triples_per_share must be at least 1".into(),
            ));
        }

        Ok(Self {
            no_organisation_placeholders,
            unknown_organisation_label,
            max_triples_per_share,
        })
    }

    pub fn no_organisation_placeholders(&self) -> &[String] {
        &self.no_organisation_placeholders
    }

    /// True when `value` means "no organisation". Comparison is exact after trimming.
    pub fn is_no_organisation(&self, value: &str) -> bool {
        let value = value.trim();
        self.no_organisation_placeholders.iter().any(|p| p == value)
    }

    pub fn unknown_organisation_label(&self) -> &str {
        &self.unknown_organisation_label
    }

    pub fn max_triples_per_share(&self) -> usize {
        self.max_triples_per_share
    }
}

/// Parse the placeholder list from an optional comma-separated value.
///
/// `None` or a blank value yields the defaults.
pub fn placeholders_from_env_value(value: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if parsed.is_empty() {
        return CoreConfig::default().no_organisation_placeholders;
    }
    parsed
}

/// Parse the unknown-organisation label; blank or absent yields the default.
pub fn unknown_label_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_UNKNOWN_ORGANISATION_LABEL.to_string())
}

/// Parse the share size bound; blank or absent yields the default.
pub fn max_triples_from_env_value(value: Option<String>) -> ConsultResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MAX_TRIPLES_PER_SHARE),
        Some(v) => v.parse::<usize>().map_err(|e| {
            ConsultError::InvalidInput(format!("invalid max triples per share '{v}': {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_recognises_placeholders() {
        let cfg = CoreConfig::default();
        assert!(cfg.is_no_organisation("无"));
        assert!(cfg.is_no_organisation(" none "));
        assert!(!cfg.is_no_organisation("Hosp1"));
        assert_eq!(cfg.unknown_organisation_label(), "unknown organisation");
    }

    #[test]
    fn new_rejects_bad_values() {
        assert!(CoreConfig::new(vec![], "  ".into(), 10).is_err());
        assert!(CoreConfig::new(vec!["n/a".into()], "n/a".into(), 10).is_err());
        assert!(CoreConfig::new(vec![], "unknown".into(), 0).is_err());

        let cfg = CoreConfig::new(vec![" n/a ".into(), "".into()], "unknown".into(), 3).unwrap();
        assert_eq!(cfg.no_organisation_placeholders(), ["n/a".to_string()]);
        assert_eq!(cfg.max_triples_per_share(), 3);
    }

    #[test]
    fn env_value_helpers_fall_back_to_defaults() {
        assert_eq!(
            placeholders_from_env_value(None),
            CoreConfig::default().no_organisation_placeholders()
        );
        assert_eq!(
            placeholders_from_env_value(Some("-, n/a ,".into())),
            vec!["-".to_string(), "n/a".to_string()]
        );
        assert_eq!(unknown_label_from_env_value(Some(" ".into())), "unknown organisation");
        assert_eq!(max_triples_from_env_value(None).unwrap(), 500);
        assert_eq!(max_triples_from_env_value(Some("20".into())).unwrap(), 20);
        assert!(max_triples_from_env_value(Some("many".into())).is_err());
    }
}
