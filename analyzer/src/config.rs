//! Analyzer configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `ANALYZER_*` environment variables. The CLI applies its own flags last.
//!
//! ```toml
//! input = "benchmarks.csv"
//! output = "enhanced_benchmarks.csv"
//! identity = "declared"
//! update_gate = "when_stale"
//! static_metrics = ["num_samples", "num_classes"]
//! updatable_metrics = ["citation_count"]
//!
//! [update_frequency_days]
//! citation_count = 14
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::benchmark::IdentityPolicy;
use crate::clock::SharedClock;
use crate::metrics::{
    AvgTextLengthMetric, CitationCountMetric, DownloadCountMetric, MetricKind, MetricRegistry,
    NumClassesMetric, NumSamplesMetric,
};
use crate::processor::{Processor, ProcessorOptions, UpdateGate};

/// Prefix of environment variables read by [`AnalyzerConfig::apply_env`]
pub const ENV_PREFIX: &str = "ANALYZER_";

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown {kind} metric '{name}'")]
    UnknownMetric { kind: MetricKind, name: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Settings for one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// CSV of benchmark records
    pub input: Option<PathBuf>,
    /// Destination of the result CSV
    pub output: Option<PathBuf>,
    /// Optional JSON export of updatable-metric histories
    pub history_output: Option<PathBuf>,
    /// Split YAML dataset-card export; when set, benchmarks are card-backed
    pub card_source: Option<PathBuf>,
    pub identity: IdentityPolicy,
    pub update_gate: UpdateGate,
    pub refresh_before_run: bool,
    pub static_metrics: Vec<String>,
    pub updatable_metrics: Vec<String>,
    /// Per-metric override of the staleness window
    pub update_frequency_days: BTreeMap<String, u32>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            history_output: None,
            card_source: None,
            identity: IdentityPolicy::default(),
            update_gate: UpdateGate::default(),
            refresh_before_run: false,
            static_metrics: vec![
                NumSamplesMetric::NAME.to_string(),
                AvgTextLengthMetric::NAME.to_string(),
                NumClassesMetric::NAME.to_string(),
            ],
            updatable_metrics: vec![
                CitationCountMetric::NAME.to_string(),
                DownloadCountMetric::NAME.to_string(),
            ],
            update_frequency_days: BTreeMap::new(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("'{other}' is not a boolean"))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl AnalyzerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded analyzer config");
        Ok(config)
    }

    /// Apply `ANALYZER_*` overrides from the process environment
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_vars(std::env::vars())
    }

    /// Apply `ANALYZER_*` overrides from an arbitrary set of variables.
    ///
    /// Unrelated variables are ignored; a recognised variable with an
    /// unparseable value is an error.
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.as_ref();
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "INPUT" => self.input = Some(PathBuf::from(value)),
                "OUTPUT" => self.output = Some(PathBuf::from(value)),
                "HISTORY_OUTPUT" => self.history_output = Some(PathBuf::from(value)),
                "CARD_SOURCE" => self.card_source = Some(PathBuf::from(value)),
                "IDENTITY" => {
                    self.identity = value.parse().map_err(|e| ConfigError::invalid(key, e))?
                }
                "UPDATE_GATE" => {
                    self.update_gate = value.parse().map_err(|e| ConfigError::invalid(key, e))?
                }
                "REFRESH" => self.refresh_before_run = parse_bool(key, value)?,
                "STATIC_METRICS" => self.static_metrics = parse_list(value),
                "UPDATABLE_METRICS" => self.updatable_metrics = parse_list(value),
                _ => continue,
            }
            debug!(var = key, "Applied environment override");
        }
        Ok(())
    }

    /// Check every configured metric name against the registry
    pub fn validate(&self, registry: &MetricRegistry) -> ConfigResult<()> {
        let groups = [
            (MetricKind::Static, &self.static_metrics),
            (MetricKind::Updatable, &self.updatable_metrics),
        ];
        for (kind, names) in groups {
            for name in names {
                if name.trim().is_empty() {
                    return Err(ConfigError::invalid(
                        format!("{kind}_metrics"),
                        "metric names must not be empty",
                    ));
                }
                if !registry.contains(kind, name) {
                    return Err(ConfigError::UnknownMetric {
                        kind,
                        name: name.clone(),
                    });
                }
            }
        }

        for name in self.update_frequency_days.keys() {
            if !self.updatable_metrics.contains(name) {
                return Err(ConfigError::invalid(
                    "update_frequency_days",
                    format!("'{name}' is not a configured updatable metric"),
                ));
            }
        }
        Ok(())
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            update_gate: self.update_gate,
            refresh_before_run: self.refresh_before_run,
        }
    }

    /// Validate, then build a processor with fresh metrics in configured order
    pub fn build_processor(
        &self,
        registry: &MetricRegistry,
        clock: SharedClock,
    ) -> ConfigResult<Processor> {
        self.validate(registry)?;

        let mut statics = Vec::with_capacity(self.static_metrics.len());
        for name in &self.static_metrics {
            let metric = registry
                .create_static(name)
                .ok_or_else(|| ConfigError::UnknownMetric {
                    kind: MetricKind::Static,
                    name: name.clone(),
                })?;
            statics.push(metric.with_identity(self.identity));
        }

        let mut updatables = Vec::with_capacity(self.updatable_metrics.len());
        for name in &self.updatable_metrics {
            let mut metric = registry
                .create_updatable(name)
                .ok_or_else(|| ConfigError::UnknownMetric {
                    kind: MetricKind::Updatable,
                    name: name.clone(),
                })?
                .with_identity(self.identity)
                .with_clock(clock.clone());
            if let Some(days) = self.update_frequency_days.get(name) {
                metric = metric.with_update_frequency_days(*days);
            }
            updatables.push(metric);
        }

        Ok(Processor::new(statics, updatables).with_options(self.processor_options()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::Arc;

    #[test]
    fn test_defaults_match_builtin_set() {
        let config = AnalyzerConfig::default();
        assert_eq!(
            config.static_metrics,
            ["num_samples", "avg_text_length", "num_classes"]
        );
        assert_eq!(config.updatable_metrics, ["citation_count", "download_count"]);
        assert_eq!(config.identity, IdentityPolicy::Instance);
        assert_eq!(config.update_gate, UpdateGate::Always);
        config.validate(&MetricRegistry::builtin()).unwrap();
    }

    #[test]
    fn test_toml_partial_override() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
input = "in.csv"
identity = "declared"
update_gate = "when_stale"
updatable_metrics = ["citation_count"]

[update_frequency_days]
citation_count = 14
"#,
        )
        .unwrap();

        assert_eq!(config.input, Some(PathBuf::from("in.csv")));
        assert_eq!(config.identity, IdentityPolicy::Declared);
        assert_eq!(config.update_gate, UpdateGate::WhenStale);
        assert_eq!(config.static_metrics.len(), 3);
        assert_eq!(config.update_frequency_days.get("citation_count"), Some(&14));
    }

    #[test]
    fn test_toml_rejects_bad_enum() {
        let err = AnalyzerConfig::from_toml_str("identity = \"object\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_apply_vars() {
        let mut config = AnalyzerConfig::default();
        config
            .apply_vars([
                ("ANALYZER_INPUT", "a.csv"),
                ("ANALYZER_REFRESH", "yes"),
                ("ANALYZER_STATIC_METRICS", "num_samples, ,num_hf_likes"),
                ("ANALYZER_IDENTITY", "declared"),
                ("HOME", "/root"),
            ])
            .unwrap();

        assert_eq!(config.input, Some(PathBuf::from("a.csv")));
        assert!(config.refresh_before_run);
        assert_eq!(config.static_metrics, ["num_samples", "num_hf_likes"]);
        assert_eq!(config.identity, IdentityPolicy::Declared);

        let err = config
            .apply_vars([("ANALYZER_REFRESH", "maybe")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_and_empty_names() {
        let registry = MetricRegistry::builtin();

        let mut config = AnalyzerConfig::default();
        config.static_metrics.push("citation_count".into());
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::UnknownMetric {
                kind: MetricKind::Static,
                ..
            })
        ));

        let mut config = AnalyzerConfig::default();
        config.updatable_metrics.push("  ".into());
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut config = AnalyzerConfig::default();
        config.update_frequency_days.insert("num_samples".into(), 3);
        assert!(config.validate(&registry).is_err());
    }

    #[test]
    fn test_build_processor_applies_overrides() {
        let mut config = AnalyzerConfig::default();
        config.update_frequency_days.insert("citation_count".into(), 14);
        config.identity = IdentityPolicy::Declared;

        let processor = config
            .build_processor(&MetricRegistry::builtin(), Arc::new(SystemClock))
            .unwrap();
        assert_eq!(processor.static_metrics().len(), 3);
        let citation = &processor.updatable_metrics()[0];
        assert_eq!(citation.update_frequency_days(), 14);
        assert_eq!(citation.identity(), IdentityPolicy::Declared);
        assert_eq!(processor.updatable_metrics()[1].update_frequency_days(), 7);
    }
}
