//! Name → constructor registry used to build metric lists from configuration

use std::collections::BTreeMap;

use serde::Serialize;

use super::builtin::{
    AvgTextLengthMetric, CitationCountMetric, DownloadCountMetric, NumClassesMetric,
    NumHfDownloadsMetric, NumHfLikesMetric, NumSamplesMetric,
};
use super::{Metric, MetricKind, StaticMetric, UpdatableMetric};

type StaticConstructor = Box<dyn Fn() -> StaticMetric + Send + Sync>;
type UpdatableConstructor = Box<dyn Fn() -> UpdatableMetric + Send + Sync>;

/// Listing entry for a registered metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricInfo {
    pub name: String,
    pub description: String,
    pub kind: MetricKind,
    /// Default staleness window; only set for updatable metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_frequency_days: Option<u32>,
}

/// Registry of metric constructors.
///
/// Every `create_*` call returns a fresh metric with an empty cache or
/// history. Registering a name again replaces the earlier constructor.
#[derive(Default)]
pub struct MetricRegistry {
    statics: BTreeMap<String, (MetricInfo, StaticConstructor)>,
    updatables: BTreeMap<String, (MetricInfo, UpdatableConstructor)>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in metric
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_static(NumSamplesMetric::build);
        registry.register_static(AvgTextLengthMetric::build);
        registry.register_static(NumClassesMetric::build);
        registry.register_static(NumHfDownloadsMetric::build);
        registry.register_static(NumHfLikesMetric::build);
        registry.register_updatable(CitationCountMetric::build);
        registry.register_updatable(DownloadCountMetric::build);
        registry
    }

    pub fn register_static(
        &mut self,
        constructor: impl Fn() -> StaticMetric + Send + Sync + 'static,
    ) {
        let sample = constructor();
        let info = MetricInfo {
            name: sample.name().to_string(),
            description: sample.description().to_string(),
            kind: MetricKind::Static,
            update_frequency_days: None,
        };
        self.statics
            .insert(info.name.clone(), (info, Box::new(constructor)));
    }

    pub fn register_updatable(
        &mut self,
        constructor: impl Fn() -> UpdatableMetric + Send + Sync + 'static,
    ) {
        let sample = constructor();
        let info = MetricInfo {
            name: sample.name().to_string(),
            description: sample.description().to_string(),
            kind: MetricKind::Updatable,
            update_frequency_days: Some(sample.update_frequency_days()),
        };
        self.updatables
            .insert(info.name.clone(), (info, Box::new(constructor)));
    }

    pub fn create_static(&self, name: &str) -> Option<StaticMetric> {
        self.statics.get(name).map(|(_, constructor)| constructor())
    }

    pub fn create_updatable(&self, name: &str) -> Option<UpdatableMetric> {
        self.updatables.get(name).map(|(_, constructor)| constructor())
    }

    pub fn contains(&self, kind: MetricKind, name: &str) -> bool {
        match kind {
            MetricKind::Static => self.statics.contains_key(name),
            MetricKind::Updatable => self.updatables.contains_key(name),
        }
    }

    /// All registered metrics, static first, each group sorted by name
    pub fn available(&self) -> Vec<MetricInfo> {
        let statics = self.statics.values().map(|(info, _)| info.clone());
        let updatables = self.updatables.values().map(|(info, _)| info.clone());
        statics.chain(updatables).collect()
    }
}
