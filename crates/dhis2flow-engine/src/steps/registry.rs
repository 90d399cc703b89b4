use super::{
    AnalyticsStep, DataValueSetsStep, DqrStep, ExportStep, MetadataStep, Step, TrackerStep,
    TransformStep,
};
use crate::error::StepError;
use crate::pipeline::StepConfig;
use std::collections::HashMap;

/// Constructor for one step type
pub type StepFactory = fn(StepConfig) -> Box<dyn Step>;

/// Maps step type tags to constructors.
///
/// Built once before a run and read-only afterwards. Tags are case-insensitive.
#[derive(Clone)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StepRegistry {
    /// Registry with no step types
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in step type
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("analytics", |c| Box::new(AnalyticsStep::new(c)));
        registry.register("datavaluesets", |c| Box::new(DataValueSetsStep::new(c)));
        registry.register("dqr", |c| Box::new(DqrStep::new(c)));
        registry.register("tracker", |c| Box::new(TrackerStep::new(c)));
        registry.register("transform", |c| Box::new(TransformStep::new(c)));
        registry.register("export", |c| Box::new(ExportStep::new(c)));
        registry.register("metadata", |c| Box::new(MetadataStep::new(c)));
        registry
    }

    /// Add or replace a step type
    pub fn register(&mut self, step_type: &str, factory: StepFactory) {
        self.factories.insert(step_type.to_ascii_lowercase(), factory);
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.factories.contains_key(&step_type.to_ascii_lowercase())
    }

    /// Instantiate the step for a config
    pub fn create(&self, config: &StepConfig) -> Result<Box<dyn Step>, StepError> {
        let factory = self
            .factories
            .get(&config.step_type.to_ascii_lowercase())
            .ok_or_else(|| StepError::UnknownStepType(config.step_type.clone()))?;
        Ok(factory(config.clone()))
    }

    /// Registered tags, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("types", &self.types())
            .finish()
    }
}
