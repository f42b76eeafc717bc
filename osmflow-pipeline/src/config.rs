//! Construction-time settings shared by the stages of a pipeline.

use std::num::NonZeroUsize;

use crate::{ConfigError, ConflictResolutionMethod, DEFAULT_QUEUE_CAPACITY};

/// Settings applied when a graph is materialised.
///
/// # Examples
/// ```
/// use osmflow_pipeline::{ConflictResolutionMethod, PipelineConfig};
///
/// let config = PipelineConfig::default().with_queue_capacity(64)?;
/// assert_eq!(config.queue_capacity.get(), 64);
/// assert_eq!(config.conflict_resolution, ConflictResolutionMethod::Timestamp);
/// assert!(PipelineConfig::default().with_queue_capacity(0).is_err());
/// # Ok::<(), osmflow_pipeline::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct PipelineConfig {
    /// Items buffered per merge input before producers block.
    pub queue_capacity: NonZeroUsize,
    /// Default policy for mergers that do not specify one.
    pub conflict_resolution: ConflictResolutionMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            conflict_resolution: ConflictResolutionMethod::default(),
        }
    }
}

impl PipelineConfig {
    /// Replace the queue capacity, rejecting zero.
    pub fn with_queue_capacity(self, capacity: usize) -> Result<Self, ConfigError> {
        let queue_capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroQueueCapacity)?;
        Ok(Self {
            queue_capacity,
            ..self
        })
    }

    /// Replace the default conflict policy.
    #[must_use]
    pub const fn with_conflict_resolution(self, method: ConflictResolutionMethod) -> Self {
        Self {
            conflict_resolution: method,
            ..self
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn missing_fields_take_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").expect("valid json");
        assert_eq!(config, PipelineConfig::default());
    }

    #[rstest]
    fn reads_kebab_case_fields() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"queue-capacity": 3, "conflict-resolution": "latest-source"}"#,
        )
        .expect("valid json");
        assert_eq!(config.queue_capacity.get(), 3);
        assert_eq!(
            config.conflict_resolution,
            ConflictResolutionMethod::LatestSource
        );
    }

    #[rstest]
    fn zero_capacity_is_rejected_when_deserialising() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"queue-capacity": 0}"#).is_err());
    }
}
