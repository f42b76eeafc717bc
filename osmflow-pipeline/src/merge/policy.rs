//! Which side wins when both merge inputs carry the same element.

use std::{fmt, str::FromStr};

use crate::ConfigError;

/// Conflict policy of the element and change mergers.
///
/// # Examples
/// ```
/// use osmflow_pipeline::ConflictResolutionMethod;
///
/// let method: ConflictResolutionMethod = "LatestSource".parse()?;
/// assert_eq!(method, ConflictResolutionMethod::LatestSource);
/// assert!("newest".parse::<ConflictResolutionMethod>().is_err());
/// # Ok::<(), osmflow_pipeline::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ConflictResolutionMethod {
    /// Keep the later timestamp; ties go to the second input.
    #[default]
    Timestamp,
    /// Always keep the second input.
    #[cfg_attr(feature = "serde", serde(alias = "LatestSource", alias = "latestsource"))]
    LatestSource,
}

impl ConflictResolutionMethod {
    /// Accepted spellings, for help text.
    pub const VARIANTS: [&'static str; 2] = ["timestamp", "latest-source"];

    /// Canonical spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::LatestSource => "latest-source",
        }
    }

    /// Whether the first input's candidate wins, given each side's timestamp.
    #[must_use]
    pub fn keeps_first<T: Ord>(self, first: T, second: T) -> bool {
        match self {
            Self::Timestamp => first > second,
            Self::LatestSource => false,
        }
    }
}

impl fmt::Display for ConflictResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolutionMethod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let folded: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "timestamp" => Ok(Self::Timestamp),
            "latestsource" => Ok(Self::LatestSource),
            _ => Err(ConfigError::UnknownConflictResolution {
                value: value.to_owned(),
            }),
        }
    }
}
