use std::fmt;
use std::str::FromStr;

use crate::escalation::ConfigError;

/// One of the three canonical orthogonal viewing directions through a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    Axial,
    Sagittal,
    Coronal,
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Plane::Axial => "axial",
            Plane::Sagittal => "sagittal",
            Plane::Coronal => "coronal",
        };
        f.write_str(name)
    }
}

/// What to do when the pipeline meets a recoverable data problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escalation {
    /// Emit a diagnostic at verbosity 2 and carry on.
    Nothing,
    /// Log and record a warning, skip the offending item, carry on.
    #[default]
    Warning,
    /// Abort the current call.
    Error,
}

impl FromStr for Escalation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nothing" | "ignore" | "none" => Ok(Escalation::Nothing),
            "warning" | "warn" => Ok(Escalation::Warning),
            "error" | "raise" => Ok(Escalation::Error),
            _ => Err(ConfigError::UnknownEscalation(s.to_string())),
        }
    }
}

/// Key used to order the slices of a series along the depth axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    SliceLocation,
    InstanceNumber,
    None,
}
