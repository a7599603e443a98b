//! Fault taxonomy and the escalation policy applied to recoverable faults.
//!
//! Every recoverable problem the loader meets is turned into a [`Fault`] and
//! passed through [`handle_fault`]; the caller branches on the result instead
//! of deciding locally whether to warn, skip or abort.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::enums::Escalation;

/// Per-series attribute that must agree across every slice of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesField {
    Columns,
    Rows,
    PixelSpacing,
    SliceThickness,
    Modality,
}

impl SeriesField {
    pub const ALL: [SeriesField; 5] = [
        SeriesField::Columns,
        SeriesField::Rows,
        SeriesField::PixelSpacing,
        SeriesField::SliceThickness,
        SeriesField::Modality,
    ];
}

impl fmt::Display for SeriesField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesField::Columns => "columns",
            SeriesField::Rows => "rows",
            SeriesField::PixelSpacing => "spacings",
            SeriesField::SliceThickness => "thicknesses",
            SeriesField::Modality => "modalities",
        };
        f.write_str(name)
    }
}

/// A recoverable data problem met while assembling volumes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("Invalid DICOM file (can't load): {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Invalid DICOM file found (no {field}): {path}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("The slice {field} are inconsistent ({series})")]
    InconsistentSeries { series: String, field: SeriesField },

    #[error(
        "Pixel array of {path} has shape {found:?}, series {series} declares {expected:?} (rows, columns)"
    )]
    ShapeMismatch {
        series: String,
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl Fault {
    /// Whether this fault comes from a single file that could not be used.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Fault::Unreadable { .. } | Fault::MissingField { .. })
    }
}

/// Invalid configuration, always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Escalation level not recognised ({0})")]
    UnknownEscalation(String),
}

/// What happened to a fault that did not abort the call.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// `Escalation::Nothing`: the caller may emit a diagnostic.
    Ignored(Fault),
    /// `Escalation::Warning`: already logged, the caller should record it.
    Warned(Fault),
}

impl Handled {
    pub fn fault(&self) -> &Fault {
        match self {
            Handled::Ignored(fault) | Handled::Warned(fault) => fault,
        }
    }
}

/// Apply `policy` to `fault`.
///
/// Returns `Err(fault)` under [`Escalation::Error`]; otherwise the fault is
/// handed back wrapped in [`Handled`] and processing continues.
pub fn handle_fault(policy: Escalation, fault: Fault) -> Result<Handled, Fault> {
    match policy {
        Escalation::Error => Err(fault),
        Escalation::Warning => {
            log::warn!("{fault} Ignoring.");
            Ok(Handled::Warned(fault))
        }
        Escalation::Nothing => Ok(Handled::Ignored(fault)),
    }
}
