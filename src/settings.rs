use crate::enums::{Escalation, SortBy};

/// Configuration read by every loader call. Never mutated while loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Policy for unreadable files, missing fields and inconsistent series.
    pub escalation: Escalation,
    /// Policy for a decoded pixel array that disagrees with its series geometry.
    pub shape_mismatch: Escalation,
    /// Diagnostic threshold, 0 (silent) to 3 (dump every dataset).
    pub verbosity: u8,
    pub sort_by: SortBy,
    /// Deepest subdirectory level visited by [`load_tree`], `None` for no limit.
    ///
    /// [`load_tree`]: crate::volume_loader::VolumeLoader::load_tree
    pub max_depth: Option<usize>,
    /// Case-insensitive file extensions to consider, `None` for every file.
    pub extensions: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            escalation: Escalation::Warning,
            shape_mismatch: Escalation::Error,
            verbosity: 1,
            sort_by: SortBy::SliceLocation,
            max_depth: None,
            extensions: None,
        }
    }
}

impl Settings {
    pub fn with_escalation(mut self, escalation: Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn with_shape_mismatch(mut self, escalation: Escalation) -> Self {
        self.shape_mismatch = escalation;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Whether diagnostics of `level` pass the verbosity threshold.
    #[inline]
    pub fn is_verbose(&self, level: u8) -> bool {
        self.verbosity >= level
    }

    pub(crate) fn accepts_extension(&self, path: &std::path::Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Emit `message` under the log target `who` if `level` passes the verbosity
/// threshold. Level 1 logs at info, 2 at debug, 3 and above at trace.
pub fn verbose(settings: &Settings, who: &str, level: u8, message: impl AsRef<str>) {
    if !settings.is_verbose(level) {
        return;
    }
    let log_level = match level {
        0 | 1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    log::log!(target: who, log_level, "[{who}]: {}", message.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn defaults_warn_and_keep_shape_mismatch_fatal() {
        let settings = Settings::default();
        assert_eq!(settings.escalation, Escalation::Warning);
        assert_eq!(settings.shape_mismatch, Escalation::Error);
        assert_eq!(settings.verbosity, 1);
        assert!(settings.is_verbose(1));
        assert!(!settings.is_verbose(2));
    }

    #[test]
    fn extension_filter() {
        let all = Settings::default();
        assert!(all.accepts_extension(Path::new("x/IM0001")));

        let dcm = Settings::default().with_extensions(["dcm"]);
        assert!(dcm.accepts_extension(Path::new("x/a.DCM")));
        assert!(!dcm.accepts_extension(Path::new("x/a.txt")));
        assert!(!dcm.accepts_extension(Path::new("x/IM0001")));
    }
}
