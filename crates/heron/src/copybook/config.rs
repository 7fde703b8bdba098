//
// copybook/config.rs
//
// Copybook resolution policy for one analysis run
//

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use serde::Serialize;

/// Whether copy directives are expanded at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopybookProcessingMode {
    /// Resolve directives through the provider chain
    #[default]
    Enabled,
    /// Copybook support is switched off for the project
    Disabled,
    /// Copybooks are intentionally ignored for this run
    Skip,
}

impl CopybookProcessingMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    pub fn resolves(self) -> bool {
        self == Self::Enabled
    }
}

/// Embedded-SQL preprocessor dialect in effect for the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SqlBackend {
    #[default]
    None,
    Db2Server,
    DatacomServer,
}

impl SqlBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "db2" | "db2server" | "db2_server" => Some(Self::Db2Server),
            "datacom" | "datacomserver" | "datacom_server" => Some(Self::DatacomServer),
            _ => None,
        }
    }
}

/// What happens to the text of a directive that is not expanded
/// (unresolved, cyclic, disabled or skipped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveFallback {
    /// Replace the directive with blanks, keeping line structure
    #[default]
    Blank,
    /// Pass the directive text through unchanged
    Keep,
}

/// Default bound on nested copybook inclusion
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Copybook resolution policy. Constructed once from project settings and
/// immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CopybookConfig {
    pub processing_mode: CopybookProcessingMode,
    pub sql_backend: SqlBackend,
    /// Ordered roots probed for copybook files
    pub search_paths: Vec<PathBuf>,
    pub unexpanded_directive: DirectiveFallback,
    /// Maximum nesting of copybooks inside copybooks
    pub max_depth: usize,
}

impl Default for CopybookConfig {
    fn default() -> Self {
        Self {
            processing_mode: CopybookProcessingMode::Enabled,
            sql_backend: SqlBackend::None,
            search_paths: Vec::new(),
            unexpanded_directive: DirectiveFallback::Blank,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CopybookConfig {
    pub fn new(
        processing_mode: CopybookProcessingMode,
        sql_backend: SqlBackend,
        search_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            processing_mode,
            sql_backend,
            search_paths,
            ..Self::default()
        }
    }

    /// Stable hash of every field, part of the resolution cache key.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
