//
// config.rs
//
// Analysis settings parsed from the client's JSON configuration
//

use std::collections::HashMap;
use std::path::PathBuf;

use tower_lsp::lsp_types::DiagnosticSeverity;

use crate::copybook::config::{
    CopybookConfig, CopybookProcessingMode, DirectiveFallback, SqlBackend,
};
use crate::diagnostic::{Diagnostic, ErrorCode};

/// Severity setting for one diagnostic code
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeverityOverride {
    /// Do not report the code at all
    Off,
    Level(DiagnosticSeverity),
}

/// Everything one analysis run is configured with
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub copybooks: CopybookConfig,
    pub severities: HashMap<ErrorCode, SeverityOverride>,
}

impl AnalysisConfig {
    pub fn with_copybooks(copybooks: CopybookConfig) -> Self {
        Self {
            copybooks,
            ..Self::default()
        }
    }

    /// Effective severity of `code`, `None` when it is switched off
    pub fn severity(&self, code: ErrorCode) -> Option<DiagnosticSeverity> {
        match self.severities.get(&code) {
            Some(SeverityOverride::Off) => None,
            Some(SeverityOverride::Level(severity)) => Some(*severity),
            None => Some(code.default_severity()),
        }
    }

    /// Apply severity overrides, dropping diagnostics whose code is off
    pub fn apply_severities(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        if self.severities.is_empty() {
            return diagnostics;
        }
        diagnostics
            .into_iter()
            .filter_map(|mut d| {
                d.severity = self.severity(d.code)?;
                Some(d)
            })
            .collect()
    }
}

/// Parse a severity name. Unknown names fall back to warning.
pub fn parse_severity(s: &str) -> DiagnosticSeverity {
    match s.to_lowercase().as_str() {
        "error" => DiagnosticSeverity::ERROR,
        "warning" => DiagnosticSeverity::WARNING,
        "information" | "info" => DiagnosticSeverity::INFORMATION,
        "hint" => DiagnosticSeverity::HINT,
        _ => DiagnosticSeverity::WARNING,
    }
}

fn parse_override(s: &str) -> SeverityOverride {
    match s.to_lowercase().as_str() {
        "off" | "none" | "ignore" => SeverityOverride::Off,
        _ => SeverityOverride::Level(parse_severity(s)),
    }
}

/// Parse the `copybooks` section of the settings, `None` when absent.
/// Keys that are missing or malformed keep their defaults.
pub fn parse_copybook_config(settings: &serde_json::Value) -> Option<CopybookConfig> {
    let copybooks = settings.get("copybooks")?;
    let mut config = CopybookConfig::default();

    if let Some(v) = copybooks.get("processingMode").and_then(|v| v.as_str()) {
        match CopybookProcessingMode::parse(v) {
            Some(mode) => config.processing_mode = mode,
            None => log::warn!("Unknown copybook processing mode '{}', keeping default", v),
        }
    }
    if let Some(v) = copybooks.get("sqlBackend").and_then(|v| v.as_str()) {
        match SqlBackend::parse(v) {
            Some(backend) => config.sql_backend = backend,
            None => log::warn!("Unknown SQL backend '{}', keeping default", v),
        }
    }
    if let Some(paths) = copybooks.get("searchPaths").and_then(|v| v.as_array()) {
        config.search_paths = paths
            .iter()
            .filter_map(|p| p.as_str())
            .filter(|s| !s.is_empty() && !s.contains('\0'))
            .map(PathBuf::from)
            .collect();
    }
    if let Some(v) = copybooks.get("unexpandedDirective").and_then(|v| v.as_str()) {
        config.unexpanded_directive = match v.to_lowercase().as_str() {
            "keep" => DirectiveFallback::Keep,
            _ => DirectiveFallback::Blank,
        };
    }
    if let Some(v) = copybooks.get("maxDepth").and_then(|v| v.as_u64()) {
        config.max_depth = v as usize;
    }

    Some(config)
}

/// Parse the full analysis configuration; absent sections keep defaults.
pub fn parse_analysis_config(settings: &serde_json::Value) -> AnalysisConfig {
    let mut config = AnalysisConfig {
        copybooks: parse_copybook_config(settings).unwrap_or_default(),
        ..AnalysisConfig::default()
    };

    if let Some(diagnostics) = settings.get("diagnostics") {
        for code in ErrorCode::ALL {
            if let Some(sev) = diagnostics.get(code.settings_key()).and_then(|v| v.as_str()) {
                config.severities.insert(code, parse_override(sev));
            }
        }
    }

    log::info!("Analysis configuration loaded from settings:");
    log::info!("  processing_mode: {:?}", config.copybooks.processing_mode);
    log::info!("  sql_backend: {:?}", config.copybooks.sql_backend);
    log::info!("  search_paths: {:?}", config.copybooks.search_paths);
    log::info!(
        "  unexpanded_directive: {:?}",
        config.copybooks.unexpanded_directive
    );
    log::info!("  max_depth: {}", config.copybooks.max_depth);
    for code in ErrorCode::ALL {
        if let Some(setting) = config.severities.get(&code) {
            log::info!("  severity[{}]: {:?}", code.settings_key(), setting);
        }
    }

    config
}
