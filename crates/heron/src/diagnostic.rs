//
// diagnostic.rs
//
// Location-tagged analysis findings handed to the presentation layer
//

use std::fmt;

use serde::Serialize;
use tower_lsp::lsp_types::{self, DiagnosticSeverity, NumberOrString};

use crate::locality::Locality;

/// Source name attached to LSP diagnostics
pub const DIAGNOSTIC_SOURCE: &str = "heron";

/// Closed set of diagnostic kinds produced by copybook expansion and tree analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No provider produced content for a copybook
    ResolutionFailure,
    /// A copybook includes itself, directly or transitively
    ResolutionCycle,
    /// Copybook processing is turned off for the run
    ProcessingDisabled,
    /// Copybook processing is intentionally skipped for the run
    ProcessingSkipped,
    /// Nested inclusion went deeper than the configured bound
    MaxDepthExceeded,
    /// A paragraph or section usage has no declaration in its program
    UndefinedCodeBlock,
    /// A variable usage has no declaration in its program
    UndefinedVariable,
    /// The same name is declared twice in one program
    DuplicateDeclaration,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::ResolutionFailure,
        ErrorCode::ResolutionCycle,
        ErrorCode::ProcessingDisabled,
        ErrorCode::ProcessingSkipped,
        ErrorCode::MaxDepthExceeded,
        ErrorCode::UndefinedCodeBlock,
        ErrorCode::UndefinedVariable,
        ErrorCode::DuplicateDeclaration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ResolutionFailure => "RESOLUTION_FAILURE",
            ErrorCode::ResolutionCycle => "RESOLUTION_CYCLE",
            ErrorCode::ProcessingDisabled => "PROCESSING_DISABLED",
            ErrorCode::ProcessingSkipped => "PROCESSING_SKIPPED",
            ErrorCode::MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            ErrorCode::UndefinedCodeBlock => "UNDEFINED_CODE_BLOCK",
            ErrorCode::UndefinedVariable => "UNDEFINED_VARIABLE",
            ErrorCode::DuplicateDeclaration => "DUPLICATE_DECLARATION",
        }
    }

    /// Settings key used for per-code severity overrides (camelCase).
    pub fn settings_key(self) -> &'static str {
        match self {
            ErrorCode::ResolutionFailure => "resolutionFailure",
            ErrorCode::ResolutionCycle => "resolutionCycle",
            ErrorCode::ProcessingDisabled => "processingDisabled",
            ErrorCode::ProcessingSkipped => "processingSkipped",
            ErrorCode::MaxDepthExceeded => "maxDepthExceeded",
            ErrorCode::UndefinedCodeBlock => "undefinedCodeBlock",
            ErrorCode::UndefinedVariable => "undefinedVariable",
            ErrorCode::DuplicateDeclaration => "duplicateDeclaration",
        }
    }

    /// Severity used when the configuration does not override it.
    pub fn default_severity(self) -> DiagnosticSeverity {
        match self {
            ErrorCode::ResolutionFailure
            | ErrorCode::ResolutionCycle
            | ErrorCode::UndefinedCodeBlock
            | ErrorCode::UndefinedVariable
            | ErrorCode::DuplicateDeclaration => DiagnosticSeverity::ERROR,
            ErrorCode::MaxDepthExceeded => DiagnosticSeverity::WARNING,
            ErrorCode::ProcessingDisabled => DiagnosticSeverity::INFORMATION,
            ErrorCode::ProcessingSkipped => DiagnosticSeverity::HINT,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding: where, how severe, which kind, and a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub locality: Locality,
    pub severity: DiagnosticSeverity,
    pub code: ErrorCode,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        locality: Locality,
        severity: DiagnosticSeverity,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            locality,
            severity,
            code,
            message: message.into(),
        }
    }

    /// Convert into the LSP shape. The URI is dropped because LSP diagnostics
    /// are published per document; callers group by `locality.uri()` first.
    pub fn to_lsp(&self) -> lsp_types::Diagnostic {
        lsp_types::Diagnostic {
            range: self.locality.range(),
            severity: Some(self.severity),
            code: Some(NumberOrString::String(self.code.as_str().to_string())),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: self.message.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.locality, self.code, self.message)
    }
}

/// Push `diagnostic` unless an identical one is already present.
///
/// Repeated expansions of one copybook raise the same finding at the same
/// place; the report keeps the first.
pub fn push_unique(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    if !diagnostics.contains(&diagnostic) {
        diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Diagnostic {
        Diagnostic::new(
            Locality::from_coords("file:///prog.cbl", 4, 11, 4, 20),
            DiagnosticSeverity::ERROR,
            ErrorCode::UndefinedCodeBlock,
            "The following paragraph or section is not defined: DO-WORK",
        )
    }

    #[test]
    fn test_to_lsp_carries_code_and_range() {
        let lsp = sample().to_lsp();
        assert_eq!(lsp.range.start.line, 4);
        assert_eq!(lsp.range.end.character, 20);
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            lsp.code,
            Some(NumberOrString::String("UNDEFINED_CODE_BLOCK".to_string()))
        );
        assert_eq!(lsp.source.as_deref(), Some(DIAGNOSTIC_SOURCE));
    }

    #[test]
    fn test_push_unique_drops_exact_duplicates() {
        let mut diags = Vec::new();
        push_unique(&mut diags, sample());
        push_unique(&mut diags, sample());
        assert_eq!(diags.len(), 1);

        let mut other = sample();
        other.message = "different".to_string();
        push_unique(&mut diags, other);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_disabled_and_skipped_are_distinct() {
        assert_ne!(
            ErrorCode::ProcessingDisabled.default_severity(),
            ErrorCode::ProcessingSkipped.default_severity()
        );
        assert_ne!(
            ErrorCode::ProcessingDisabled.as_str(),
            ErrorCode::ProcessingSkipped.as_str()
        );
    }

    #[test]
    fn test_serializes_code_as_screaming_snake() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["code"], "UNDEFINED_CODE_BLOCK");
        assert_eq!(json["message"], sample().message);
    }
}
