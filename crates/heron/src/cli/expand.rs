//
// cli/expand.rs
//
// `heron expand` subcommand: expand the copybooks of one program or of every
// COBOL source below a directory, printing the result or a JSON report.
//

use std::path::{Path, PathBuf};

use anyhow::Context;
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{parse_analysis_config, AnalysisConfig};
use crate::copybook::config::{CopybookProcessingMode, SqlBackend};
use crate::copybook::file_system::path_to_uri;
use crate::copybook::resolver::{CopybookResolver, ExpandedSource};
use crate::perf::TimingGuard;

/// Extensions treated as COBOL programs when walking a directory
const SOURCE_EXTENSIONS: &[&str] = &["cbl", "cob", "cobol"];

/// Parsed arguments for the `expand` subcommand.
#[derive(Debug, Default)]
pub struct ExpandArgs {
    pub path: PathBuf,
    pub copybooks: Vec<PathBuf>,
    pub mode: Option<CopybookProcessingMode>,
    pub sql_backend: Option<SqlBackend>,
    pub settings: Option<PathBuf>,
    pub json: bool,
}

/// Expansion of one program
#[derive(Debug, Serialize)]
pub struct UnitReport {
    pub path: PathBuf,
    pub uri: String,
    #[serde(flatten)]
    pub expanded: ExpandedSource,
}

fn required_value(
    flag: &str,
    args: &mut impl Iterator<Item = String>,
) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{} requires a value", flag))
}

/// Parse `expand` arguments from the remaining CLI args.
///
/// Expected usage: `heron expand <path> [--copybooks <dir>]... [--mode <mode>]
/// [--sql-backend <backend>] [--settings <file>] [--json]`
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<ExpandArgs, String> {
    let mut parsed = ExpandArgs::default();
    let mut path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => parsed.json = true,
            "--copybooks" => {
                parsed
                    .copybooks
                    .push(PathBuf::from(required_value("--copybooks", args)?));
            }
            "--mode" => {
                let value = required_value("--mode", args)?;
                parsed.mode = Some(CopybookProcessingMode::parse(&value).ok_or_else(|| {
                    format!(
                        "Unknown mode '{}'. Valid modes: enabled, disabled, skip",
                        value
                    )
                })?);
            }
            "--sql-backend" => {
                let value = required_value("--sql-backend", args)?;
                parsed.sql_backend = Some(SqlBackend::parse(&value).ok_or_else(|| {
                    format!(
                        "Unknown SQL backend '{}'. Valid backends: none, db2, datacom",
                        value
                    )
                })?);
            }
            "--settings" => {
                parsed.settings = Some(PathBuf::from(required_value("--settings", args)?));
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    parsed.path = path.ok_or_else(|| "Missing required <path> argument".to_string())?;
    if !parsed.path.exists() {
        return Err(format!("Path does not exist: {}", parsed.path.display()));
    }
    Ok(parsed)
}

impl ExpandArgs {
    /// Settings file first, then command-line flags on top.
    ///
    /// Without `--copybooks` or configured search paths, copybooks are looked
    /// up next to the input.
    pub fn analysis_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.settings {
            Some(file) => {
                let raw = std::fs::read_to_string(file)
                    .with_context(|| format!("reading settings {}", file.display()))?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing settings {}", file.display()))?;
                parse_analysis_config(&value)
            }
            None => AnalysisConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.copybooks.processing_mode = mode;
        }
        if let Some(backend) = self.sql_backend {
            config.copybooks.sql_backend = backend;
        }
        if !self.copybooks.is_empty() {
            config.copybooks.search_paths = self.copybooks.clone();
        }
        if config.copybooks.search_paths.is_empty() {
            let home = if self.path.is_dir() {
                self.path.clone()
            } else {
                self.path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            };
            config.copybooks.search_paths.push(home);
        }
        Ok(config)
    }
}

fn is_cobol_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// The programs to expand: `root` itself when it is a file, otherwise every
/// COBOL source below it in sorted order.
pub fn discover_sources(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_cobol_source(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Expand every discovered program in parallel. A unit that cannot be read
/// or whose provider faults fails the whole run.
pub fn run_expand(args: &ExpandArgs) -> anyhow::Result<Vec<UnitReport>> {
    let config = args.analysis_config()?;
    let resolver = CopybookResolver::for_local_files();

    let sources = {
        let _guard = TimingGuard::new("expand:scan");
        discover_sources(&args.path)
    };
    log::info!("Expanding {} program(s) under {}", sources.len(), args.path.display());

    let _guard = TimingGuard::new("expand:units");
    sources
        .par_iter()
        .map(|path| expand_unit(&resolver, &config, path))
        .collect()
}

fn expand_unit(
    resolver: &CopybookResolver,
    config: &AnalysisConfig,
    path: &Path,
) -> anyhow::Result<UnitReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let uri = path_to_uri(path);
    let mut expanded = resolver
        .expand(&uri, &text, &config.copybooks)
        .with_context(|| format!("expanding {}", path.display()))?;
    expanded.diagnostics = config.apply_severities(std::mem::take(&mut expanded.diagnostics));
    Ok(UnitReport {
        path: path.to_path_buf(),
        uri,
        expanded,
    })
}

/// Print each expanded program followed by its diagnostics.
pub fn print_text(reports: &[UnitReport]) {
    for report in reports {
        println!("=== {} ===", report.path.display());
        print!("{}", report.expanded.text);
        if !report.expanded.text.is_empty() && !report.expanded.text.ends_with('\n') {
            println!();
        }
        for usage in &report.expanded.copybooks {
            eprintln!("  copybook {} <- {}", usage.name.display_name(), usage.uri);
        }
        for diagnostic in &report.expanded.diagnostics {
            eprintln!("  {}", diagnostic);
        }
    }
}

/// Print all reports as one JSON array.
pub fn print_json(reports: &[UnitReport]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(reports).context("serializing expansion report")?;
    println!("{}", json);
    Ok(())
}
