//! Deterministic fixture workspace generator for benchmarks and tests.
//!
//! Generates synthetic COBOL workspaces with controlled characteristics:
//! program count, copybooks per program, nested copybook chains, fields per
//! copybook, and extra procedure lines.
//!
//! Programs land in the workspace root and copybooks in [`COPYBOOK_DIR`].
//! All output is deterministic so benchmarks are reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Subdirectory holding the generated copybooks
pub const COPYBOOK_DIR: &str = "copy";

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub program_count: usize,
    /// Distinct copybooks in the workspace
    pub copybook_count: usize,
    /// `COPY` directives in each program's WORKING-STORAGE
    pub copies_per_program: usize,
    /// Copybooks `BOOK0..BOOK{n-1}` each include the next one
    pub copybook_chain_depth: usize,
    pub fields_per_copybook: usize,
    pub extra_lines_per_program: usize,
}

impl FixtureConfig {
    /// Small workspace: 10 programs, 5 copybooks, chain depth 2.
    pub fn small() -> Self {
        Self {
            program_count: 10,
            copybook_count: 5,
            copies_per_program: 2,
            copybook_chain_depth: 2,
            fields_per_copybook: 5,
            extra_lines_per_program: 5,
        }
    }

    /// Medium workspace: 50 programs, 20 copybooks, chain depth 5.
    pub fn medium() -> Self {
        Self {
            program_count: 50,
            copybook_count: 20,
            copies_per_program: 4,
            copybook_chain_depth: 5,
            fields_per_copybook: 10,
            extra_lines_per_program: 20,
        }
    }

    /// Large workspace: 200 programs, 60 copybooks, chain depth 10.
    pub fn large() -> Self {
        Self {
            program_count: 200,
            copybook_count: 60,
            copies_per_program: 8,
            copybook_chain_depth: 10,
            fields_per_copybook: 20,
            extra_lines_per_program: 50,
        }
    }
}

/// Name of copybook `index`
pub fn copybook_name(index: usize) -> String {
    format!("BOOK{}", index)
}

/// File name of program `index`
pub fn program_file_name(index: usize) -> String {
    format!("PROG{}.cbl", index)
}

fn generate_copybook_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();
    writeln!(content, "       01 BOOK{}-RECORD.", index).unwrap();
    for field in 0..config.fields_per_copybook {
        if field % 2 == 0 {
            writeln!(content, "          05 B{}-FIELD-{} PIC X({}).", index, field, field + 1)
                .unwrap();
        } else {
            writeln!(content, "          05 B{}-FIELD-{} PIC 9(4) VALUE {}.", index, field, field)
                .unwrap();
        }
    }
    if index + 1 < config.copybook_chain_depth && index + 1 < config.copybook_count {
        writeln!(content, "       COPY {}.", copybook_name(index + 1)).unwrap();
    }
    content
}

fn generate_program_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();
    writeln!(content, "       IDENTIFICATION DIVISION.").unwrap();
    writeln!(content, "       PROGRAM-ID. PROG{}.", index).unwrap();
    writeln!(content, "       DATA DIVISION.").unwrap();
    writeln!(content, "       WORKING-STORAGE SECTION.").unwrap();
    if config.copybook_count > 0 {
        for copy in 0..config.copies_per_program {
            let book = (index + copy) % config.copybook_count;
            writeln!(content, "       COPY {}.", copybook_name(book)).unwrap();
        }
    }
    writeln!(content, "       77 WS-COUNTER-{} PIC 9(4) VALUE 0.", index).unwrap();
    writeln!(content, "       PROCEDURE DIVISION.").unwrap();
    writeln!(content, "       MAIN-PARA.").unwrap();
    for line in 0..config.extra_lines_per_program {
        writeln!(content, "           ADD {} TO WS-COUNTER-{}.", line + 1, index).unwrap();
    }
    writeln!(content, "           STOP RUN.").unwrap();
    content
}

/// Create a temporary fixture workspace from the given configuration.
///
/// Calling this twice with the same `FixtureConfig` produces byte-identical files.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    let copy_dir = dir.join(COPYBOOK_DIR);
    std::fs::create_dir_all(&copy_dir)
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", copy_dir.display(), e));

    for i in 0..config.copybook_count {
        let filename = format!("{}.cpy", copybook_name(i));
        std::fs::write(copy_dir.join(&filename), generate_copybook_content(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture copybook {}: {}", filename, e));
    }
    for i in 0..config.program_count {
        let filename = program_file_name(i);
        std::fs::write(dir.join(&filename), generate_program_content(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture program {}: {}", filename, e));
    }
}
