//
// copybook/locator.rs
//
// Mapping a copybook name to the URI its content should be read from
//
// Probe order:
//   1. the directory of the requesting file
//   2. each configured search path, in order
// Within a directory the stem is tried as written, upper-cased and
// lower-cased, each with the known copybook extensions. The first existing
// file wins.
//

use std::path::{Path, PathBuf};

use super::config::CopybookConfig;
use super::file_system::{path_to_uri, uri_to_path, FileSystemService};
use super::name::CopybookName;

/// Extensions probed after the bare name
pub const COPYBOOK_EXTENSIONS: &[&str] = &["cpy", "CPY", "cbl", "CBL", "cob", "COB", "copy"];

/// URI scheme used when no file location is found for a copybook
pub const SYNTHETIC_SCHEME: &str = "copybook";

/// URI given to copybooks that have no file location, so providers keyed
/// by name can still serve them.
pub fn synthetic_uri(name: &CopybookName) -> String {
    format!("{}:///{}", SYNTHETIC_SCHEME, name.normalized())
}

/// Finds where a copybook lives
pub trait CopybookLocator: Send + Sync {
    fn locate(
        &self,
        config: &CopybookConfig,
        name: &CopybookName,
        requesting_uri: &str,
    ) -> Option<String>;
}

/// Locator probing the requesting directory and the configured search paths
/// through a [`FileSystemService`].
pub struct SearchPathLocator<F: FileSystemService> {
    files: F,
}

impl<F: FileSystemService> SearchPathLocator<F> {
    pub fn new(files: F) -> Self {
        Self { files }
    }

    fn probe_dir(&self, dir: &Path, name: &CopybookName) -> Option<String> {
        for candidate in candidate_file_names(name) {
            let uri = path_to_uri(&dir.join(&candidate));
            if self.files.file_exists(&uri) {
                return Some(uri);
            }
        }
        None
    }
}

impl<F: FileSystemService> CopybookLocator for SearchPathLocator<F> {
    fn locate(
        &self,
        config: &CopybookConfig,
        name: &CopybookName,
        requesting_uri: &str,
    ) -> Option<String> {
        let local_dir = uri_to_path(requesting_uri)
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty());

        let dirs: Vec<PathBuf> = local_dir
            .into_iter()
            .chain(config.search_paths.iter().cloned())
            .collect();

        for dir in &dirs {
            if let Some(uri) = self.probe_dir(dir, name) {
                log::trace!("Located copybook {} at {}", name, uri);
                return Some(uri);
            }
        }

        log::debug!(
            "Copybook {} not found in {} director{}",
            name,
            dirs.len(),
            if dirs.len() == 1 { "y" } else { "ies" }
        );
        None
    }
}

/// File names tried for a copybook, in probe order, without duplicates.
pub fn candidate_file_names(name: &CopybookName) -> Vec<String> {
    let mut unique_stems: Vec<String> = Vec::with_capacity(3);
    for stem in [
        name.display_name().to_string(),
        name.normalized().to_string(),
        name.display_name().to_ascii_lowercase(),
    ] {
        if !unique_stems.contains(&stem) {
            unique_stems.push(stem);
        }
    }

    let mut names = Vec::new();
    for stem in &unique_stems {
        names.push(stem.clone());
        for ext in COPYBOOK_EXTENSIONS {
            names.push(format!("{}.{}", stem, ext));
        }
    }
    names
}
