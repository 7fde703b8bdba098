//
// copybook/content_provider.rs
//
// Capability that turns a copybook request into optional content
//

use dashmap::DashMap;

use super::config::CopybookConfig;
use super::file_system::FileSystemService;
use super::name::{CopybookModel, CopybookName};

/// Source of copybook content.
///
/// A lookup miss (absent file, unreadable file, nothing registered) is
/// `Ok(None)`. `Err` means the provider itself is broken; the resolver does
/// not mask it.
pub trait CopybookContentProvider: Send + Sync {
    fn read(
        &self,
        config: &CopybookConfig,
        name: &CopybookName,
        requesting_uri: &str,
        resolved_uri: &str,
    ) -> anyhow::Result<Option<CopybookModel>>;
}

/// Reads copybooks through an injected [`FileSystemService`].
///
/// The text is wrapped verbatim; the model's URI is the resolved URI, which
/// differs from the requesting URI whenever the copybook was found on a
/// search path.
pub struct FileCopybookContentProvider<F: FileSystemService> {
    files: F,
}

impl<F: FileSystemService> FileCopybookContentProvider<F> {
    pub fn new(files: F) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &F {
        &self.files
    }
}

impl<F: FileSystemService> CopybookContentProvider for FileCopybookContentProvider<F> {
    fn read(
        &self,
        _config: &CopybookConfig,
        name: &CopybookName,
        _requesting_uri: &str,
        resolved_uri: &str,
    ) -> anyhow::Result<Option<CopybookModel>> {
        let model = self
            .files
            .read_implicit_code(resolved_uri)
            .filter(|content| !content.is_empty())
            .map(|content| CopybookModel::new(name.clone(), resolved_uri, content));

        if model.is_none() {
            log::trace!("No content for copybook {} at {}", name, resolved_uri);
        }
        Ok(model)
    }
}

/// Copybooks registered in memory by name, such as unsaved editor buffers,
/// dialect-predefined copybooks or test fixtures.
///
/// Lookups ignore the URIs; the model reports the resolved URI it was asked for.
#[derive(Debug, Default)]
pub struct InMemoryCopybookProvider {
    entries: DashMap<CopybookName, String>,
}

impl InMemoryCopybookProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with(self, name: &str, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&self, name: &str, content: impl Into<String>) {
        self.entries.insert(CopybookName::new(name), content.into());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.remove(&CopybookName::new(name)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CopybookContentProvider for InMemoryCopybookProvider {
    fn read(
        &self,
        _config: &CopybookConfig,
        name: &CopybookName,
        _requesting_uri: &str,
        resolved_uri: &str,
    ) -> anyhow::Result<Option<CopybookModel>> {
        Ok(self
            .entries
            .get(name)
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| CopybookModel::new(name.clone(), resolved_uri, entry.value().clone())))
    }
}
