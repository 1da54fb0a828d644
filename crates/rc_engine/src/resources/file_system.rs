//! Resource groups on disk

use crate::core::{EngineError, EngineResult, ResourceConfig};
use crate::resources::stream::DataStream;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps resource groups to search directories
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    groups: BTreeMap<String, Vec<PathBuf>>,
}

impl FileSystem {
    /// File system without any group
    pub fn new() -> Self {
        Self::default()
    }

    /// File system with the configured groups
    pub fn from_config(config: &ResourceConfig) -> Self {
        for (group, dirs) in &config.groups {
            log::debug!("Resource group '{}': {:?}", group, dirs);
        }
        Self { groups: config.groups.clone() }
    }

    /// Append a search directory to `group`, creating the group if needed
    pub fn add_resource_location(&mut self, group: impl Into<String>, dir: impl Into<PathBuf>) {
        self.groups.entry(group.into()).or_default().push(dir.into());
    }

    /// Names of all groups
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Locate `name` in the directories of `group`, first match wins
    pub fn find(&self, name: &str, group: &str) -> EngineResult<PathBuf> {
        let dirs = self
            .groups
            .get(group)
            .ok_or_else(|| EngineError::item_not_found(format!("unknown resource group '{group}'")))?;

        dirs.iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| EngineError::file_not_found(format!("'{name}' not found in group '{group}'")))
    }

    /// Whether `name` exists in `group`
    pub fn exists(&self, name: &str, group: &str) -> bool {
        self.find(name, group).is_ok()
    }

    /// Read `name` from `group` into a stream
    pub fn open_stream(&self, name: &str, group: &str) -> EngineResult<DataStream> {
        let path = self.find(name, group)?;
        open_path(&path, name)
    }
}

fn open_path(path: &Path, name: &str) -> EngineResult<DataStream> {
    let bytes = std::fs::read(path)?;
    log::trace!("Opened '{}' ({} bytes)", path.display(), bytes.len());
    Ok(DataStream::from_bytes(name, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;

    #[test]
    fn test_search_order_and_errors() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("a.txt"), b"second").unwrap();
        std::fs::write(first.path().join("b.txt"), b"first").unwrap();
        std::fs::write(second.path().join("b.txt"), b"second").unwrap();

        let mut fs = FileSystem::new();
        fs.add_resource_location("General", first.path());
        fs.add_resource_location("General", second.path());

        assert_eq!(fs.open_stream("a.txt", "General").unwrap().read_to_string().unwrap(), "second");
        assert_eq!(fs.open_stream("b.txt", "General").unwrap().read_to_string().unwrap(), "first");
        assert_eq!(fs.open_stream("c.txt", "General").unwrap_err().code(), ErrorCode::FileNotFound);
        assert_eq!(fs.open_stream("a.txt", "Models").unwrap_err().code(), ErrorCode::ItemNotFound);
    }

    #[test]
    fn test_from_config() {
        let fs = FileSystem::from_config(&ResourceConfig::default());
        assert_eq!(fs.groups().collect::<Vec<_>>(), vec!["General"]);
    }
}
