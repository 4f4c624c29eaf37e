//! Desired-state config storage (`get_config`/`save_config` of §6's Image
//! Reconciler API).

use crate::atomic::{AtomicReader, AtomicWriter};
use crate::types::DesiredState;
use apm_core::{Error, Result};
use std::path::PathBuf;

/// Reads and writes `<store_dir>/<image_name>.json` desired-state
/// documents, atomically.
#[derive(Debug)]
pub struct ConfigStore {
    store_dir: PathBuf,
}

impl ConfigStore {
    #[must_use]
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    fn path(&self, image_name: &str) -> PathBuf {
        self.store_dir.join(format!("{image_name}.json"))
    }

    /// # Errors
    /// Returns `Error::invalid_parameters` if no config has been saved
    /// for `image_name` yet, or if the stored document is malformed.
    pub fn get(&self, image_name: &str) -> Result<DesiredState> {
        let path = self.path(image_name);
        let reader = AtomicReader::new(&path)?;
        if !reader.exists() {
            return Err(Error::invalid_parameters(format!(
                "no desired-state config saved for image {image_name}"
            )));
        }
        let content = reader.read_string()?;
        apm_core::from_json(&content)
    }

    /// # Errors
    /// Returns `Error::operation_failed` if the config cannot be written
    /// atomically.
    pub fn save(&self, image_name: &str, config: &DesiredState) -> Result<()> {
        let path = self.path(image_name);
        let content = apm_core::to_json_pretty(config)?;
        let mut writer = AtomicWriter::new(&path)?;
        writer.content(content.into_bytes());
        writer.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackageSpec;
    use tempfile::TempDir;

    #[test]
    fn save_then_get_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());

        let config = DesiredState {
            base_image: Some("debian:bookworm".to_string()),
            packages: vec![PackageSpec::new("vim")],
            ..Default::default()
        };
        store.save("web", &config).unwrap();

        let loaded = store.get("web").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn get_unknown_image_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.get("never-saved").is_err());
    }

    #[test]
    fn save_overwrites_previous_config() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());

        store
            .save("web", &DesiredState {
                packages: vec![PackageSpec::new("vim")],
                ..Default::default()
            })
            .unwrap();
        store
            .save("web", &DesiredState {
                packages: vec![PackageSpec::new("tmux")],
                ..Default::default()
            })
            .unwrap();

        let loaded = store.get("web").unwrap();
        assert_eq!(loaded.packages[0].name, "tmux");
    }
}
