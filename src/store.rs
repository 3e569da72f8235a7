use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::error::PlanetError;

const CATALOG_FILE: &str = "index-v1-nogeom.json";

#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, PlanetError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.cache_dir().join("planet-dl")).ok())
            .ok_or_else(|| {
                PlanetError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { cache_root })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn catalog_path(&self) -> Utf8PathBuf {
        self.cache_root.join("geofabrik").join(CATALOG_FILE)
    }

    pub fn read_catalog(&self) -> Option<String> {
        let path = self.catalog_path();
        match fs::read_to_string(path.as_std_path()) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!("ignoring unreadable catalog cache {path}: {err}");
                None
            }
        }
    }

    pub fn write_catalog(&self, text: &str) -> Result<(), PlanetError> {
        Self::write_bytes_atomic(&self.catalog_path(), text.as_bytes())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PlanetError> {
        let parent = path
            .parent()
            .ok_or_else(|| PlanetError::Filesystem("invalid destination path".to_string()))?;
        let parent = if parent.as_str().is_empty() {
            Utf8Path::new(".")
        } else {
            parent
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PlanetError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("planet-dl-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PlanetError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| PlanetError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| PlanetError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();
        let store = Store::new_with_root(root);

        assert!(store.read_catalog().is_none());
        store.write_catalog(r#"{"features":[]}"#).unwrap();
        assert_eq!(store.read_catalog().as_deref(), Some(r#"{"features":[]}"#));
        assert!(store.catalog_path().ends_with("geofabrik/index-v1-nogeom.json"));
    }

    #[test]
    fn overwrite_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("state.txt")).unwrap();
        Store::write_bytes_atomic(&path, b"sequenceNumber=1").unwrap();
        Store::write_bytes_atomic(&path, b"sequenceNumber=2").unwrap();
        assert_eq!(
            std::fs::read_to_string(path.as_std_path()).unwrap(),
            "sequenceNumber=2"
        );
    }
}
