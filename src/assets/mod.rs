mod fetch;
mod handles;
mod resolver;

pub use fetch::{decode_data_uri, DefaultFetcher, FetchError, FetchErrorKind, Fetcher};
pub use handles::{ObjectUrl, ObjectUrlStore};
pub use resolver::ResourceResolver;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Root model document handed to the viewer: a URL/path or the document bytes.
#[derive(Debug, Clone)]
pub enum AssetRef {
    Url(String),
    Blob(Arc<[u8]>),
}

impl From<&str> for AssetRef {
    fn from(url: &str) -> Self {
        AssetRef::Url(url.to_string())
    }
}

impl From<Vec<u8>> for AssetRef {
    fn from(bytes: Vec<u8>) -> Self {
        AssetRef::Blob(Arc::from(bytes))
    }
}

/// Side resources of a model, keyed by relative path with `/` separators.
#[derive(Debug, Clone, Default)]
pub struct ResourceBundle {
    entries: HashMap<String, Arc<[u8]>>,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to read resource directory {path}: {source}")]
pub struct BundleError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.entries.insert(key.into(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<&Arc<[u8]>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Reads every file below `dir`, keyed by its path relative to `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, BundleError> {
        let mut bundle = Self::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let read_error = |source| BundleError {
                path: current.display().to_string(),
                source,
            };
            for entry in std::fs::read_dir(&current).map_err(read_error)? {
                let path = entry.map_err(read_error)?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(dir) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let bytes = std::fs::read(&path).map_err(|source| BundleError {
                    path: path.display().to_string(),
                    source,
                })?;
                bundle.insert(key, bytes);
            }
        }
        log::info!("Resource bundle: {} files from {}", bundle.len(), dir.display());
        Ok(bundle)
    }
}

/// Everything up to and including the last `/`, or `./` when there is none.
pub fn extract_url_base(url: &str) -> String {
    match url.rfind('/') {
        Some(index) => url[..=index].to_string(),
        None => "./".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_url_base, ResourceBundle};

    #[test]
    fn url_base_keeps_trailing_slash() {
        assert_eq!(extract_url_base("https://x/y/model.gltf"), "https://x/y/");
        assert_eq!(extract_url_base("model.glb"), "./");
        assert_eq!(extract_url_base("blob:model-viewer/3"), "blob:model-viewer/");
    }

    #[test]
    fn bundle_from_dir_uses_forward_slash_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("textures")).unwrap();
        std::fs::write(dir.path().join("scene.bin"), [1u8, 2]).unwrap();
        std::fs::write(dir.path().join("textures").join("albedo.png"), [3u8]).unwrap();

        let bundle = ResourceBundle::from_dir(dir.path()).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(&bundle.get("scene.bin").unwrap()[..], &[1, 2]);
        assert!(bundle.contains("textures/albedo.png"));
    }
}
