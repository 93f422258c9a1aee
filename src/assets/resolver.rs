use super::{ObjectUrl, ObjectUrlStore, ResourceBundle};

/// Rewrites resource references of one load, preferring bundle entries over the network.
///
/// Each load owns its resolver, so concurrent loads never see each other's bundle.
/// Handles minted here live until [`ResourceResolver::release`] or drop.
pub struct ResourceResolver<'a> {
    base_url: String,
    root_path: String,
    bundle: &'a ResourceBundle,
    handles: ObjectUrlStore,
    minted: Vec<ObjectUrl>,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(
        base_url: &str,
        root_path: &str,
        bundle: &'a ResourceBundle,
        handles: ObjectUrlStore,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            root_path: root_path.to_string(),
            bundle,
            handles,
            minted: Vec::new(),
        }
    }

    /// Bundle key for `url`: unescaped, base URL and a leading `./` or `/` removed,
    /// then prefixed with the root path.
    pub fn normalize(&self, url: &str) -> String {
        let decoded = urlencoding::decode(url)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| url.to_string());
        let stripped = if self.base_url.is_empty() {
            decoded
        } else {
            decoded.replacen(&self.base_url, "", 1)
        };
        let relative = stripped
            .strip_prefix("./")
            .or_else(|| stripped.strip_prefix('/'))
            .unwrap_or(&stripped);
        format!("{}{}", self.root_path, relative)
    }

    /// URL to fetch for `url`. `path` is joined in front of unmatched references.
    pub fn resolve(&mut self, url: &str, path: Option<&str>) -> String {
        let key = self.normalize(url);
        if let Some(bytes) = self.bundle.get(&key) {
            let handle = self.handles.create(bytes.clone());
            let resolved = handle.as_str().to_string();
            log::debug!("Resolved {} from bundle entry {}", url, key);
            self.minted.push(handle);
            return resolved;
        }
        log::debug!("No bundle entry for {}, fetching as-is", key);
        format!("{}{}", path.unwrap_or_default(), url)
    }

    pub fn minted_count(&self) -> usize {
        self.minted.len()
    }

    /// Revokes every handle minted so far. Returns how many were released.
    pub fn release(&mut self) -> usize {
        let count = self.minted.len();
        self.minted.clear();
        count
    }
}
