use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

const OBJECT_URL_PREFIX: &str = "blob:model-viewer/";

#[derive(Debug, Default)]
struct HandleTable {
    live: HashMap<String, Arc<[u8]>>,
    next: u64,
    created: u64,
    revoked: u64,
}

/// Registry of temporary addressable handles for in-memory resources.
///
/// Handles are handed out as [`ObjectUrl`] guards; the entry disappears from the
/// store when the guard is dropped, so every handle is revoked exactly once.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlStore {
    table: Rc<RefCell<HandleTable>>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_object_url(url: &str) -> bool {
        url.starts_with(OBJECT_URL_PREFIX)
    }

    pub fn create(&self, bytes: Arc<[u8]>) -> ObjectUrl {
        let mut table = self.table.borrow_mut();
        table.next += 1;
        table.created += 1;
        let url = format!("{}{}", OBJECT_URL_PREFIX, table.next);
        table.live.insert(url.clone(), bytes);
        ObjectUrl {
            url,
            store: self.clone(),
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        self.table.borrow().live.get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.table.borrow().live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.table.borrow().created
    }

    pub fn revoked_count(&self) -> u64 {
        self.table.borrow().revoked
    }

    fn revoke(&self, url: &str) {
        let mut table = self.table.borrow_mut();
        if table.live.remove(url).is_some() {
            table.revoked += 1;
        } else {
            log::warn!("object URL {} revoked twice", url);
        }
    }
}

/// A live handle; revoked on drop.
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    store: ObjectUrlStore,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}
