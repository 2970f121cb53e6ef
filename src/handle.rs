//! Revocable local handles for fetched document bytes.
//!
//! An [`ObjectStore`] plays the role of an in-process object-URL registry:
//! [`ObjectStore::create`] registers a payload under a fresh `blob:<uuid>`
//! address and returns a [`LocalHandle`]; [`ObjectStore::revoke`] consumes
//! the handle and drops the bytes. `LocalHandle` is not `Clone`, so a
//! handle can be released at most once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::PageFragment;
use crate::transport::Payload;

/// Address scheme for handles, mirroring browser object URLs.
pub const HANDLE_SCHEME: &str = "blob:";

/// Bytes held behind a live handle.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Arc<[u8]>,
    pub content_type: Option<String>,
}

/// Owned reference to a registered payload.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalHandle {
    id: String,
    page_fragment: Option<PageFragment>,
}

impl LocalHandle {
    /// The bare `blob:<uuid>` identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Viewer source address, with the page anchor re-appended so
    /// page-aware viewers open at the cited page.
    pub fn address(&self) -> String {
        match &self.page_fragment {
            Some(frag) => format!("{}#{}", self.id, frag),
            None => self.id.clone(),
        }
    }

    pub fn page_fragment(&self) -> Option<&PageFragment> {
        self.page_fragment.as_ref()
    }
}

/// Shared registry of live payloads.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `payload` and return the only handle to it.
    pub fn create(&self, payload: Payload, page_fragment: Option<PageFragment>) -> LocalHandle {
        let id = format!("{}{}", HANDLE_SCHEME, uuid::Uuid::new_v4());
        self.objects().insert(
            id.clone(),
            StoredObject {
                bytes: Arc::from(payload.bytes),
                content_type: payload.content_type,
            },
        );
        tracing::debug!(handle = %id, "created local handle");
        LocalHandle { id, page_fragment }
    }

    /// Look up the bytes behind a handle address. Any `#...` anchor is
    /// ignored.
    pub fn get(&self, address: &str) -> Option<StoredObject> {
        let id = address.split('#').next().unwrap_or(address);
        self.objects().get(id).cloned()
    }

    /// Release `handle`. Returns false if it was not registered here.
    pub fn revoke(&self, handle: LocalHandle) -> bool {
        let removed = self.objects().remove(&handle.id).is_some();
        tracing::debug!(handle = %handle.id, removed, "revoked local handle");
        removed
    }

    /// Number of payloads still registered.
    pub fn live_count(&self) -> usize {
        self.objects().len()
    }
}
