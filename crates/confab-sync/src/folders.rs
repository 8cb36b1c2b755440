//! Remote folder hierarchy
//!
//! Lazily mirrors local relative directory paths onto the remote side.
//! Each path component is resolved at most once per session: a find in
//! the parent's listing, then a create if absent, with the resulting id
//! cached under the accumulated relative path.
//!
//! ## Design Notes
//!
//! - The cache is a [`DashMap`] so concurrent upload tasks can share one
//!   [`FolderCache`] without an outer lock. No cache entry lock is held
//!   across a network call, so two tasks may race the same component;
//!   find-before-create keeps the remote tree correct either way, and the
//!   second resolution just overwrites the cache with the same id.

use std::sync::Arc;

use confab_core::domain::{DomainError, RemoteId};
use confab_core::ports::remote_store::IRemoteStore;
use dashmap::DashMap;
use tracing::debug;

/// Resolves and caches remote folder ids for relative directory paths
pub struct FolderCache {
    store: Arc<dyn IRemoteStore>,
    root_id: RemoteId,
    /// Accumulated relative directory path to remote folder id
    ids: DashMap<String, RemoteId>,
}

impl FolderCache {
    /// Create a cache rooted at the given remote folder
    #[must_use]
    pub fn new(store: Arc<dyn IRemoteStore>, root_id: RemoteId) -> Self {
        Self {
            store,
            root_id,
            ids: DashMap::new(),
        }
    }

    /// Resolve the remote folder for a relative directory path
    ///
    /// Walks the path component by component, creating missing levels.
    /// The empty path and `"."` resolve to the root without any remote
    /// call.
    ///
    /// # Errors
    /// Propagates the first listing or creation failure.
    pub async fn ensure(&self, rel_dir: &str) -> Result<RemoteId, DomainError> {
        if rel_dir.is_empty() || rel_dir == "." {
            return Ok(self.root_id.clone());
        }

        let mut parent = self.root_id.clone();
        let mut walked = String::new();

        for component in rel_dir.split('/').filter(|c| !c.is_empty() && *c != ".") {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(component);

            if let Some(cached) = self.ids.get(&walked) {
                parent = cached.value().clone();
                continue;
            }

            let id = match self.find_child_folder(&parent, component).await? {
                Some(id) => {
                    debug!(path = %walked, id = %id, "remote folder found");
                    id
                }
                None => {
                    let id = self.store.create_folder(component, &parent).await?;
                    debug!(path = %walked, id = %id, "remote folder created");
                    id
                }
            };

            self.ids.insert(walked.clone(), id.clone());
            parent = id;
        }

        Ok(parent)
    }

    /// Search every page of a folder's listing for a subfolder by name
    async fn find_child_folder(
        &self,
        parent: &RemoteId,
        name: &str,
    ) -> Result<Option<RemoteId>, DomainError> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_children(parent, page_token.as_deref())
                .await?;

            if let Some(found) = page
                .objects
                .into_iter()
                .find(|o| o.is_folder && o.name == name)
            {
                return Ok(Some(found.id));
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }
}
