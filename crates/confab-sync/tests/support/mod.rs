//! In-memory remote store double for engine tests
//!
//! Keeps a flat list of objects with parent links, counts calls per
//! operation, and lets tests script upload failures per call or across
//! the board.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use confab_core::domain::{ContentHash, DomainError, RemoteId};
use confab_core::ports::remote_store::{
    ChildPage, IRemoteStore, RemoteObject, UploadOutcome, UploadRequest,
};

/// One object in the fake remote tree
#[derive(Debug, Clone)]
pub struct FakeObject {
    pub id: RemoteId,
    pub parent: RemoteId,
    pub name: String,
    pub is_folder: bool,
    pub content_hash: Option<ContentHash>,
}

/// In-memory [`IRemoteStore`] with scripted failures and call counters
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<Vec<FakeObject>>,
    next_id: AtomicU32,
    /// Upload results in call order; `None` succeeds, `Some(status)` fails
    scripted_uploads: Mutex<VecDeque<Option<u16>>>,
    /// When set, every upload fails with this status
    broken_uploads: Mutex<Option<u16>>,
    pub list_calls: AtomicU32,
    pub folder_calls: AtomicU32,
    pub upload_calls: AtomicU32,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next uploads in call order
    pub fn script_uploads(&self, results: Vec<Option<u16>>) {
        *self.scripted_uploads.lock().unwrap() = results.into();
    }

    /// Make every upload fail with the given status
    pub fn break_uploads(&self, status: u16) {
        *self.broken_uploads.lock().unwrap() = Some(status);
    }

    /// Insert a remote file directly, bypassing upload
    pub fn insert_file(&self, parent: &RemoteId, name: &str, hash: &str) -> RemoteId {
        let id = self.fresh_id("seeded");
        self.objects.lock().unwrap().push(FakeObject {
            id: id.clone(),
            parent: parent.clone(),
            name: name.to_string(),
            is_folder: false,
            content_hash: Some(ContentHash::new(hash.to_string()).unwrap()),
        });
        id
    }

    /// Delete an object, simulating a remote-side removal
    pub fn remove_object(&self, id: &RemoteId) {
        self.objects.lock().unwrap().retain(|o| o.id != *id);
    }

    /// Overwrite an object's hash, simulating a remote-side edit
    pub fn set_content_hash(&self, id: &RemoteId, hash: &str) {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .iter_mut()
            .find(|o| o.id == *id)
            .expect("object should exist");
        object.content_hash = Some(ContentHash::new(hash.to_string()).unwrap());
    }

    pub fn find_by_name(&self, name: &str) -> Option<FakeObject> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.name == name)
            .cloned()
    }

    pub fn file_count(&self) -> usize {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| !o.is_folder)
            .count()
    }

    fn fresh_id(&self, prefix: &str) -> RemoteId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        RemoteId::new(format!("{prefix}-{n}")).unwrap()
    }

    fn next_upload_failure(&self) -> Option<u16> {
        if let Some(status) = *self.broken_uploads.lock().unwrap() {
            return Some(status);
        }
        self.scripted_uploads.lock().unwrap().pop_front().flatten()
    }
}

#[async_trait]
impl IRemoteStore for FakeStore {
    async fn list_children(
        &self,
        folder_id: &RemoteId,
        _page_token: Option<&str>,
    ) -> Result<ChildPage, DomainError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.parent == *folder_id)
            .map(|o| RemoteObject {
                id: o.id.clone(),
                name: o.name.clone(),
                is_folder: o.is_folder,
                content_hash: o.content_hash.clone(),
            })
            .collect();
        Ok(ChildPage {
            objects,
            next_page_token: None,
        })
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &RemoteId,
    ) -> Result<RemoteId, DomainError> {
        self.folder_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.fresh_id("folder");
        self.objects.lock().unwrap().push(FakeObject {
            id: id.clone(),
            parent: parent_id.clone(),
            name: name.to_string(),
            is_folder: true,
            content_hash: None,
        });
        Ok(id)
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadOutcome, DomainError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = self.next_upload_failure() {
            return Err(DomainError::Api {
                status,
                body: format!("scripted {status} failure"),
            });
        }

        let bytes = tokio::fs::read(request.local_path)
            .await
            .map_err(|e| DomainError::Io(format!("read {}: {e}", request.local_path.display())))?;
        let content_hash = ContentHash::new(format!("{:x}", md5::compute(&bytes))).unwrap();

        match request.existing_id {
            Some(existing) => {
                let mut objects = self.objects.lock().unwrap();
                let object = objects
                    .iter_mut()
                    .find(|o| o.id == *existing)
                    .ok_or_else(|| DomainError::Api {
                        status: 404,
                        body: format!("object {existing} not found"),
                    })?;
                object.name = request.file_name.to_string();
                object.content_hash = Some(content_hash.clone());
                Ok(UploadOutcome {
                    remote_id: existing.clone(),
                    content_hash,
                })
            }
            None => {
                let id = self.fresh_id("obj");
                self.objects.lock().unwrap().push(FakeObject {
                    id: id.clone(),
                    parent: request.parent_id.clone(),
                    name: request.file_name.to_string(),
                    is_folder: false,
                    content_hash: Some(content_hash.clone()),
                });
                Ok(UploadOutcome {
                    remote_id: id,
                    content_hash,
                })
            }
        }
    }
}
