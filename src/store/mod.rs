//! In-memory entity store mirrored to JSON files.
//!
//! The store keeps one ordered sequence per entity kind plus a dirty flag.
//! Mutations only touch memory; the file mirror is refreshed by
//! [`EntityStorage::persist`], either opportunistically once the save
//! interval has elapsed or from the background autosave task.

pub mod error;
pub mod json;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{Album, Entity, Photo, Tag};
use crate::types::StorageKind;

pub use error::StoreError;
pub use json::JsonStore;

/// Number of records of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub photos: usize,
    pub albums: usize,
    pub tags: usize,
}

impl EntityCounts {
    /// True if any kind grew compared to `earlier`.
    pub fn grew_since(&self, earlier: &EntityCounts) -> bool {
        self.photos > earlier.photos || self.albums > earlier.albums || self.tags > earlier.tags
    }
}

/// Records appended since the previous cursor read, per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntities {
    pub photos: Vec<Photo>,
    pub albums: Vec<Album>,
    pub tags: Vec<Tag>,
}

impl NewEntities {
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty() && self.albums.is_empty() && self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.photos.len() + self.albums.len() + self.tags.len()
    }
}

/// What an album edit did to the sequence it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumEdit {
    Unchanged,
    /// The sequence was rewritten. `origins[i]` is the pre-edit index of the
    /// record now at position `i` and must be strictly increasing; positions
    /// at or past `origins.len()` hold records the edit appended.
    Rewritten { origins: Vec<usize> },
}

/// Storage backend operations.
///
/// This trait is object-safe and is used as `Arc<dyn EntityStorage>` by the
/// repository so the backend can be selected at runtime.
#[async_trait]
pub trait EntityStorage: Send + Sync {
    /// Append a single entity. May persist synchronously if the save
    /// interval has elapsed.
    async fn save(&self, entity: Entity) -> Result<(), StoreError>;

    /// Append a batch, grouped by kind. The dirty flag is raised once.
    async fn save_batch(&self, entities: Vec<Entity>) -> Result<(), StoreError>;

    /// Replace in-memory state with the contents of the backing files.
    async fn load(&self) -> Result<(), StoreError>;

    /// Write everything out if dirty. Returns whether anything was written.
    async fn persist(&self) -> Result<bool, StoreError>;

    fn photos(&self) -> Vec<Photo>;
    fn albums(&self) -> Vec<Album>;
    fn tags(&self) -> Vec<Tag>;
    fn counts(&self) -> EntityCounts;

    /// Photos appended since the previous call; advances the photo cursor.
    fn new_photos(&self) -> Vec<Photo>;
    /// Albums appended since the previous call; advances the album cursor.
    fn new_albums(&self) -> Vec<Album>;
    /// Tags appended since the previous call; advances the tag cursor.
    fn new_tags(&self) -> Vec<Tag>;

    /// Run `edit` against the album sequence while holding the album lock.
    /// A rewrite marks the store dirty and moves the album cursor so that
    /// records already reported stay reported. Returns whether the sequence
    /// was rewritten.
    fn modify_albums(&self, edit: &mut dyn FnMut(&mut Vec<Album>) -> AlbumEdit) -> bool;

    fn is_dirty(&self) -> bool;

    /// Start periodic background persistence. Backends without a local
    /// mirror return `None`.
    fn start_autosave(self: Arc<Self>, _shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        None
    }
}

/// Construct the storage backend selected by configuration.
pub fn open_storage(
    kind: StorageKind,
    data_dir: &Path,
    save_interval: Duration,
) -> Result<Arc<dyn EntityStorage>, StoreError> {
    match kind {
        StorageKind::Json => {
            tracing::info!(
                data_dir = %data_dir.display(),
                interval = ?save_interval,
                "Using JSON storage"
            );
            Ok(Arc::new(JsonStore::new(data_dir, save_interval)))
        }
        StorageKind::Postgres | StorageKind::Mongodb => {
            Err(StoreError::UnsupportedBackend(kind.as_str().to_string()))
        }
    }
}
