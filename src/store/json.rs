//! JSON-mirrored implementation of [`EntityStorage`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::StoreError;
use super::{AlbumEdit, EntityCounts, EntityStorage};
use crate::models::{Album, Entity, EntityKind, Photo, Tag};

/// Lower bound for the autosave ticker; `tokio::time::interval` rejects zero.
const MIN_AUTOSAVE_PERIOD: Duration = Duration::from_millis(10);

/// One kind's records plus the "already reported" cursor.
#[derive(Debug)]
struct Collection<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Clone> Collection<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }

    fn reset(&mut self, items: Vec<T>) {
        self.cursor = items.len();
        self.items = items;
    }

    fn take_new(&mut self) -> Vec<T> {
        if self.cursor >= self.items.len() {
            self.cursor = self.items.len();
            return Vec::new();
        }
        let fresh = self.items[self.cursor..].to_vec();
        self.cursor = self.items.len();
        fresh
    }
}

#[derive(Debug)]
struct SaveState {
    dirty: bool,
    /// Bumped on every mutation. A persist only clears `dirty` if no
    /// mutation landed between its snapshot and its completion.
    generation: u64,
    last_saved: Instant,
}

/// In-memory catalog mirrored to `photos.json`, `albums.json` and
/// `tags.json` inside `data_dir`.
///
/// Each kind has its own lock; `meta` guards the dirty flag and save
/// timestamp. No method holds two kind locks at the same time, and no std
/// lock is held across an `.await`. File writes are serialised by `writer`.
pub struct JsonStore {
    data_dir: PathBuf,
    save_interval: Duration,
    photos: Mutex<Collection<Photo>>,
    albums: Mutex<Collection<Album>>,
    tags: Mutex<Collection<Tag>>,
    meta: Mutex<SaveState>,
    writer: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("data_dir", &self.data_dir)
            .field("save_interval", &self.save_interval)
            .finish_non_exhaustive()
    }
}

/// Records are plain vectors, so a panic while a guard was held cannot leave
/// them half-updated; recover the guard instead of propagating the poison.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JsonStore {
    /// Create an empty store over `data_dir`. Nothing is read until
    /// [`EntityStorage::load`] is called.
    pub fn new(data_dir: &Path, save_interval: Duration) -> Self {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            // Not fatal: persist retries the mkdir and reports the error.
            tracing::warn!(
                path = %data_dir.display(),
                error = %e,
                "Failed to create data directory"
            );
        }

        Self {
            data_dir: data_dir.to_path_buf(),
            save_interval,
            photos: Mutex::new(Collection::new()),
            albums: Mutex::new(Collection::new()),
            tags: Mutex::new(Collection::new()),
            meta: Mutex::new(SaveState {
                dirty: false,
                generation: 0,
                last_saved: Instant::now(),
            }),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Raise the dirty flag and decide, in the same critical section,
    /// whether the save interval has run out.
    fn mark_dirty(&self) -> bool {
        let mut meta = lock(&self.meta);
        meta.dirty = true;
        meta.generation = meta.generation.wrapping_add(1);
        meta.last_saved.elapsed() > self.save_interval
    }

    async fn persist_if_due(&self, due: bool) -> Result<(), StoreError> {
        if due {
            self.persist().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStorage for JsonStore {
    async fn save(&self, entity: Entity) -> Result<(), StoreError> {
        let kind = entity.kind();
        let id = entity.id();
        let name = entity.name().to_string();

        match entity {
            Entity::Photo(photo) => lock(&self.photos).items.push(photo),
            Entity::Album(album) => lock(&self.albums).items.push(album),
            Entity::Tag(tag) => lock(&self.tags).items.push(tag),
        }
        tracing::debug!(kind = %kind, id, name = %name, "Entity added");

        let due = self.mark_dirty();
        self.persist_if_due(due).await
    }

    async fn save_batch(&self, entities: Vec<Entity>) -> Result<(), StoreError> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut photos = Vec::new();
        let mut albums = Vec::new();
        let mut tags = Vec::new();
        for entity in entities {
            match entity {
                Entity::Photo(p) => photos.push(p),
                Entity::Album(a) => albums.push(a),
                Entity::Tag(t) => tags.push(t),
            }
        }

        let counts = EntityCounts {
            photos: photos.len(),
            albums: albums.len(),
            tags: tags.len(),
        };
        if !photos.is_empty() {
            lock(&self.photos).items.append(&mut photos);
        }
        if !albums.is_empty() {
            lock(&self.albums).items.append(&mut albums);
        }
        if !tags.is_empty() {
            lock(&self.tags).items.append(&mut tags);
        }
        tracing::debug!(
            photos = counts.photos,
            albums = counts.albums,
            tags = counts.tags,
            "Batch added"
        );

        let due = self.mark_dirty();
        self.persist_if_due(due).await
    }

    async fn load(&self) -> Result<(), StoreError> {
        let photos: Vec<Photo> = read_collection(&self.path_for(EntityKind::Photo)).await?;
        let albums: Vec<Album> = read_collection(&self.path_for(EntityKind::Album)).await?;
        let tags: Vec<Tag> = read_collection(&self.path_for(EntityKind::Tag)).await?;

        let counts = EntityCounts {
            photos: photos.len(),
            albums: albums.len(),
            tags: tags.len(),
        };
        lock(&self.photos).reset(photos);
        lock(&self.albums).reset(albums);
        lock(&self.tags).reset(tags);

        tracing::info!(
            photos = counts.photos,
            albums = counts.albums,
            tags = counts.tags,
            "Catalog loaded"
        );
        Ok(())
    }

    async fn persist(&self) -> Result<bool, StoreError> {
        let _writer = self.writer.lock().await;

        let generation = {
            let meta = lock(&self.meta);
            if !meta.dirty {
                return Ok(false);
            }
            meta.generation
        };

        let photos = lock(&self.photos).items.clone();
        let albums = lock(&self.albums).items.clone();
        let tags = lock(&self.tags).items.clone();

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.data_dir.clone(),
                source,
            })?;

        // Always write all three files, even empty ones.
        write_collection(&self.path_for(EntityKind::Photo), "photos", &photos).await?;
        write_collection(&self.path_for(EntityKind::Album), "albums", &albums).await?;
        write_collection(&self.path_for(EntityKind::Tag), "tags", &tags).await?;

        let still_dirty = {
            let mut meta = lock(&self.meta);
            meta.last_saved = Instant::now();
            if meta.generation == generation {
                meta.dirty = false;
            }
            meta.dirty
        };

        tracing::info!(
            data_dir = %self.data_dir.display(),
            photos = photos.len(),
            albums = albums.len(),
            tags = tags.len(),
            "Catalog persisted"
        );
        if still_dirty {
            tracing::debug!("Store changed during persist, staying dirty");
        }
        Ok(true)
    }

    fn photos(&self) -> Vec<Photo> {
        lock(&self.photos).items.clone()
    }

    fn albums(&self) -> Vec<Album> {
        lock(&self.albums).items.clone()
    }

    fn tags(&self) -> Vec<Tag> {
        lock(&self.tags).items.clone()
    }

    fn counts(&self) -> EntityCounts {
        EntityCounts {
            photos: lock(&self.photos).items.len(),
            albums: lock(&self.albums).items.len(),
            tags: lock(&self.tags).items.len(),
        }
    }

    fn new_photos(&self) -> Vec<Photo> {
        lock(&self.photos).take_new()
    }

    fn new_albums(&self) -> Vec<Album> {
        lock(&self.albums).take_new()
    }

    fn new_tags(&self) -> Vec<Tag> {
        lock(&self.tags).take_new()
    }

    fn modify_albums(&self, edit: &mut dyn FnMut(&mut Vec<Album>) -> AlbumEdit) -> bool {
        let changed = {
            let mut albums = lock(&self.albums);
            match edit(&mut albums.items) {
                AlbumEdit::Unchanged => false,
                AlbumEdit::Rewritten { origins } => {
                    // Survivors keep their relative order, so the reported
                    // prefix is exactly the survivors that came from it.
                    let reported = albums.cursor;
                    let still_reported = origins.iter().take_while(|&&i| i < reported).count();
                    albums.cursor = still_reported.min(albums.items.len());
                    true
                }
            }
        };
        if changed {
            self.mark_dirty();
        }
        changed
    }

    fn is_dirty(&self) -> bool {
        lock(&self.meta).dirty
    }

    fn start_autosave(self: Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let period = self.save_interval.max(MIN_AUTOSAVE_PERIOD);
        tracing::info!(interval = ?period, "Autosave started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        if let Err(e) = self.persist().await {
                            tracing::error!(error = %e, "Final save on shutdown failed");
                        }
                        tracing::debug!("Autosave stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if self.is_dirty() {
                            if let Err(e) = self.persist().await {
                                tracing::error!(error = %e, io = e.is_io(), "Autosave failed, will retry");
                            }
                        }
                    }
                }
            }
        });

        Some(handle)
    }
}

/// Read one mirror file. Missing, empty and malformed files all yield an
/// empty collection; only real I/O failures are errors.
async fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No mirror file yet, starting empty");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice(&data) {
        Ok(items) => Ok(items),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Mirror file is not valid JSON, starting empty"
            );
            Ok(Vec::new())
        }
    }
}

/// Rewrite one mirror file through a temp file so readers never observe a
/// partially written array.
async fn write_collection<T: Serialize>(
    path: &Path,
    kind: &'static str,
    items: &[T],
) -> Result<(), StoreError> {
    let bytes =
        serde_json::to_vec_pretty(items).map_err(|source| StoreError::Serialize { kind, source })?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}
