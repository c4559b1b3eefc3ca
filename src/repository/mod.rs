//! Repository façade over the entity store.
//!
//! Adds album reconciliation to every call that reads or mutates the album
//! collection and exposes typed finders. Reconciliation runs while the album
//! lock is held, so the read, the fix-up and the write-back cannot interleave
//! with another writer.

pub mod error;
pub mod reconcile;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{Album, Entity, EntityKind, Photo, Tag};
use crate::store::{
    open_storage, AlbumEdit, EntityCounts, EntityStorage, JsonStore, NewEntities,
};
use crate::types::StorageKind;

pub use error::RepositoryError;
pub use reconcile::{reconcile, reconcile_albums, Reconciliation, DEFAULT_ALBUM_ID};

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Fail fast if the caller has already given up. Checked once, on entry.
fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RepositoryError::Cancelled);
    }
    Ok(())
}

pub struct Repository {
    storage: Arc<dyn EntityStorage>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("counts", &self.storage.counts())
            .field("dirty", &self.storage.is_dirty())
            .finish()
    }
}

impl Repository {
    /// Open the configured backend and load whatever it already holds.
    ///
    /// An unusable backend falls back to the JSON store over the same
    /// directory; a failed load is logged and the catalog starts empty.
    pub async fn open(kind: StorageKind, data_dir: &Path, save_interval: Duration) -> Self {
        let storage = match open_storage(kind, data_dir, save_interval) {
            Ok(storage) => storage,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to JSON storage");
                Arc::new(JsonStore::new(data_dir, save_interval))
            }
        };

        let repo = Self::with_storage(storage);
        if let Err(e) = repo.load_data().await {
            tracing::warn!(error = %e, "Failed to load catalog, starting empty");
        }
        repo
    }

    pub fn with_storage(storage: Arc<dyn EntityStorage>) -> Self {
        Self { storage }
    }

    /// Start background persistence if the backend supports it.
    pub fn init_storage(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let handle = Arc::clone(&self.storage).start_autosave(shutdown);
        if handle.is_none() {
            tracing::debug!("Storage backend has no autosave");
        }
        handle
    }

    pub async fn save_entity(&self, entity: Entity) -> Result<()> {
        self.storage.save(entity).await?;
        Ok(())
    }

    pub async fn save_entities(&self, entities: Vec<Entity>) -> Result<()> {
        self.storage.save_batch(entities).await?;
        Ok(())
    }

    /// Force a write of pending changes. Returns whether anything was written.
    pub async fn persist_data(&self) -> Result<bool> {
        Ok(self.storage.persist().await?)
    }

    pub async fn load_data(&self) -> Result<()> {
        self.storage.load().await?;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.storage.is_dirty()
    }

    pub fn all_photos(&self) -> Vec<Photo> {
        self.storage.photos()
    }

    pub fn all_tags(&self) -> Vec<Tag> {
        self.storage.tags()
    }

    /// All albums, reconciled, default album first.
    ///
    /// If reconciliation had to fix anything the repaired list is written
    /// back and persisted, so this read can modify the store.
    pub async fn all_albums(&self, cancel: &CancellationToken) -> Result<Vec<Album>> {
        ensure_live(cancel)?;

        let mut view = Vec::new();
        let mut failure = None;
        let changed = self
            .storage
            .modify_albums(&mut |albums: &mut Vec<Album>| match reconcile(albums) {
                Ok(reconciled) => {
                    view = reconciled.view();
                    reconciled.write_back(albums)
                }
                Err(e) => {
                    failure = Some(e);
                    AlbumEdit::Unchanged
                }
            });
        if let Some(e) = failure {
            return Err(e);
        }

        if changed {
            tracing::info!(albums = view.len(), "Album collection reconciled");
            self.storage.persist().await?;
        }
        Ok(view)
    }

    pub fn entity_counts(&self) -> EntityCounts {
        self.storage.counts()
    }

    /// Records added since the previous call, per kind. Consumes the cursors.
    pub fn new_entities(&self) -> NewEntities {
        NewEntities {
            photos: self.storage.new_photos(),
            albums: self.storage.new_albums(),
            tags: self.storage.new_tags(),
        }
    }

    pub fn find_photo(&self, id: i64) -> Result<Photo> {
        self.storage
            .photos()
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound {
                kind: EntityKind::Photo,
                id,
            })
    }

    pub fn find_tag(&self, id: i64) -> Result<Tag> {
        self.storage
            .tags()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(RepositoryError::NotFound {
                kind: EntityKind::Tag,
                id,
            })
    }

    pub async fn find_album(&self, cancel: &CancellationToken, id: i64) -> Result<Album> {
        ensure_live(cancel)?;
        self.all_albums(cancel)
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound {
                kind: EntityKind::Album,
                id,
            })
    }

    /// Look up a record by kind name, as typed by a user.
    pub async fn find_entity(
        &self,
        cancel: &CancellationToken,
        kind: &str,
        id: i64,
    ) -> Result<Entity> {
        let kind = EntityKind::from_name(kind)
            .ok_or_else(|| RepositoryError::UnrecognizedKind(kind.to_string()))?;
        match kind {
            EntityKind::Photo => self.find_photo(id).map(Entity::from),
            EntityKind::Album => self.find_album(cancel, id).await.map(Entity::from),
            EntityKind::Tag => self.find_tag(id).map(Entity::from),
        }
    }

    /// Insert a new album and return its identifier.
    ///
    /// Any identifier on `album` is ignored: the new one is one above the
    /// largest identifier after reconciliation. `created_at` is stamped if
    /// unset.
    pub async fn add_album(&self, cancel: &CancellationToken, album: Album) -> Result<i64> {
        ensure_live(cancel)?;
        album.validate()?;

        let mut new_id = DEFAULT_ALBUM_ID;
        let mut failure = None;
        self.storage.modify_albums(&mut |albums: &mut Vec<Album>| {
            let reconciled = match reconcile(albums).and_then(|r| r.next_id().map(|id| (r, id))) {
                Ok((reconciled, id)) => {
                    new_id = id;
                    reconciled
                }
                Err(e) => {
                    failure = Some(e);
                    return AlbumEdit::Unchanged;
                }
            };

            let mut record = album.clone();
            record.id = new_id;
            if record.created_at.is_none() {
                record.created_at = Some(Utc::now());
            }

            let Reconciliation {
                mut stored,
                origins,
            } = reconciled;
            stored.push(record);
            *albums = stored;
            AlbumEdit::Rewritten { origins }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        self.storage.persist().await?;
        tracing::info!(id = new_id, name = %album.name, "Album added");
        Ok(new_id)
    }

    /// Replace every field of album `id` except the identifier and the
    /// original creation time.
    pub async fn update_album(
        &self,
        cancel: &CancellationToken,
        id: i64,
        updated: Album,
    ) -> Result<Album> {
        ensure_live(cancel)?;
        updated.validate()?;

        let mut stored: Option<Album> = None;
        let mut failure = None;
        let changed = self.storage.modify_albums(&mut |albums: &mut Vec<Album>| {
            let mut reconciled = match reconcile(albums) {
                Ok(reconciled) => reconciled,
                Err(e) => {
                    failure = Some(e);
                    return AlbumEdit::Unchanged;
                }
            };

            let Some(idx) = reconciled.stored.iter().position(|a| a.id == id) else {
                return reconciled.write_back(albums);
            };
            let mut record = updated.clone();
            record.id = id;
            record.created_at = reconciled.stored[idx].created_at;
            reconciled.stored[idx] = record.clone();
            stored = Some(record);

            *albums = reconciled.stored;
            AlbumEdit::Rewritten {
                origins: reconciled.origins,
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        if changed {
            self.storage.persist().await?;
        }
        let album = stored.ok_or(RepositoryError::NotFound {
            kind: EntityKind::Album,
            id,
        })?;
        tracing::info!(id, name = %album.name, "Album updated");
        Ok(album)
    }

    pub async fn delete_album(&self, cancel: &CancellationToken, id: i64) -> Result<()> {
        ensure_live(cancel)?;

        let mut removed = false;
        let mut failure = None;
        let changed = self.storage.modify_albums(&mut |albums: &mut Vec<Album>| {
            let mut reconciled = match reconcile(albums) {
                Ok(reconciled) => reconciled,
                Err(e) => {
                    failure = Some(e);
                    return AlbumEdit::Unchanged;
                }
            };

            let Some(idx) = reconciled.stored.iter().position(|a| a.id == id) else {
                return reconciled.write_back(albums);
            };
            reconciled.stored.remove(idx);
            reconciled.origins.remove(idx);
            removed = true;

            *albums = reconciled.stored;
            AlbumEdit::Rewritten {
                origins: reconciled.origins,
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        if changed {
            self.storage.persist().await?;
        }
        if !removed {
            return Err(RepositoryError::NotFound {
                kind: EntityKind::Album,
                id,
            });
        }
        tracing::info!(id, "Album deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlbumValidationError, DEFAULT_ALBUM_DESCRIPTION, DEFAULT_ALBUM_NAME};

    const LONG: Duration = Duration::from_secs(3600);

    fn repo(dir: &Path) -> Repository {
        Repository::with_storage(Arc::new(JsonStore::new(dir, LONG)))
    }

    fn user_album(id: i64, name: &str) -> Album {
        Album {
            id,
            name: name.to_string(),
            description: format!("about {}", name),
            tags: Vec::new(),
            created_at: None,
        }
    }

    fn read_albums_file(dir: &Path) -> Vec<Album> {
        let raw = std::fs::read_to_string(dir.join("albums.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_any_number_of_defaults_collapse_to_one() {
        for n in 1..=4 {
            let dir = tempfile::tempdir().unwrap();
            let repo = repo(dir.path());
            let cancel = CancellationToken::new();

            for i in 0..n {
                let mut a = Album::default_album(Utc::now());
                a.id = i * 10;
                repo.save_entity(a.into()).await.unwrap();
            }

            let albums = repo.all_albums(&cancel).await.unwrap();
            let defaults: Vec<_> = albums.iter().filter(|a| a.is_default()).collect();
            assert_eq!(defaults.len(), 1, "n = {}", n);
            assert_eq!(defaults[0].id, 0);
            assert_eq!(defaults[0].name, DEFAULT_ALBUM_NAME);
            assert_eq!(defaults[0].description, DEFAULT_ALBUM_DESCRIPTION);
        }
    }

    #[tokio::test]
    async fn test_two_defaults_read_back_as_one() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entities(vec![
            Album::default_album(Utc::now()).into(),
            Album::default_album(Utc::now()).into(),
        ])
        .await
        .unwrap();

        let albums = repo.all_albums(&cancel).await.unwrap();
        assert_eq!(albums.len(), 1);
        // The repair is written back and persisted
        assert_eq!(repo.entity_counts().albums, 1);
        assert!(!repo.is_dirty());
        assert_eq!(read_albums_file(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_consistent_read_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entity(user_album(1, "a").into()).await.unwrap();
        repo.persist_data().await.unwrap();
        std::fs::write(dir.path().join("albums.json"), "[]").unwrap();

        let albums = repo.all_albums(&cancel).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("albums.json")).unwrap(),
            "[]"
        );
    }

    #[tokio::test]
    async fn test_add_album_ignores_supplied_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entities(vec![
            Album::default_album(Utc::now()).into(),
            user_album(3, "a").into(),
            user_album(7, "b").into(),
        ])
        .await
        .unwrap();

        let id = repo
            .add_album(&cancel, user_album(2, "new"))
            .await
            .unwrap();
        assert_eq!(id, 8);

        let id = repo
            .add_album(&cancel, user_album(500, "newer"))
            .await
            .unwrap();
        assert_eq!(id, 9);

        let stored = repo.find_album(&cancel, 9).await.unwrap();
        assert_eq!(stored.name, "newer");
    }

    #[tokio::test]
    async fn test_add_album_on_empty_and_default_only_store() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        assert_eq!(repo.add_album(&cancel, user_album(0, "first")).await.unwrap(), 1);

        let dir = tempfile::tempdir().unwrap();
        let seeded = self::repo(dir.path());
        seeded
            .save_entity(Album::default_album(Utc::now()).into())
            .await
            .unwrap();
        assert_eq!(seeded.add_album(&cancel, user_album(0, "first")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_album_stamps_creation_time_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        let id = repo.add_album(&cancel, user_album(0, "a")).await.unwrap();
        let stored = repo.find_album(&cancel, id).await.unwrap();
        assert!(stored.created_at.is_some());

        let fixed_time = Utc::now() - chrono::Duration::days(3);
        let mut with_time = user_album(0, "b");
        with_time.created_at = Some(fixed_time);
        let id = repo.add_album(&cancel, with_time).await.unwrap();
        assert_eq!(
            repo.find_album(&cancel, id).await.unwrap().created_at,
            Some(fixed_time)
        );

        assert!(!repo.is_dirty());
        assert_eq!(read_albums_file(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_add_album_rejects_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        let err = repo.add_album(&cancel, user_album(0, "")).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Invalid(AlbumValidationError::EmptyName)
        ));
        assert_eq!(repo.entity_counts().albums, 0);
        assert!(!repo.is_dirty());
    }

    #[tokio::test]
    async fn test_album_at_max_id_reads_but_cannot_grow() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entity(user_album(i64::MAX, "top").into())
            .await
            .unwrap();
        repo.persist_data().await.unwrap();

        let albums = repo.all_albums(&cancel).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].id, i64::MAX);
        assert_eq!(repo.find_album(&cancel, i64::MAX).await.unwrap().name, "top");

        let err = repo
            .add_album(&cancel, user_album(0, "one more"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::IdSpaceExhausted));
        assert_eq!(repo.entity_counts().albums, 1);
        assert!(!repo.is_dirty());
    }

    #[tokio::test]
    async fn test_reassignment_past_max_id_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entities(vec![
            user_album(i64::MAX, "top").into(),
            user_album(0, "needs an id").into(),
        ])
        .await
        .unwrap();
        repo.persist_data().await.unwrap();

        assert!(matches!(
            repo.all_albums(&cancel).await,
            Err(RepositoryError::IdSpaceExhausted)
        ));
        assert!(matches!(
            repo.delete_album(&cancel, i64::MAX).await,
            Err(RepositoryError::IdSpaceExhausted)
        ));
        // The stored sequence is left as it was
        assert_eq!(repo.entity_counts().albums, 2);
        assert!(!repo.is_dirty());
        assert_eq!(read_albums_file(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_default_saved_after_drain_is_reported_new() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entity(user_album(1, "a").into()).await.unwrap();
        assert_eq!(repo.new_entities().albums.len(), 1);

        repo.save_entity(Album::default_album(Utc::now()).into())
            .await
            .unwrap();
        let albums = repo.all_albums(&cancel).await.unwrap();
        assert!(albums[0].is_default());

        let fresh = repo.new_entities().albums;
        assert_eq!(fresh.len(), 1);
        assert!(fresh[0].is_default());
        assert_eq!(fresh[0].id, DEFAULT_ALBUM_ID);
        assert!(repo.new_entities().is_empty());
    }

    #[tokio::test]
    async fn test_cursor_survives_dedup_of_reported_records() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entities(vec![
            Album::default_album(Utc::now()).into(),
            user_album(1, "a").into(),
            Album::default_album(Utc::now()).into(),
        ])
        .await
        .unwrap();
        assert_eq!(repo.new_entities().albums.len(), 3);

        repo.save_entities(vec![user_album(1, "b").into(), user_album(5, "c").into()])
            .await
            .unwrap();
        assert_eq!(repo.all_albums(&cancel).await.unwrap().len(), 4);

        // The duplicate default is dropped and "b" is renumbered, but only
        // the records saved after the drain are new.
        let fresh = repo.new_entities().albums;
        let names: Vec<_> = fresh.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(fresh[0].id, 6);
        assert!(repo.new_entities().is_empty());
    }

    #[tokio::test]
    async fn test_added_album_is_reported_new_after_reconcile() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entities(vec![
            user_album(2, "a").into(),
            Album::default_album(Utc::now()).into(),
            Album::default_album(Utc::now()).into(),
        ])
        .await
        .unwrap();
        repo.new_entities();

        let id = repo.add_album(&cancel, user_album(0, "new")).await.unwrap();
        let fresh = repo.new_entities().albums;
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, id);
        assert_eq!(read_albums_file(dir.path()).len(), 3);
    }

    #[tokio::test]
    async fn test_update_album_keeps_id_and_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        let id = repo.add_album(&cancel, user_album(0, "old")).await.unwrap();
        let created = repo.find_album(&cancel, id).await.unwrap().created_at;

        let mut changes = user_album(99, "renamed");
        changes.tags = vec!["travel".to_string()];
        changes.created_at = Some(Utc::now() + chrono::Duration::days(1));
        let updated = repo.update_album(&cancel, id, changes).await.unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.tags, vec!["travel".to_string()]);
        assert_eq!(updated.created_at, created);
        assert_eq!(repo.find_album(&cancel, id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_album_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        let err = repo
            .update_album(&cancel, 12, user_album(0, "x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_album_leaves_collection_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.add_album(&cancel, user_album(0, "a")).await.unwrap();
        repo.add_album(&cancel, user_album(0, "b")).await.unwrap();
        let before = repo.all_albums(&cancel).await.unwrap();

        let err = repo.delete_album(&cancel, 404).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.all_albums(&cancel).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_album_removes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        let a = repo.add_album(&cancel, user_album(0, "a")).await.unwrap();
        let b = repo.add_album(&cancel, user_album(0, "b")).await.unwrap();
        repo.delete_album(&cancel, a).await.unwrap();

        let albums = repo.all_albums(&cancel).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].id, b);
        assert_eq!(read_albums_file(dir.path()).len(), 1);
        assert!(repo.find_album(&cancel, a).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits_album_ops() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        repo.save_entities(vec![
            Album::default_album(Utc::now()).into(),
            Album::default_album(Utc::now()).into(),
        ])
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            repo.all_albums(&cancel).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repo.find_album(&cancel, 0).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repo.add_album(&cancel, user_album(0, "a")).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repo.update_album(&cancel, 0, user_album(0, "a")).await,
            Err(RepositoryError::Cancelled)
        ));
        assert!(matches!(
            repo.delete_album(&cancel, 0).await,
            Err(RepositoryError::Cancelled)
        ));
        // Nothing was reconciled or added
        assert_eq!(repo.entity_counts().albums, 2);
    }

    #[tokio::test]
    async fn test_find_entity_by_kind_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let cancel = CancellationToken::new();

        repo.save_entities(vec![
            Tag::new(4, "city", Utc::now()).into(),
            Photo::new(2, "p.jpg", "/p.jpg", Utc::now()).into(),
        ])
        .await
        .unwrap();

        let found = repo.find_entity(&cancel, "tag", 4).await.unwrap();
        assert_eq!(found.name(), "city");
        let found = repo.find_entity(&cancel, "photos", 2).await.unwrap();
        assert_eq!(found.kind(), EntityKind::Photo);

        let err = repo.find_entity(&cancel, "comment", 1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UnrecognizedKind(ref k) if k == "comment"));

        assert!(repo.find_tag(99).unwrap_err().is_not_found());
        assert!(repo.find_photo(99).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_new_entities_consumed_once() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());

        repo.save_entities(vec![
            Tag::new(1, "a", Utc::now()).into(),
            Album::default_album(Utc::now()).into(),
        ])
        .await
        .unwrap();

        let first = repo.new_entities();
        assert_eq!(first.len(), 2);
        assert!(repo.new_entities().is_empty());
    }

    #[tokio::test]
    async fn test_open_falls_back_to_json_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = Repository::open(StorageKind::Json, dir.path(), LONG).await;
            repo.save_entity(Tag::new(1, "sea", Utc::now()).into())
                .await
                .unwrap();
            repo.persist_data().await.unwrap();
        }

        let repo = Repository::open(StorageKind::Postgres, dir.path(), LONG).await;
        assert_eq!(repo.entity_counts().tags, 1);
        assert_eq!(repo.all_tags()[0].name, "sea");
    }

    #[tokio::test]
    async fn test_init_storage_starts_autosave() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let shutdown = CancellationToken::new();
        let handle = repo.init_storage(shutdown.clone()).unwrap();

        repo.save_entity(Tag::new(1, "a", Utc::now()).into())
            .await
            .unwrap();
        shutdown.cancel();
        handle.await.unwrap();

        assert!(!repo.is_dirty());
        assert!(dir.path().join("tags.json").exists());
    }
}
