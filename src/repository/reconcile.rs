//! Album reconciliation.
//!
//! Repeated or overlapping writes can leave several copies of the default
//! album and colliding identifiers in the album sequence. Reconciliation
//! rebuilds a consistent list: exactly one default album with id 0, and
//! unique positive ids for everything else.

use std::collections::HashSet;

use super::error::RepositoryError;
use crate::models::Album;
use crate::store::AlbumEdit;

/// Identifier reserved for the default album.
pub const DEFAULT_ALBUM_ID: i64 = 0;

/// Reconciled album sequence, still in stored order.
///
/// Records are never moved relative to each other, only dropped or
/// renumbered, so the store's "new since" cursor stays meaningful after a
/// write-back.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Surviving records in stored order, identifiers fixed.
    pub stored: Vec<Album>,
    /// Input index of each record in `stored`. Strictly increasing.
    pub origins: Vec<usize>,
}

impl Reconciliation {
    /// The default album first, then every other album in stored order.
    pub fn view(&self) -> Vec<Album> {
        let mut view = Vec::with_capacity(self.stored.len());
        view.extend(self.stored.iter().filter(|a| a.is_default()).cloned());
        view.extend(self.stored.iter().filter(|a| !a.is_default()).cloned());
        view
    }

    /// Identifier for a new album: one above the current maximum.
    pub fn next_id(&self) -> Result<i64, RepositoryError> {
        max_album_id(&self.stored)
            .checked_add(1)
            .ok_or(RepositoryError::IdSpaceExhausted)
    }

    /// Store the reconciled sequence into `albums` if it differs.
    pub fn write_back(self, albums: &mut Vec<Album>) -> AlbumEdit {
        if self.stored == *albums {
            return AlbumEdit::Unchanged;
        }
        *albums = self.stored;
        AlbumEdit::Rewritten {
            origins: self.origins,
        }
    }
}

/// Reconcile `albums`, keeping stored order.
///
/// The first default album (in sequence order) is kept and forced to id 0;
/// later copies are dropped. Other albums keep their id unless it is
/// non-positive or already taken, in which case they get the next id above
/// the current maximum. Fails only when that next id would overflow.
pub fn reconcile(albums: &[Album]) -> Result<Reconciliation, RepositoryError> {
    let mut max_id = albums
        .iter()
        .filter(|a| !a.is_default())
        .map(|a| a.id)
        .filter(|&id| id > 0)
        .max()
        .unwrap_or(DEFAULT_ALBUM_ID);

    let mut placed = HashSet::with_capacity(albums.len());
    let mut stored = Vec::with_capacity(albums.len());
    let mut origins = Vec::with_capacity(albums.len());
    let mut seen_default = false;

    for (idx, album) in albums.iter().enumerate() {
        let mut album = album.clone();
        if album.is_default() {
            if seen_default {
                continue;
            }
            seen_default = true;
            album.id = DEFAULT_ALBUM_ID;
        } else if album.id <= 0 || placed.contains(&album.id) {
            max_id = max_id
                .checked_add(1)
                .ok_or(RepositoryError::IdSpaceExhausted)?;
            album.id = max_id;
        }
        placed.insert(album.id);
        stored.push(album);
        origins.push(idx);
    }

    Ok(Reconciliation { stored, origins })
}

/// Reconciled albums in presentation order: default first.
pub fn reconcile_albums(albums: &[Album]) -> Result<Vec<Album>, RepositoryError> {
    reconcile(albums).map(|r| r.view())
}

/// Largest identifier in `albums`, or 0 when empty.
pub fn max_album_id(albums: &[Album]) -> i64 {
    albums
        .iter()
        .map(|a| a.id)
        .max()
        .unwrap_or(DEFAULT_ALBUM_ID)
        .max(DEFAULT_ALBUM_ID)
}
