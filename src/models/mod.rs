//! Catalog entities.
//!
//! Every record the store holds is one of three kinds. [`Entity`] is the
//! closed sum over them; code that needs to route a record by kind matches
//! on it exhaustively.

pub mod album;
pub mod photo;
pub mod tag;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use album::{Album, AlbumValidationError, DEFAULT_ALBUM_DESCRIPTION, DEFAULT_ALBUM_NAME};
pub use photo::{Metadata, Photo, StorageType};
pub use tag::Tag;

/// Kind tag shared by all entity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Photo,
    Album,
    Tag,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Photo, EntityKind::Album, EntityKind::Tag];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Album => "album",
            Self::Tag => "tag",
        }
    }

    /// Parse a kind name as typed by a user. Accepts singular and plural
    /// forms, case-insensitively.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" | "photos" => Some(Self::Photo),
            "album" | "albums" => Some(Self::Album),
            "tag" | "tags" => Some(Self::Tag),
            _ => None,
        }
    }

    /// Name of the JSON file mirroring this kind inside the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Photo => "photos.json",
            Self::Album => "albums.json",
            Self::Tag => "tags.json",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Photo(Photo),
    Album(Album),
    Tag(Tag),
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Self::Photo(p) => p.id,
            Self::Album(a) => a.id,
            Self::Tag(t) => t.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Photo(_) => EntityKind::Photo,
            Self::Album(_) => EntityKind::Album,
            Self::Tag(_) => EntityKind::Tag,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Photo(p) => &p.name,
            Self::Album(a) => &a.name,
            Self::Tag(t) => &t.name,
        }
    }
}

impl From<Photo> for Entity {
    fn from(photo: Photo) -> Self {
        Self::Photo(photo)
    }
}

impl From<Album> for Entity {
    fn from(album: Album) -> Self {
        Self::Album(album)
    }
}

impl From<Tag> for Entity {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}
