use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the catch-all album every catalog carries.
pub const DEFAULT_ALBUM_NAME: &str = "Default";

/// Description that, together with [`DEFAULT_ALBUM_NAME`], marks the
/// catch-all album.
pub const DEFAULT_ALBUM_DESCRIPTION: &str = "Default album for all photos";

const MAX_NAME_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;

/// Reasons user-supplied album fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlbumValidationError {
    #[error("album name must not be empty")]
    EmptyName,

    #[error("album name is too long (max {max} characters)")]
    NameTooLong { max: usize },

    #[error("album description is too long (max {max} characters)")]
    DescriptionTooLong { max: usize },

    /// A tag is empty or contains whitespace.
    #[error("tags contain invalid characters: {tag:?}")]
    InvalidTag { tag: String },
}

/// A named collection of photos.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Unset until the repository stamps it on insert.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Album {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// The sentinel catch-all album. Its identifier is always 0.
    pub fn default_album(created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            name: DEFAULT_ALBUM_NAME.to_string(),
            description: DEFAULT_ALBUM_DESCRIPTION.to_string(),
            tags: Vec::new(),
            created_at: Some(created_at),
        }
    }

    /// Both name and description must match; a user album that merely
    /// happens to be called "Default" is an ordinary album.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ALBUM_NAME && self.description == DEFAULT_ALBUM_DESCRIPTION
    }

    /// Check user-supplied album fields before they reach the store.
    pub fn validate(&self) -> Result<(), AlbumValidationError> {
        if self.name.trim().is_empty() {
            return Err(AlbumValidationError::EmptyName);
        }
        if self.name.chars().count() > MAX_NAME_CHARS {
            return Err(AlbumValidationError::NameTooLong {
                max: MAX_NAME_CHARS,
            });
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AlbumValidationError::DescriptionTooLong {
                max: MAX_DESCRIPTION_CHARS,
            });
        }
        if let Some(tag) = self
            .tags
            .iter()
            .find(|t| t.is_empty() || t.chars().any(char::is_whitespace))
        {
            return Err(AlbumValidationError::InvalidTag { tag: tag.clone() });
        }
        Ok(())
    }
}
