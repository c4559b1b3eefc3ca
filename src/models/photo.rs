use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the image bytes of a photo live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Local,
    Google,
    Dropbox,
}

/// Free-form key/value metadata attached to a photo (camera, location, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub name: String,
    /// Local path or remote URL of the image.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
    #[serde(default)]
    pub storage_type: StorageType,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        path: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path: path.into(),
            album_id: None,
            tags: Vec::new(),
            metadata: Vec::new(),
            storage_type: StorageType::Local,
            created_at,
        }
    }
}
