use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Csv,
    Pdf,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Csv => "csv",
            FileType::Pdf => "pdf",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(FileType::Image),
            "csv" => Ok(FileType::Csv),
            "pdf" => Ok(FileType::Pdf),
            other => Err(format!("unknown file type '{}'", other)),
        }
    }
}

/// Opaque reference to a blob held by the blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn generate() -> Self {
        BlobRef(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blob refs end up in URLs and file paths.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 128
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlobRef {
    fn from(s: &str) -> Self {
        BlobRef(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub org_id: String,
    /// Uploader
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub blob_ref: BlobRef,
    pub marked_for_deletion: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for a new file record; the uploader comes from the resolved caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub name: String,
    pub blob_ref: BlobRef,
    #[serde(rename = "type")]
    pub file_type: FileType,
}

impl FileRecord {
    pub fn new(new_file: NewFile, org_id: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new_file.name,
            org_id: org_id.into(),
            user_id,
            file_type: new_file.file_type,
            blob_ref: new_file.blob_ref,
            marked_for_deletion: false,
            created_at: Utc::now(),
        }
    }
}
