use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::database::models::{FileRecord, FileType};

/// Listing filters for the files of one organization.
///
/// Applied in a fixed order: name search, favorites, deletion state, type.
/// Organization scoping happens before, at the store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFilter {
    /// Case-insensitive substring of the file name; empty matches everything
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub favorites: bool,
    /// Selects pending-delete files instead of active ones
    #[serde(default)]
    pub deleted_only: bool,
    #[serde(default, rename = "type")]
    pub file_type: Option<FileType>,
}

impl FileFilter {
    pub fn needs_favorites(&self) -> bool {
        self.favorites
    }

    /// `favorite_ids` is only consulted when `favorites` is set.
    pub fn apply(&self, files: Vec<FileRecord>, favorite_ids: &HashSet<Uuid>) -> Vec<FileRecord> {
        let needle = self
            .query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        files
            .into_iter()
            .filter(|f| match &needle {
                Some(needle) => f.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .filter(|f| !self.favorites || favorite_ids.contains(&f.id))
            .filter(|f| f.marked_for_deletion == self.deleted_only)
            .filter(|f| self.file_type.map_or(true, |t| f.file_type == t))
            .collect()
    }
}
