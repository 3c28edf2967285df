//! Two-tier catalog persistence.
//!
//! One logical append-only log, materialized as two projections: a
//! lightweight index (`catlist.json`, one row per produced image) and
//! month-partitioned detail shards (`cats/YYYY-MM.json`) holding the richer
//! narrative fields. Both are rewritten wholesale inside a single publish,
//! never patched, so numbering can never be torn between the two tiers.

use crate::character::Season;
use crate::publish::{publish_with_retry, PublishError, Remote};
use crate::select::SelectedCharacter;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Timestamp format used in catalog entries and commit messages.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Outcome status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
}

/// One row of the lightweight index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIndexEntry {
    /// 1-based, strictly monotonic, gapless, failures included.
    pub number: u64,
    pub timestamp: String,
    pub url: Option<String>,
    pub model: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_seasonal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
}

impl CatalogIndexEntry {
    /// Entry timestamp parsed back to a UTC instant, if well-formed.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Narrative detail for one entry, stored in the period shard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDetailEntry {
    pub number: u64,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub idea: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_inspiration: Option<String>,
    #[serde(default)]
    pub avoid_list: Vec<String>,
}

/// Narrative fields of a new entry, before numbering.
#[derive(Debug, Clone, Default)]
pub struct DetailFields {
    pub prompt: String,
    pub story: String,
    pub idea: String,
    pub news_inspiration: Option<String>,
    pub avoid_list: Vec<String>,
}

impl DetailFields {
    /// A detail entry is stored only when some narrative field is non-empty.
    pub fn has_content(&self) -> bool {
        !self.prompt.is_empty()
            || !self.story.is_empty()
            || !self.idea.is_empty()
            || self.news_inspiration.as_deref().is_some_and(|n| !n.is_empty())
            || !self.avoid_list.is_empty()
    }
}

/// A new catalog item before a sequence number is assigned.
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub timestamp: String,
    pub url: Option<String>,
    pub model: String,
    pub status: EntryStatus,
    pub error: Option<String>,
    pub title: Option<String>,
    pub character: Option<String>,
    pub character_name: Option<String>,
    pub is_seasonal: bool,
    pub season: Option<Season>,
    pub detail: Option<DetailFields>,
}

impl NewCatalogEntry {
    /// A successful generation.
    pub fn success(timestamp: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            url: None,
            model: model.into(),
            status: EntryStatus::Success,
            error: None,
            title: None,
            character: None,
            character_name: None,
            is_seasonal: false,
            season: None,
            detail: None,
        }
    }

    /// A failed generation; appended anyway to preserve sequence continuity.
    pub fn failed(timestamp: impl Into<String>, model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            url: None,
            model: model.into(),
            status: EntryStatus::Failed,
            error: Some(error.into()),
            title: None,
            character: None,
            character_name: None,
            is_seasonal: false,
            season: None,
            detail: None,
        }
    }

    /// Public URL of the generated artifact.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attribute the entry to the selected character.
    pub fn with_character(mut self, selected: &SelectedCharacter) -> Self {
        self.character = Some(selected.profile.id.clone());
        self.character_name = Some(selected.profile.name.zh.clone());
        self.is_seasonal = selected.is_seasonal();
        self.season = selected.season;
        self
    }

    pub fn with_detail(mut self, detail: DetailFields) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Period key (`YYYY-MM`) of the shard this entry's detail belongs to.
    fn period(&self) -> String {
        self.timestamp.chars().take(7).collect()
    }
}

/// The persisted catalog rooted at a data directory.
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("catlist.json")
    }

    pub fn shard_path(&self, period: &str) -> PathBuf {
        self.root.join("cats").join(format!("{period}.json"))
    }

    /// Load the index; a missing file is an empty catalog.
    pub async fn load_index(&self) -> Result<Vec<CatalogIndexEntry>, CatalogError> {
        load_entries(&self.index_path()).await
    }

    /// Load the detail shard for a period; missing file is an empty shard.
    pub async fn load_shard(&self, period: &str) -> Result<Vec<CatalogDetailEntry>, CatalogError> {
        load_entries(&self.shard_path(period)).await
    }

    /// Most recent successful use per character id, for cooldown filtering.
    pub fn last_used_by_character(index: &[CatalogIndexEntry]) -> HashMap<String, DateTime<Utc>> {
        let mut last_used = HashMap::new();
        for entry in index.iter().filter(|e| e.status == EntryStatus::Success) {
            let (Some(id), Some(ts)) = (&entry.character, entry.parsed_timestamp()) else {
                continue;
            };
            last_used
                .entry(id.clone())
                .and_modify(|existing: &mut DateTime<Utc>| {
                    if ts > *existing {
                        *existing = ts;
                    }
                })
                .or_insert(ts);
        }
        last_used
    }

    /// Append one entry to both tiers and publish the change.
    ///
    /// Reads the current index, assigns `number = len + 1`, rewrites the
    /// index wholesale, appends the detail (when present and non-empty) to
    /// its period shard, then publishes through the remote. Returns the
    /// assigned number.
    pub async fn append_and_publish<R: Remote>(
        &self,
        entry: NewCatalogEntry,
        remote: &mut R,
    ) -> Result<u64, CatalogError> {
        let mut index = self.load_index().await?;
        let number = index.len() as u64 + 1;
        let period = entry.period();

        index.push(CatalogIndexEntry {
            number,
            timestamp: entry.timestamp.clone(),
            url: entry.url.clone(),
            model: entry.model.clone(),
            status: entry.status,
            error: entry.error.clone(),
            title: entry.title.clone(),
            character: entry.character.clone(),
            character_name: entry.character_name.clone(),
            is_seasonal: entry.is_seasonal,
            season: entry.season,
        });
        write_entries(&self.index_path(), &index).await?;
        let mut touched = vec![self.index_path()];

        if let Some(detail) = entry.detail.as_ref().filter(|d| d.has_content()) {
            let mut shard = self.load_shard(&period).await?;
            shard.push(CatalogDetailEntry {
                number,
                prompt: detail.prompt.clone(),
                story: detail.story.clone(),
                idea: detail.idea.clone(),
                news_inspiration: detail.news_inspiration.clone(),
                avoid_list: detail.avoid_list.clone(),
            });
            write_entries(&self.shard_path(&period), &shard).await?;
            touched.push(self.shard_path(&period));
        }

        let message = match entry.status {
            EntryStatus::Success => format!("Add cat #{number} - {}", entry.timestamp),
            EntryStatus::Failed => format!("Failed cat #{number} - {}", entry.timestamp),
        };
        publish_with_retry(remote, &touched, &message)?;

        info!(number, status = ?entry.status, "catalog entry published");
        Ok(number)
    }
}

async fn load_entries<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CatalogError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Whole-document rewrite: pretty JSON, trailing newline, UTF-8 verbatim.
async fn write_entries<T: Serialize>(path: &Path, entries: &[T]) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut content = serde_json::to_string_pretty(entries)?;
    content.push('\n');
    tokio::fs::write(path, content).await?;
    Ok(())
}
