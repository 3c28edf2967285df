//! One full generation cycle.
//!
//! Loads durable state, selects a character and styles, ideates, renders,
//! and appends the outcome to the published catalog. Generation failures
//! still append a failed entry so sequence numbering never gaps; only
//! catalog/publish failures abort the cycle with an error.

use crate::catalog::{Catalog, CatalogError, DetailFields, EntryStatus, NewCatalogEntry, TIMESTAMP_FORMAT};
use crate::character::CharacterRegistry;
use crate::generate::Generator;
use crate::parse::{parse_ai_response, parse_ai_response_generic};
use crate::prompt::{
    build_idea_prompt, build_render_prompt, format_character_for_idea,
    format_character_for_render, format_style_prompt_snippet, format_style_suggestion,
};
use crate::publish::Remote;
use crate::select::{SelectedCharacter, Selector};
use crate::style::StyleReference;
use chrono::{DateTime, Utc};
use nanobanana::ImageRequest;
use rand::Rng;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// How many recent shard ideas feed the avoid-list.
const AVOID_LIST_RECENT: usize = 10;

/// Errors that abort a cycle.
///
/// Generation failures are not in here: they are recorded in the catalog
/// and reported through [`RunReport`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Configuration for one generation cycle.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding `catlist.json`, `cats/`, `characters/`, `styles.json`.
    pub data_dir: PathBuf,
    /// Where rendered images are written before upload.
    pub output_dir: PathBuf,
    /// Public URL base the artifact will be served from, if known.
    pub release_base_url: Option<String>,
    pub resolution: String,
    pub file_format: String,
}

impl RunConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: std::env::temp_dir(),
            release_base_url: None,
            resolution: "1K".to_string(),
            file_format: "png".to_string(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_release_base_url(mut self, base: impl Into<String>) -> Self {
        self.release_base_url = Some(base.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    pub fn with_file_format(mut self, format: impl Into<String>) -> Self {
        self.file_format = format.into();
        self
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub number: u64,
    pub status: EntryStatus,
    pub url: Option<String>,
    pub model: String,
    pub character: Option<String>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == EntryStatus::Success
    }
}

/// Execute one generation cycle.
pub async fn run_once<G: Generator, R: Remote>(
    config: &RunConfig,
    generator: &G,
    remote: &mut R,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    let catalog = Catalog::new(&config.data_dir);
    let index = catalog.load_index().await?;

    let registry = CharacterRegistry::load(config.data_dir.join("characters")).await;
    let styles = StyleReference::load(config.data_dir.join("styles.json")).await;

    let selector =
        Selector::new(registry).with_last_used(Catalog::last_used_by_character(&index));
    let selected = selector.select_character(now, rng);
    let picks = styles.pick_styles(rng);
    info!(
        character = selected.as_ref().map(|s| s.profile.id.as_str()),
        styles = picks.len(),
        "selection done"
    );

    let avoid = recent_themes(&catalog, &timestamp).await?;
    let character_idea_block = selected
        .as_ref()
        .map(format_character_for_idea)
        .unwrap_or_default();
    let idea_prompt = build_idea_prompt(
        &timestamp,
        &character_idea_block,
        &format_style_suggestion(&picks),
        &avoid,
    );

    let reply = match generator.ideate(&idea_prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            return record_failure(&catalog, remote, &timestamp, selected.as_ref(), e.to_string())
                .await;
        }
    };

    let parsed = parse_ai_response(&reply);
    let extras = parse_ai_response_generic(&reply, &["prompt"]);
    let extra_str = |key: &str| {
        extras
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let title = extra_str("title").filter(|t| !t.is_empty());
    let idea = extra_str("idea").unwrap_or_default();
    let news_inspiration = extra_str("news_inspiration").filter(|n| !n.is_empty());
    let avoid_list: Vec<String> = extras
        .as_ref()
        .and_then(|m| m.get("avoid_list"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let render_prompt = build_render_prompt(
        &parsed.prompt,
        &format_style_prompt_snippet(&picks),
        &selected
            .as_ref()
            .map(format_character_for_render)
            .unwrap_or_default(),
        &timestamp,
    );

    let filename = format!("cat_{}", timestamp.replace(' ', "_").replace(':', ""));
    let request = ImageRequest::new(render_prompt)
        .with_filename(filename.as_str())
        .with_resolution(config.resolution.as_str())
        .with_file_format(config.file_format.as_str())
        .with_output_dir(&config.output_dir);

    let response = generator.render(request).await;
    if !response.success {
        let error = response
            .error
            .unwrap_or_else(|| "generation failed".to_string());
        return record_failure(&catalog, remote, &timestamp, selected.as_ref(), error).await;
    }

    let model = response.model_descriptor();
    let artifact_name = response
        .generated_files
        .first()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{filename}.{}", config.file_format));
    let url = config
        .release_base_url
        .as_ref()
        .map(|base| format!("{}/{artifact_name}", base.trim_end_matches('/')));

    let mut entry =
        NewCatalogEntry::success(timestamp.as_str(), model.as_str()).with_detail(DetailFields {
            prompt: parsed.prompt,
            story: parsed.story,
            idea,
            news_inspiration,
            avoid_list,
        });
    if let Some(url) = &url {
        entry = entry.with_url(url.clone());
    }
    if let Some(title) = title {
        entry = entry.with_title(title);
    }
    if let Some(selected) = &selected {
        entry = entry.with_character(selected);
    }

    let number = catalog.append_and_publish(entry, remote).await?;
    info!(number, model = %model, "cycle complete");

    Ok(RunReport {
        number,
        status: EntryStatus::Success,
        url,
        model,
        character: selected.map(|s| s.profile.id),
        error: None,
    })
}

/// Ideas already used this month, plus the latest avoid-list, so the
/// ideation prompt steers away from repeats.
async fn recent_themes(catalog: &Catalog, timestamp: &str) -> Result<Vec<String>, CatalogError> {
    let period: String = timestamp.chars().take(7).collect();
    let shard = catalog.load_shard(&period).await?;

    let mut themes: Vec<String> = shard
        .iter()
        .rev()
        .take(AVOID_LIST_RECENT)
        .filter(|d| !d.idea.is_empty())
        .map(|d| d.idea.clone())
        .collect();
    if let Some(last) = shard.last() {
        for theme in &last.avoid_list {
            if !themes.contains(theme) {
                themes.push(theme.clone());
            }
        }
    }
    Ok(themes)
}

/// Append a failed entry (sequence continuity) and publish it.
async fn record_failure<R: Remote>(
    catalog: &Catalog,
    remote: &mut R,
    timestamp: &str,
    selected: Option<&SelectedCharacter>,
    error: String,
) -> Result<RunReport, RunError> {
    warn!(error = %error, "generation failed, recording failed entry");

    let mut entry = NewCatalogEntry::failed(timestamp, "all failed", error.clone());
    if let Some(selected) = selected {
        entry = entry.with_character(selected);
    }
    let number = catalog.append_and_publish(entry, remote).await?;

    Ok(RunReport {
        number,
        status: EntryStatus::Failed,
        url: None,
        model: "all failed".to_string(),
        character: selected.map(|s| s.profile.id.clone()),
        error: Some(error),
    })
}
