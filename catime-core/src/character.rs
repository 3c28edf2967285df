//! Recurring character registry.
//!
//! Characters live under a `characters/` directory: an `index.json`
//! controlling enablement and selection policy, plus one profile document
//! per character. The registry is read-only; a missing or malformed
//! registry degrades to "no characters" rather than failing the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Calendar season used to gate seasonal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Bilingual display name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterName {
    #[serde(default)]
    pub zh: String,
    #[serde(default)]
    pub en: String,
}

/// Physical description fields rendered into idea prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Appearance {
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub face: String,
    #[serde(default)]
    pub distinctive_features: Vec<String>,
}

/// Personality traits and quirks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Personality {
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub quirks: Vec<String>,
}

/// A recurring character profile.
///
/// Immutable per load; selection-time annotations (whether the pick came
/// from the seasonal branch, and for which season) are carried by
/// [`crate::select::SelectedCharacter`], not by mutating the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub id: String,
    pub name: CharacterName,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub story_context: String,
    #[serde(default)]
    pub preferred_settings: Vec<String>,
    #[serde(default)]
    pub visual_prompt_snippet: String,
    #[serde(default)]
    pub seasonal_variants: HashMap<Season, String>,
}

impl CharacterProfile {
    /// A character is seasonal when it declares at least one seasonal variant.
    pub fn is_seasonal(&self) -> bool {
        !self.seasonal_variants.is_empty()
    }

    /// Whether this character belongs to the given season.
    pub fn has_season(&self, season: Season) -> bool {
        self.seasonal_variants.contains_key(&season)
    }
}

/// One row of the registry index, governing selectability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterIndexEntry {
    pub id: String,
    pub file: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Cumulative probability table for the three selection branches.
///
/// Thresholds are cumulative in order original → recurring; any remainder
/// falls into the seasonal branch, so the values need not sum to exactly 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbabilityTable {
    #[serde(default = "default_p_original")]
    pub original: f64,
    #[serde(default = "default_p_recurring")]
    pub recurring: f64,
    #[serde(default = "default_p_seasonal")]
    pub seasonal: f64,
}

impl Default for ProbabilityTable {
    fn default() -> Self {
        Self {
            original: default_p_original(),
            recurring: default_p_recurring(),
            seasonal: default_p_seasonal(),
        }
    }
}

fn default_p_original() -> f64 {
    0.50
}

fn default_p_recurring() -> f64 {
    0.35
}

fn default_p_seasonal() -> f64 {
    0.15
}

fn default_cooldown_hours() -> i64 {
    24
}

/// The registry index document: character roster plus selection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterIndex {
    #[serde(default)]
    pub characters: Vec<CharacterIndexEntry>,
    #[serde(default)]
    pub probability: ProbabilityTable,
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,
    #[serde(default)]
    pub seasonal_months: HashMap<Season, Vec<u32>>,
}

impl Default for CharacterIndex {
    fn default() -> Self {
        Self {
            characters: Vec::new(),
            probability: ProbabilityTable::default(),
            cooldown_hours: default_cooldown_hours(),
            seasonal_months: HashMap::new(),
        }
    }
}

impl CharacterIndex {
    /// Season for a calendar month (1-12), if any is mapped.
    pub fn season_for_month(&self, month: u32) -> Option<Season> {
        self.seasonal_months
            .iter()
            .find(|(_, months)| months.contains(&month))
            .map(|(season, _)| *season)
    }
}

/// Loaded registry: index plus the enabled profiles it references.
#[derive(Debug, Clone, Default)]
pub struct CharacterRegistry {
    index: CharacterIndex,
    profiles: Vec<CharacterProfile>,
}

impl CharacterRegistry {
    /// Build a registry from an index and candidate profiles.
    ///
    /// Profiles not listed as enabled in the index are dropped here, so
    /// disabled characters can never reach the selection engine.
    pub fn new(index: CharacterIndex, profiles: Vec<CharacterProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .filter(|p| {
                index
                    .characters
                    .iter()
                    .any(|entry| entry.enabled && entry.id == p.id)
            })
            .collect();
        Self { index, profiles }
    }

    /// Load the registry from a `characters/` directory.
    ///
    /// A missing or malformed index yields an empty registry; individual
    /// unreadable profiles are skipped with a warning.
    pub async fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let index_path = dir.join("index.json");

        let index: CharacterIndex = match tokio::fs::read_to_string(&index_path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(index) => index,
                Err(e) => {
                    warn!(path = %index_path.display(), error = %e, "character index malformed");
                    return Self::default();
                }
            },
            Err(e) => {
                warn!(path = %index_path.display(), error = %e, "character index unavailable");
                return Self::default();
            }
        };

        let mut profiles = Vec::new();
        for entry in index.characters.iter().filter(|e| e.enabled) {
            let path = dir.join(&entry.file);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<CharacterProfile>(&content) {
                    Ok(profile) => profiles.push(profile),
                    Err(e) => {
                        warn!(id = %entry.id, path = %path.display(), error = %e, "character profile malformed, skipping");
                    }
                },
                Err(e) => {
                    warn!(id = %entry.id, path = %path.display(), error = %e, "character profile unreadable, skipping");
                }
            }
        }

        Self::new(index, profiles)
    }

    pub fn index(&self) -> &CharacterIndex {
        &self.index
    }

    /// Enabled, loaded profiles.
    pub fn profiles(&self) -> &[CharacterProfile] {
        &self.profiles
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
