//! Style reference catalog.
//!
//! A read-only document (`styles.json`) mapping category keys like
//! `art_style` or `lighting` to lists of alternative presets. One preset
//! per non-empty category is drawn uniformly for each generation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// One style preset within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    /// Native (Traditional Chinese) label.
    pub zh: String,
    /// English label.
    pub en: String,
    /// Prompt fragment inlined into the render prompt.
    pub prompt: String,
}

/// The full style catalog, keyed by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleReference {
    categories: BTreeMap<String, Vec<StylePreset>>,
}

impl StyleReference {
    /// Build a reference from in-memory categories.
    pub fn from_categories(categories: BTreeMap<String, Vec<StylePreset>>) -> Self {
        Self { categories }
    }

    /// Load the reference document, degrading to an empty catalog when the
    /// file is missing or malformed.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "style reference unavailable");
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "style reference malformed");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &BTreeMap<String, Vec<StylePreset>> {
        &self.categories
    }

    /// Draw one preset per category with at least one alternative.
    ///
    /// Categories with no presets are omitted; an empty reference yields an
    /// empty pick map.
    pub fn pick_styles<R: Rng>(&self, rng: &mut R) -> BTreeMap<String, StylePreset> {
        let mut picks = BTreeMap::new();
        for (category, presets) in &self.categories {
            if presets.is_empty() {
                continue;
            }
            let preset = presets[rng.gen_range(0..presets.len())].clone();
            picks.insert(category.clone(), preset);
        }
        picks
    }
}
