//! Weighted character selection.
//!
//! One roll decides the branch: original (no character), recurring, or
//! seasonal. Branch thresholds are cumulative, so a probability table that
//! does not sum to 1 leaves the remainder to the seasonal branch. The
//! random source is injected so tests can fix every outcome.

use crate::character::{CharacterProfile, CharacterRegistry, Season};
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

/// A selection outcome: the chosen profile plus its seasonal annotation.
#[derive(Debug, Clone)]
pub struct SelectedCharacter {
    pub profile: CharacterProfile,
    /// `Some` when the pick came from the seasonal branch.
    pub season: Option<Season>,
}

impl SelectedCharacter {
    pub fn is_seasonal(&self) -> bool {
        self.season.is_some()
    }

    /// The seasonal variant fragment for the selected season, if declared.
    pub fn seasonal_variant(&self) -> Option<&str> {
        self.season
            .and_then(|s| self.profile.seasonal_variants.get(&s))
            .map(String::as_str)
    }
}

/// Chooses a character (or none) for a given timestamp.
pub struct Selector {
    registry: CharacterRegistry,
    last_used: HashMap<String, DateTime<Utc>>,
}

impl Selector {
    pub fn new(registry: CharacterRegistry) -> Self {
        Self {
            registry,
            last_used: HashMap::new(),
        }
    }

    /// Supply last-use timestamps (character id → most recent use) for
    /// cooldown filtering, typically derived from the catalog index.
    pub fn with_last_used(mut self, last_used: HashMap<String, DateTime<Utc>>) -> Self {
        self.last_used = last_used;
        self
    }

    /// Season for the current month per the registry's month map.
    pub fn current_season(&self, month: u32) -> Option<Season> {
        self.registry.index().season_for_month(month)
    }

    /// Pick a character for `now`, or `None` for an original (unthemed)
    /// subject.
    ///
    /// Never fails: an empty registry, an exhausted candidate pool, or a
    /// month with no season all fall back to `None`.
    pub fn select_character<R: Rng>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<SelectedCharacter> {
        if self.registry.is_empty() {
            return None;
        }

        let probability = self.registry.index().probability;
        let roll: f64 = rng.gen();

        if roll < probability.original {
            debug!(roll, "selection: original subject");
            return None;
        }

        if roll < probability.original + probability.recurring {
            let pool: Vec<&CharacterProfile> = self
                .registry
                .profiles()
                .iter()
                .filter(|c| !c.is_seasonal() && !self.in_cooldown(&c.id, now))
                .collect();
            let profile = Self::pick(&pool, rng)?;
            debug!(roll, id = %profile.id, "selection: recurring character");
            return Some(SelectedCharacter {
                profile: profile.clone(),
                season: None,
            });
        }

        let season = self.current_season(now.month())?;
        let pool: Vec<&CharacterProfile> = self
            .registry
            .profiles()
            .iter()
            .filter(|c| c.has_season(season) && !self.in_cooldown(&c.id, now))
            .collect();
        let profile = Self::pick(&pool, rng)?;
        debug!(roll, id = %profile.id, %season, "selection: seasonal character");
        Some(SelectedCharacter {
            profile: profile.clone(),
            season: Some(season),
        })
    }

    fn pick<'a, R: Rng>(pool: &[&'a CharacterProfile], rng: &mut R) -> Option<&'a CharacterProfile> {
        if pool.is_empty() {
            return None;
        }
        Some(pool[rng.gen_range(0..pool.len())])
    }

    fn in_cooldown(&self, id: &str, now: DateTime<Utc>) -> bool {
        let cooldown = Duration::hours(self.registry.index().cooldown_hours);
        self.last_used
            .get(id)
            .map(|last| now.signed_duration_since(*last) < cooldown)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CharacterIndex, CharacterProfile};
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;

    // StepRng yields its initial value first; `f64` draws use the top 53
    // bits, so HALF maps to a roll of exactly 0.5 and 0 to a roll of 0.0.
    const HALF: u64 = 1 << 63;

    fn profile(id: &str, seasonal: Option<Season>) -> CharacterProfile {
        let mut profile = crate::character::tests::sample_profile(id);
        if let Some(season) = seasonal {
            profile
                .seasonal_variants
                .insert(season, "seasonal outfit".to_string());
        }
        profile
    }

    fn index_json(json: &str) -> CharacterIndex {
        serde_json::from_str(json).unwrap()
    }

    fn noon_july() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_roll_below_original_yields_none() {
        let index = index_json(
            r#"{"characters": [{"id": "mochi", "file": "mochi.json", "enabled": true}],
                "probability": {"original": 0.5, "recurring": 0.35, "seasonal": 0.15}}"#,
        );
        let registry = CharacterRegistry::new(index, vec![profile("mochi", None)]);
        let selector = Selector::new(registry);

        // Roll 0.0 < 0.5.
        let mut rng = StepRng::new(0, 0);
        assert!(selector.select_character(noon_july(), &mut rng).is_none());
    }

    #[test]
    fn test_recurring_roll_picks_character() {
        let index = index_json(
            r#"{"characters": [{"id": "mochi", "file": "mochi.json", "enabled": true}],
                "probability": {"original": 0.25, "recurring": 0.5, "seasonal": 0.25}}"#,
        );
        let registry = CharacterRegistry::new(index, vec![profile("mochi", None)]);
        let selector = Selector::new(registry);

        // Roll 0.5 lands in the recurring range (0.25..0.75).
        let mut rng = StepRng::new(HALF, 0);
        let selected = selector.select_character(noon_july(), &mut rng).unwrap();
        assert_eq!(selected.profile.id, "mochi");
        assert!(!selected.is_seasonal());
    }

    #[test]
    fn test_empty_character_list_yields_none() {
        // Scenario: probability forces the recurring branch, but there is
        // nothing to pick from.
        let index = index_json(r#"{"characters": [], "probability": {"original": 0.0, "recurring": 1.0}}"#);
        let registry = CharacterRegistry::new(index, vec![]);
        let selector = Selector::new(registry);

        let mut rng = StepRng::new(HALF, 0);
        assert!(selector.select_character(noon_july(), &mut rng).is_none());
    }

    #[test]
    fn test_all_disabled_yields_none_for_any_roll() {
        let index = index_json(
            r#"{"characters": [{"id": "mochi", "file": "mochi.json", "enabled": false}],
                "probability": {"original": 0.0, "recurring": 0.5, "seasonal": 0.5}}"#,
        );
        let registry = CharacterRegistry::new(index, vec![profile("mochi", None)]);
        let selector = Selector::new(registry);

        for seed in [0, HALF / 2, HALF, HALF + HALF / 2] {
            let mut rng = StepRng::new(seed, 0);
            assert!(selector.select_character(noon_july(), &mut rng).is_none());
        }
    }

    #[test]
    fn test_unmapped_month_yields_none_in_seasonal_branch() {
        let index = index_json(
            r#"{"characters": [{"id": "yuki", "file": "yuki.json", "enabled": true}],
                "probability": {"original": 0.0, "recurring": 0.0, "seasonal": 1.0},
                "seasonal_months": {"winter": [12, 1, 2]}}"#,
        );
        let registry = CharacterRegistry::new(index, vec![profile("yuki", Some(Season::Winter))]);
        let selector = Selector::new(registry);

        // July maps to no season.
        let mut rng = StepRng::new(HALF, 0);
        assert!(selector.select_character(noon_july(), &mut rng).is_none());
    }

    #[test]
    fn test_seasonal_branch_picks_matching_character() {
        let index = index_json(
            r#"{"characters": [
                    {"id": "yuki", "file": "yuki.json", "enabled": true},
                    {"id": "mochi", "file": "mochi.json", "enabled": true}
                ],
                "probability": {"original": 0.0, "recurring": 0.0, "seasonal": 1.0},
                "seasonal_months": {"summer": [6, 7, 8]}}"#,
        );
        let registry = CharacterRegistry::new(
            index,
            vec![profile("yuki", Some(Season::Summer)), profile("mochi", None)],
        );
        let selector = Selector::new(registry);

        let mut rng = StepRng::new(HALF, 0);
        let selected = selector.select_character(noon_july(), &mut rng).unwrap();
        assert_eq!(selected.profile.id, "yuki");
        assert_eq!(selected.season, Some(Season::Summer));
        assert_eq!(selected.seasonal_variant(), Some("seasonal outfit"));
    }

    #[test]
    fn test_remainder_falls_to_seasonal_branch() {
        // original + recurring = 0.4; a 0.5 roll must reach the seasonal
        // branch even though the table sums to less than 1.
        let index = index_json(
            r#"{"characters": [{"id": "yuki", "file": "yuki.json", "enabled": true}],
                "probability": {"original": 0.2, "recurring": 0.2, "seasonal": 0.0},
                "seasonal_months": {"summer": [7]}}"#,
        );
        let registry = CharacterRegistry::new(index, vec![profile("yuki", Some(Season::Summer))]);
        let selector = Selector::new(registry);

        let mut rng = StepRng::new(HALF, 0);
        let selected = selector.select_character(noon_july(), &mut rng).unwrap();
        assert!(selected.is_seasonal());
    }

    #[test]
    fn test_cooldown_excludes_recent_character() {
        let index = index_json(
            r#"{"characters": [{"id": "mochi", "file": "mochi.json", "enabled": true}],
                "probability": {"original": 0.0, "recurring": 1.0},
                "cooldown_hours": 24}"#,
        );
        let registry = CharacterRegistry::new(index, vec![profile("mochi", None)]);
        let now = noon_july();

        let mut last_used = HashMap::new();
        last_used.insert("mochi".to_string(), now - Duration::hours(2));
        let selector = Selector::new(registry.clone()).with_last_used(last_used);

        let mut rng = StepRng::new(HALF, 0);
        assert!(selector.select_character(now, &mut rng).is_none());

        // Outside the cooldown window the character is eligible again.
        let mut stale = HashMap::new();
        stale.insert("mochi".to_string(), now - Duration::hours(25));
        let selector = Selector::new(registry).with_last_used(stale);

        let mut rng = StepRng::new(HALF, 0);
        assert!(selector.select_character(now, &mut rng).is_some());
    }
}
