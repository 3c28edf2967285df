//! Integration tests for the full generation cycle.
//!
//! The generation capability and publish transport are scripted; the data
//! directory is a tempdir seeded with registry and style documents, so the
//! cycle runs exactly as in production minus the network and git.

use catime_core::catalog::{Catalog, EntryStatus};
use catime_core::run::{run_once, RunConfig};
use catime_core::testing::{ScriptedGenerator, ScriptedRemote};
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::mock::StepRng;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// StepRng seed mapping to a 0.5 roll for `f64` draws.
const HALF: u64 = 1 << 63;

fn noon_july() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
}

/// Seed a data dir with one enabled character and one style category,
/// with probabilities forcing the recurring branch.
fn seed_data_dir(dir: &Path) {
    fs::create_dir_all(dir.join("characters")).expect("Failed to create characters dir");
    fs::write(
        dir.join("characters/index.json"),
        r#"{
            "characters": [{"id": "mochi", "file": "mochi.json", "enabled": true}],
            "probability": {"original": 0.0, "recurring": 1.0, "seasonal": 0.0},
            "cooldown_hours": 24,
            "seasonal_months": {}
        }"#,
    )
    .expect("Failed to write index");
    fs::write(
        dir.join("characters/mochi.json"),
        r#"{
            "id": "mochi",
            "name": {"zh": "麻糬", "en": "Mochi"},
            "appearance": {"breed": "白色英國短毛貓", "body": "圓潤短胖", "face": "大圓眼"},
            "personality": {"traits": ["好奇", "貪吃"], "quirks": ["打呼嚕"]},
            "story_context": "住在甜點店的貓",
            "preferred_settings": ["甜點店", "廚房"],
            "visual_prompt_snippet": "white British Shorthair, round body"
        }"#,
    )
    .expect("Failed to write profile");
    fs::write(
        dir.join("styles.json"),
        r#"{
            "art_style": [{"zh": "水彩畫", "en": "Watercolor", "prompt": "watercolor painting, soft edges"}]
        }"#,
    )
    .expect("Failed to write styles");
}

const IDEA_REPLY: &str = r#"```json
{
  "idea": "a cat baking bread",
  "title": "烘焙時光",
  "prompt": "a round white cat kneading dough in a warm bakery",
  "story": "麻糬今天學做麵包。",
  "news_inspiration": "",
  "avoid_list": ["rainy rooftop"]
}
```"#;

// =============================================================================
// Success path
// =============================================================================

#[tokio::test]
async fn test_success_cycle_appends_and_publishes() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());

    let config = RunConfig::new(temp_dir.path())
        .with_output_dir(temp_dir.path().join("out"))
        .with_release_base_url("https://example.test/releases/cats/");
    let generator = ScriptedGenerator::succeeding(IDEA_REPLY);
    let mut remote = ScriptedRemote::accepting();

    let report = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("cycle should succeed");

    assert!(report.succeeded());
    assert_eq!(report.number, 1);
    assert_eq!(report.character.as_deref(), Some("mochi"));
    // URL composed from the release base and the rendered file name.
    assert_eq!(
        report.url.as_deref(),
        Some("https://example.test/releases/cats/cat_test.png")
    );

    let catalog = Catalog::new(temp_dir.path());
    let index = catalog.load_index().await.expect("index should load");
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].status, EntryStatus::Success);
    assert_eq!(index[0].model, "scripted-model");
    assert_eq!(index[0].title.as_deref(), Some("烘焙時光"));
    assert_eq!(index[0].character.as_deref(), Some("mochi"));
    assert_eq!(index[0].character_name.as_deref(), Some("麻糬"));
    assert_eq!(index[0].timestamp, "2025-07-01 12:00 UTC");

    let shard = catalog.load_shard("2025-07").await.expect("shard should load");
    assert_eq!(shard.len(), 1);
    assert_eq!(shard[0].number, 1);
    assert_eq!(shard[0].prompt, "a round white cat kneading dough in a warm bakery");
    assert_eq!(shard[0].story, "麻糬今天學做麵包。");
    assert_eq!(shard[0].idea, "a cat baking bread");
    assert_eq!(shard[0].avoid_list, vec!["rainy rooftop".to_string()]);
    // Empty news inspiration is dropped, not stored as "".
    assert!(shard[0].news_inspiration.is_none());

    assert_eq!(remote.commits, vec!["Add cat #1 - 2025-07-01 12:00 UTC".to_string()]);
}

#[tokio::test]
async fn test_prompts_carry_character_and_style_blocks() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());

    let config = RunConfig::new(temp_dir.path());
    let generator = ScriptedGenerator::succeeding(IDEA_REPLY);
    let mut remote = ScriptedRemote::accepting();

    run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("cycle should succeed");

    let prompts = generator.seen_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);

    // Ideation prompt: profile block, focus directive, style palette.
    assert!(prompts[0].contains("麻糬"));
    assert!(prompts[0].contains("必須讓這個角色成為畫面的主角"));
    assert!(prompts[0].contains("TODAY'S STYLE PALETTE"));
    assert!(prompts[0].contains("Watercolor"));

    // Render prompt: ideated scene, style fragment, hard constraint, clock.
    assert!(prompts[1].starts_with("a round white cat kneading dough"));
    assert!(prompts[1].contains("watercolor painting, soft edges"));
    assert!(prompts[1].contains("NON-NEGOTIABLE"));
    assert!(prompts[1].contains("2025-07-01 12:00 UTC"));
}

#[tokio::test]
async fn test_numbering_continues_across_cycles() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());

    let config = RunConfig::new(temp_dir.path());
    let generator = ScriptedGenerator::succeeding(IDEA_REPLY);

    let mut remote = ScriptedRemote::accepting();
    let first = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("cycle should succeed");

    let later = Utc.with_ymd_and_hms(2025, 7, 3, 13, 0, 0).unwrap();
    let second = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        later,
    )
    .await
    .expect("cycle should succeed");

    assert_eq!(first.number, 1);
    assert_eq!(second.number, 2);
}

#[tokio::test]
async fn test_plain_text_reply_degrades_to_whole_prompt() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());

    let config = RunConfig::new(temp_dir.path());
    let generator = ScriptedGenerator::succeeding("just a prompt without json");
    let mut remote = ScriptedRemote::accepting();

    let report = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("cycle should succeed");

    assert!(report.succeeded());

    let catalog = Catalog::new(temp_dir.path());
    let shard = catalog.load_shard("2025-07").await.expect("shard should load");
    assert_eq!(shard[0].prompt, "just a prompt without json");
    assert_eq!(shard[0].story, "");
    assert!(shard[0].idea.is_empty());
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test]
async fn test_render_failure_records_failed_entry() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());

    let config = RunConfig::new(temp_dir.path());
    let generator = ScriptedGenerator::failing_render(IDEA_REPLY, "model quota exceeded");
    let mut remote = ScriptedRemote::accepting();

    let report = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("failure is recorded, not raised");

    assert!(!report.succeeded());
    assert_eq!(report.number, 1);
    assert_eq!(report.error.as_deref(), Some("model quota exceeded"));

    let catalog = Catalog::new(temp_dir.path());
    let index = catalog.load_index().await.expect("index should load");
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].status, EntryStatus::Failed);
    assert_eq!(index[0].model, "all failed");
    assert_eq!(index[0].url, None);

    // No narrative detail for a failed render.
    let shard = catalog.load_shard("2025-07").await.expect("shard should load");
    assert!(shard.is_empty());

    assert_eq!(remote.commits, vec!["Failed cat #1 - 2025-07-01 12:00 UTC".to_string()]);
}

#[tokio::test]
async fn test_ideation_failure_records_failed_entry() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());

    let config = RunConfig::new(temp_dir.path());
    let generator = ScriptedGenerator::failing_ideation("connection reset");
    let mut remote = ScriptedRemote::accepting();

    let report = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("failure is recorded, not raised");

    assert!(!report.succeeded());
    let index = Catalog::new(temp_dir.path())
        .load_index()
        .await
        .expect("index should load");
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].status, EntryStatus::Failed);
}

#[tokio::test]
async fn test_failed_entry_preserves_sequence_for_next_cycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_data_dir(temp_dir.path());
    let config = RunConfig::new(temp_dir.path());

    let failing = ScriptedGenerator::failing_render(IDEA_REPLY, "down");
    let mut remote = ScriptedRemote::accepting();
    let first = run_once(
        &config,
        &failing,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("failure is recorded, not raised");

    let succeeding = ScriptedGenerator::succeeding(IDEA_REPLY);
    let later = Utc.with_ymd_and_hms(2025, 7, 1, 13, 0, 0).unwrap();
    let second = run_once(
        &config,
        &succeeding,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        later,
    )
    .await
    .expect("cycle should succeed");

    assert_eq!(first.number, 1);
    assert_eq!(second.number, 2);
    assert!(second.succeeded());
}

#[tokio::test]
async fn test_missing_registry_and_styles_still_produce_an_image() {
    // Empty data dir: no characters, no styles. The cycle degrades to an
    // original unthemed subject instead of failing.
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let config = RunConfig::new(temp_dir.path());
    let generator = ScriptedGenerator::succeeding(IDEA_REPLY);
    let mut remote = ScriptedRemote::accepting();

    let report = run_once(
        &config,
        &generator,
        &mut remote,
        &mut StepRng::new(HALF, 0),
        noon_july(),
    )
    .await
    .expect("cycle should succeed");

    assert!(report.succeeded());
    assert!(report.character.is_none());

    let prompts = generator.seen_prompts.lock().unwrap();
    assert!(!prompts[0].contains("今日主角"));
    assert!(!prompts[0].contains("STYLE PALETTE"));
}
