//! Prompt assembly.
//!
//! Renders character and style selections into the text blocks fed to the
//! generation models: a rich profile block for ideation, and hard visual
//! constraints for rendering. All formatters return an empty string on
//! empty input so callers can simply concatenate.

use crate::select::SelectedCharacter;
use crate::style::StylePreset;
use std::collections::BTreeMap;

/// Render a character profile as an idea-generation instruction block.
///
/// Includes an explicit directive that the character must be the visual
/// focus, and a seasonal-theme clause when the pick came from the seasonal
/// branch (silently skipped if the profile has no variant for that season).
pub fn format_character_for_idea(selected: &SelectedCharacter) -> String {
    let c = &selected.profile;
    let mut out = String::from("## 今日主角\n");
    out.push_str(&format!("名字：{}（{}）\n", c.name.zh, c.name.en));

    if !c.appearance.breed.is_empty() {
        out.push_str(&format!("品種：{}\n", c.appearance.breed));
    }
    if !c.appearance.body.is_empty() {
        out.push_str(&format!("體型：{}\n", c.appearance.body));
    }
    if !c.appearance.face.is_empty() {
        out.push_str(&format!("臉部：{}\n", c.appearance.face));
    }
    if !c.appearance.distinctive_features.is_empty() {
        out.push_str(&format!(
            "特徵：{}\n",
            c.appearance.distinctive_features.join("、")
        ));
    }
    if !c.personality.traits.is_empty() {
        out.push_str(&format!("個性：{}\n", c.personality.traits.join("、")));
    }
    if !c.personality.quirks.is_empty() {
        out.push_str(&format!("小習慣：{}\n", c.personality.quirks.join("、")));
    }
    if !c.story_context.is_empty() {
        out.push_str(&format!("背景：{}\n", c.story_context));
    }
    if !c.preferred_settings.is_empty() {
        out.push_str(&format!(
            "常出沒場景：{}\n",
            c.preferred_settings.join("、")
        ));
    }

    out.push_str("\n必須讓這個角色成為畫面的主角。\n");

    if let (Some(season), Some(variant)) = (selected.season, selected.seasonal_variant()) {
        out.push_str(&format!("季節主題（{season}）：{variant}\n"));
    }

    out
}

/// Render the visual-prompt fragment as a mandatory render constraint.
///
/// Empty fragment ⇒ empty string; callers must treat that as "omit".
pub fn format_character_for_render(selected: &SelectedCharacter) -> String {
    let snippet = selected.profile.visual_prompt_snippet.trim();
    if snippet.is_empty() {
        return String::new();
    }
    format!("CHARACTER (NON-NEGOTIABLE): the cat in this image must match: {snippet}.")
}

/// Render the style picks as a human-readable palette suggestion.
pub fn format_style_suggestion(picks: &BTreeMap<String, StylePreset>) -> String {
    if picks.is_empty() {
        return String::new();
    }

    let mut out = String::from("## TODAY'S STYLE PALETTE\n");
    for (category, preset) in picks {
        out.push_str(&format!("- {category}: {} / {}\n", preset.en, preset.zh));
    }
    out.push_str("\nYou MUST use the art_style pick; the other categories are suggestions to blend in where they fit.\n");
    out
}

/// Concatenate every category's prompt fragment for inline inclusion.
pub fn format_style_prompt_snippet(picks: &BTreeMap<String, StylePreset>) -> String {
    picks
        .values()
        .map(|p| p.prompt.as_str())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Assemble the complete ideation instruction.
///
/// The reply contract mirrors what the response parser expects: a single
/// JSON object with a mandatory `prompt` key and optional narrative keys.
pub fn build_idea_prompt(
    timestamp: &str,
    character_block: &str,
    style_suggestion: &str,
    avoid: &[String],
) -> String {
    let mut out = String::from(
        "You are the creative director of a long-running series of cat illustrations.\n",
    );
    out.push_str(&format!("現在時間：{timestamp}\n"));
    out.push_str("請構思今天這一張貓咪圖的點子。\n");

    if !character_block.is_empty() {
        out.push('\n');
        out.push_str(character_block);
    }
    if !style_suggestion.is_empty() {
        out.push('\n');
        out.push_str(style_suggestion);
    }
    if !avoid.is_empty() {
        out.push_str("\n避免重複最近出現過的主題：\n");
        for theme in avoid {
            out.push_str(&format!("- {theme}\n"));
        }
    }

    out.push_str(
        r#"
Respond with ONLY a JSON object (no markdown, no text outside the JSON):
{
  "idea": "one-sentence summary of today's concept",
  "title": "short title for the image",
  "prompt": "full English image prompt describing the scene",
  "story": "一段繁體中文小故事，描述這個瞬間",
  "news_inspiration": "optional seasonal or daily-life inspiration, else empty",
  "avoid_list": ["themes future runs should not repeat"]
}
"#,
    );
    out
}

/// Assemble the final render prompt from the ideated scene and constraints.
pub fn build_render_prompt(
    scene_prompt: &str,
    style_snippet: &str,
    character_block: &str,
    timestamp: &str,
) -> String {
    let mut out = String::from(scene_prompt);
    if !style_snippet.is_empty() {
        out.push_str(&format!("\n\nArt direction: {style_snippet}."));
    }
    if !character_block.is_empty() {
        out.push_str("\n\n");
        out.push_str(character_block);
    }
    out.push_str(&format!(
        "\n\n並在圖片中顯示現在的日期與時間: {timestamp}"
    ));
    out
}
