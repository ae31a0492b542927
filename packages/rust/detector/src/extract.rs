//! Field extraction: one normalized text block → one [`AnnouncementRecord`].
//!
//! Each field is derived independently. A missing match never fails the
//! record; the field falls back to its sentinel.

use alphawatch_shared::{AnnouncementRecord, DetectorConfig, SENTINEL, Status, UNKNOWN_PROJECT};

use crate::normalize::{collapse_whitespace, truncate_chars};
use crate::patterns::{HIGH_TIER, LOW_TIER, Patterns};

/// Derive a record from a text block.
pub fn extract_record(
    block: &str,
    patterns: &Patterns,
    config: &DetectorConfig,
) -> AnnouncementRecord {
    let text = collapse_whitespace(block);

    let project = project_label(&text, patterns, config.project_max_chars);
    let required_points = required_points(&text, patterns);
    let reward = reward(&text, patterns);

    let urgent = patterns.urgent.is_match(&text);
    let point_tier_15 =
        patterns.low_tier.is_match(&text) || required_points == LOW_TIER.to_string();
    let point_tier_190 =
        patterns.high_tier.is_match(&text) || required_points == HIGH_TIER.to_string();

    let status = if patterns.finished.is_match(&text) {
        Status::Completed
    } else {
        Status::Active
    };

    let identifier = identifier(
        &project,
        &required_points,
        &reward,
        config.identifier_max_chars,
    );

    AnnouncementRecord {
        identifier,
        project,
        required_points,
        reward,
        urgent,
        point_tier_15,
        point_tier_190,
        status,
        excerpt: truncate_chars(&text, config.excerpt_chars).to_string(),
    }
}

/// Text before the first field marker, minus urgency and status phrases.
fn project_label(text: &str, patterns: &Patterns, max_chars: usize) -> String {
    let head = match patterns.field_marker.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };

    let head = patterns.label_noise.replace_all(head, " ");
    let label = collapse_whitespace(&head);
    let label = truncate_chars(&label, max_chars).trim_end();

    if label.is_empty() {
        UNKNOWN_PROJECT.to_string()
    } else {
        label.to_string()
    }
}

fn required_points(text: &str, patterns: &Patterns) -> String {
    patterns
        .required_points
        .captures(text)
        .or_else(|| patterns.bare_points.captures(text))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| SENTINEL.to_string())
}

fn reward(text: &str, patterns: &Patterns) -> String {
    patterns
        .reward
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// `project_points_reward` with whitespace turned into underscores, capped.
pub fn identifier(project: &str, required_points: &str, reward: &str, max_chars: usize) -> String {
    let raw: String = format!("{project}_{required_points}_{reward}")
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    truncate_chars(&raw, max_chars).to_string()
}
