//! Compiled, case-insensitive phrase patterns.
//!
//! Every pattern is built from [`DetectorConfig`] phrases, so the vocabulary
//! can change without touching the locator or the extractor.

use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};

use alphawatch_shared::{AlphaWatchError, DetectorConfig, Result};

/// Point thresholds that count as urgency signals.
pub(crate) const LOW_TIER: u32 = 15;
pub(crate) const HIGH_TIER: u32 = 190;

/// The full pattern vocabulary used by one [`Detector`](crate::Detector).
#[derive(Debug, Clone)]
pub struct Patterns {
    /// Any match makes a text node a candidate anchor.
    pub(crate) keywords: RegexSet,
    pub(crate) urgent: Regex,
    pub(crate) finished: Regex,
    /// First reward or points marker; the project label precedes it.
    pub(crate) field_marker: Regex,
    /// Urgency and status words stripped from the project label.
    pub(crate) label_noise: Regex,
    /// Points marker followed by a 1-5 digit value (group 1).
    pub(crate) required_points: Regex,
    /// A bare "<digits> points" anywhere (group 1).
    pub(crate) bare_points: Regex,
    /// Reward marker followed by the reward text (group 1).
    pub(crate) reward: Regex,
    pub(crate) low_tier: Regex,
    pub(crate) high_tier: Regex,
}

impl Patterns {
    /// Compile all patterns. Fails on the first invalid phrase.
    pub fn compile(config: &DetectorConfig) -> Result<Self> {
        let keywords = RegexSetBuilder::new(&config.keywords)
            .case_insensitive(true)
            .build()
            .map_err(|e| AlphaWatchError::config(format!("invalid detector keyword: {e}")))?;

        if config.keywords.is_empty() {
            tracing::warn!("detector keyword list is empty, no block will ever match");
        }

        let reward = &config.reward_marker;
        let points = &config.points_marker;
        let unit = &config.points_unit;

        Ok(Self {
            keywords,
            urgent: build(&config.urgent)?,
            finished: build(&config.finished)?,
            field_marker: build(&format!("(?:{reward})|(?:{points})"))?,
            label_noise: build(&format!(r"(?:{})\w*|(?:{})\w*", config.urgent, config.finished))?,
            required_points: build(&format!(r"(?:{points})\w*\s*[:\s]*([0-9]{{1,5}})"))?,
            bare_points: build(&format!(r"([0-9]{{1,5}})\s*(?:{unit})"))?,
            reward: build(&format!(
                r"(?:{reward})\s*[:\s]*([^\n\r•—]{{1,{max}}})",
                max = config.reward_max_chars.max(1)
            ))?,
            low_tier: build(&format!(r"\b{LOW_TIER}\s*(?:{unit})"))?,
            high_tier: build(&format!(r"\b{HIGH_TIER}\s*(?:{unit})"))?,
        })
    }

    /// Whether `text` matches any keyword.
    pub fn any_keyword(&self, text: &str) -> bool {
        self.keywords.is_match(text)
    }
}

fn build(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| AlphaWatchError::config(format!("invalid detector pattern `{pattern}`: {e}")))
}
