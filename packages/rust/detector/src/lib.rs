//! Announcement detection over raw page HTML.
//!
//! This crate provides:
//! - [`normalize`]: plain-text extraction and whitespace collapsing
//! - [`locate`]: keyword-anchored candidate block location
//! - [`extract`]: field extraction into [`AnnouncementRecord`]s
//! - [`relevance`]: the actionable-record filter
//! - [`Detector`]: all of the above behind one compiled vocabulary

pub mod extract;
pub mod locate;
pub mod normalize;
pub mod patterns;
pub mod relevance;

use scraper::Html;
use tracing::instrument;

use alphawatch_shared::{AnnouncementRecord, DetectorConfig, Result};

pub use locate::{BlockLimits, ParentLink, fingerprint, widen};
pub use patterns::Patterns;
pub use relevance::retain_actionable;

/// Compiled detection pipeline: locate blocks, then extract records.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    patterns: Patterns,
}

impl Detector {
    /// Compile the configured vocabulary.
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            patterns: Patterns::compile(config)?,
        })
    }

    fn limits(&self) -> BlockLimits {
        BlockLimits {
            min_chars: self.config.min_block_chars,
            fingerprint_chars: self.config.fingerprint_chars,
            max_ascent: self.config.max_ascent,
        }
    }

    /// Unique candidate blocks of an HTML document, in document order.
    pub fn locate(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        locate::locate_blocks(&doc, &self.patterns, &self.limits())
    }

    /// Derive a record from one text block.
    pub fn extract(&self, block: &str) -> AnnouncementRecord {
        extract::extract_record(block, &self.patterns, &self.config)
    }

    /// Every record found in an HTML document, actionable or not.
    #[instrument(skip_all, fields(html_len = html.len()))]
    pub fn scan(&self, html: &str) -> Vec<AnnouncementRecord> {
        self.locate(html)
            .iter()
            .map(|block| self.extract(block))
            .collect()
    }

    /// Actionable records found in an HTML document.
    pub fn actionable(&self, html: &str) -> Vec<AnnouncementRecord> {
        retain_actionable(self.scan(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphawatch_shared::Status;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn detector() -> Detector {
        Detector::new(&DetectorConfig::default()).unwrap()
    }

    #[test]
    fn feed_fixture_blocks() {
        let blocks = detector().locate(&load_fixture("alpha_feed.html"));

        assert_eq!(
            blocks,
            vec![
                "CoolCoin Успейте принять участие Требуемые баллы: 15 Сумма получения: 20 USDT",
                "CoolCoin Успейте принять участие Требуемые баллы: 15 Сумма получения: 20 USDT \
                 OldToken Завершено Требуемые баллы: 50 Сумма получения: 5 USDT",
                "Сумма получения: 20 USDT",
                "OldToken Завершено Требуемые баллы: 50 Сумма получения: 5 USDT",
                "Сумма получения: 5 USDT",
            ]
        );
        assert!(blocks.iter().all(|b| b.chars().count() >= 20));
    }

    #[test]
    fn feed_fixture_actionable() {
        let records = detector().actionable(&load_fixture("alpha_feed.html"));

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.project, "CoolCoin");
        assert_eq!(record.required_points, "15");
        assert_eq!(record.reward, "20 USDT");
        assert!(record.urgent);
        assert!(record.point_tier_15);
        assert_eq!(record.status, Status::Active);
    }

    #[test]
    fn feed_fixture_completed_records_dropped() {
        let d = detector();
        let all = d.scan(&load_fixture("alpha_feed.html"));
        assert!(all.iter().any(|r| r.status == Status::Completed));
        assert!(d
            .actionable(&load_fixture("alpha_feed.html"))
            .iter()
            .all(|r| r.status == Status::Active));
    }

    #[test]
    fn unrelated_page_yields_nothing() {
        let d = detector();
        let html = load_fixture("unrelated.html");
        assert!(d.locate(&html).is_empty());
        assert!(d.scan(&html).is_empty());
    }

    #[test]
    fn garbage_input_yields_nothing() {
        let d = detector();
        assert!(d.scan("").is_empty());
        assert!(d.scan("<<<>>> </div> &&& <p").is_empty());
    }

    #[test]
    fn scan_is_deterministic() {
        let d = detector();
        let html = load_fixture("alpha_feed.html");
        assert_eq!(d.scan(&html), d.scan(&html));
    }
}
