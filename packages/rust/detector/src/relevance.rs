//! Relevance filter: keeps only records worth an alert.

use alphawatch_shared::AnnouncementRecord;

/// Drop records that are completed or carry no urgency signal.
///
/// Dropped records never reach the detected set, so one that later turns
/// actionable is still alerted once.
pub fn retain_actionable(records: Vec<AnnouncementRecord>) -> Vec<AnnouncementRecord> {
    records.into_iter().filter(AnnouncementRecord::is_actionable).collect()
}
