//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! ```ignore
//! // [dev-dependencies]
//! // upgrade-events = { path = "../upgrade-events", features = ["test-fixtures"] }
//!
//! let save = upgrade_events::fixtures::sample_save();
//! ```

use crate::{SaveGame, UpgradeEvent};

/// Returns the sample save file.
///
/// Contains:
/// - a poor table marked for upgrade to good, with its construction order
/// - a normal longsword held inside a half-finished crafting order
/// - a smithy with one upgrade bill
/// - two steel stacks and one worker
pub fn sample_save() -> SaveGame {
    let json = include_str!("../tests/fixtures/sample_save.json");
    SaveGame::from_json(json).expect("Failed to parse sample_save.json")
}

/// Returns sample events from the fixtures file.
pub fn sample_events() -> Vec<UpgradeEvent> {
    let jsonl = include_str!("../tests/fixtures/sample_events.jsonl");
    jsonl
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            UpgradeEvent::from_jsonl(l).unwrap_or_else(|e| {
                panic!("Failed to parse event line: {}\nError: {}", l, e)
            })
        })
        .collect()
}
