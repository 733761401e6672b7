// Shared types: wire payloads from the backend, user commands, and the
// view snapshot handed to the presentation layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Items and pages
// ---------------------------------------------------------------------------

/// Opaque, stable identifier of a profile card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

/// A single profile card as delivered by the feed.
///
/// The vote counters are the server's view at fetch time. Local votes are
/// tracked separately in [`crate::votes::VoteStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub smashes: u64,
    #[serde(default)]
    pub passes: u64,
    #[serde(default)]
    pub total_votes: u64,
    /// Everything else the backend sends (name, image, bio, ...).
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl Item {
    /// Vote counters as received from the server.
    pub fn tally(&self) -> Tally {
        Tally {
            smashes: self.smashes,
            passes: self.passes,
            total_votes: self.total_votes,
        }
    }

    /// Best-effort display name pulled from the profile payload.
    pub fn display_name(&self) -> String {
        ["name", "title", "username"]
            .iter()
            .find_map(|key| self.profile.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// One page of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "posts", alias = "items")]
    pub items: Vec<Item>,
    /// 1-based page number.
    pub page: u32,
    /// Total number of items across all pages.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// Aggregate vote counters for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub smashes: u64,
    pub passes: u64,
    pub total_votes: u64,
}

impl Tally {
    /// `smashes + passes == total_votes`.
    pub fn is_consistent(&self) -> bool {
        self.smashes + self.passes == self.total_votes
    }

    /// Share of smash votes in percent, or `None` before anyone has voted.
    pub fn smash_percent(&self) -> Option<f64> {
        if self.total_votes == 0 {
            None
        } else {
            Some(self.smashes as f64 * 100.0 / self.total_votes as f64)
        }
    }
}

/// The user's choice on the current item.
///
/// `Undecided` is the sentinel held while no choice is pending. The numeric
/// values mirror the backend's encoding (`-1`, `0`, `+1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    #[default]
    Undecided,
    Pass,
    Smash,
}

impl Decision {
    pub fn value(self) -> i8 {
        match self {
            Decision::Undecided => 0,
            Decision::Pass => -1,
            Decision::Smash => 1,
        }
    }

    pub fn is_decided(self) -> bool {
        self != Decision::Undecided
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Undecided => "undecided",
            Decision::Pass => "pass",
            Decision::Smash => "smash",
        }
    }
}

// ---------------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------------

/// Where the "your stats" overlay returns to when closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOrigin {
    Result,
    GameOver,
}

/// The single active screen of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    Confirming,
    ShowingResult,
    ShowingYourStats { origin: StatsOrigin },
    GameOver,
}

// ---------------------------------------------------------------------------
// Side effects requested by the core
// ---------------------------------------------------------------------------

/// Request for the orchestrator to fetch one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub session: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Request for the orchestrator to persist one vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub session: u64,
    pub item_id: ItemId,
    pub decision: Decision,
}

/// Side effects produced by a state transition. The core never performs I/O
/// itself; the orchestrator executes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchPage(PageRequest),
    RecordVote(VoteRequest),
}

// ---------------------------------------------------------------------------
// Presentation boundary
// ---------------------------------------------------------------------------

/// Input events from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Decide(Decision),
    Confirm(bool),
    Advance,
    OpenStats,
    CloseStats,
    RetryFeed,
    NewGame,
    Quit,
}

/// Per-session tally of the user's own choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerStats {
    pub smashed: u32,
    pub passed: u32,
}

impl PlayerStats {
    pub fn decided(&self) -> u32 {
        self.smashed + self.passed
    }
}

/// The item at the cursor together with its current (locally updated) counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub item: Item,
    pub tally: Tally,
}

/// Everything the presentation layer needs to render one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: u64,
    pub screen: Screen,
    /// `None` while the item at the cursor is still loading.
    pub item: Option<ItemView>,
    pub cursor: usize,
    pub total: usize,
    pub pending_decision: Decision,
    pub last_decision: Decision,
    pub loading: bool,
    /// Set when the last page fetch failed; cleared on retry.
    pub feed_error: Option<String>,
    pub player_stats: PlayerStats,
}

/// Updates pushed from the orchestrator to the presentation layer.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    Snapshot(Box<SessionView>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parses_backend_payload() {
        let json = r#"{
            "posts": [
                {"id": "p1", "smashes": 3, "passes": 1, "totalVotes": 4, "name": "Ada", "imageUrl": "a.png"},
                {"id": "p2", "smashes": 0, "passes": 0, "totalVotes": 0}
            ],
            "page": 1,
            "total": 25
        }"#;
        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, ItemId::from("p1"));
        assert_eq!(page.items[0].total_votes, 4);
        assert_eq!(page.items[0].display_name(), "Ada");
        assert_eq!(
            page.items[0].profile.get("imageUrl").and_then(Value::as_str),
            Some("a.png")
        );
        // Counters are not duplicated into the profile map.
        assert!(!page.items[0].profile.contains_key("smashes"));
        assert_eq!(page.items[1].display_name(), "p2");
    }

    #[test]
    fn page_accepts_items_alias() {
        let json = r#"{"items": [{"id": "x"}], "page": 2, "total": 11}"#;
        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].tally(), Tally::default());
    }

    #[test]
    fn decision_values_match_backend_encoding() {
        assert_eq!(Decision::Undecided.value(), 0);
        assert_eq!(Decision::Pass.value(), -1);
        assert_eq!(Decision::Smash.value(), 1);
        assert!(!Decision::default().is_decided());
    }

    #[test]
    fn smash_percent_handles_empty_tally() {
        assert_eq!(Tally::default().smash_percent(), None);
        let tally = Tally {
            smashes: 1,
            passes: 3,
            total_votes: 4,
        };
        assert_eq!(tally.smash_percent(), Some(25.0));
        assert!(tally.is_consistent());
    }
}
