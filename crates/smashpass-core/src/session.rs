// Game session state machine.
//
// One `GameSession` per game. Every input event is a method that mutates the
// session, recomputes the active `Screen`, and returns the side effects the
// orchestrator has to run (page fetches, vote writes). Async completions come
// back through `page_loaded` / `page_failed` and are checked against the
// session id first.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::feed::{FeedSlot, ItemFeed};
use crate::protocol::{
    Decision, Effect, Item, ItemView, Page, PlayerStats, Screen, SessionView, StatsOrigin,
};
use crate::votes::DecisionRecorder;

/// Contract violations by the caller. These are bugs in the front end, not
/// conditions a user can trigger through normal play.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a decision must be smash or pass, got undecided")]
    UndecidedChoice,

    #[error("confirm requested with no pending decision")]
    NoPendingDecision,
}

/// Tuning knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub page_size: u32,
    pub prefetch_margin: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            page_size: 10,
            prefetch_margin: crate::feed::DEFAULT_PREFETCH_MARGIN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: u64,
    screen: Screen,
    pending_decision: Decision,
    last_decision: Decision,
    cursor: usize,
    feed: ItemFeed,
    recorder: DecisionRecorder,
    player_stats: PlayerStats,
}

impl GameSession {
    /// Create a session with an empty feed. Call [`GameSession::start`] to
    /// get the request for the first page.
    pub fn new(id: u64, settings: SessionSettings) -> Self {
        GameSession {
            id,
            screen: Screen::Playing,
            pending_decision: Decision::Undecided,
            last_decision: Decision::Undecided,
            cursor: 0,
            feed: ItemFeed::new(id, settings.page_size, settings.prefetch_margin),
            recorder: DecisionRecorder::new(id),
            player_stats: PlayerStats::default(),
        }
    }

    /// Kick off the session by requesting page 1.
    pub fn start(&mut self) -> Vec<Effect> {
        info!("Session {} starting", self.id);
        self.feed
            .request_next_page()
            .map(Effect::FetchPage)
            .into_iter()
            .collect()
    }

    // -----------------------------------------------------------------------
    // User events
    // -----------------------------------------------------------------------

    /// Playing -> Confirming, if the item at the cursor has loaded.
    pub fn decide(&mut self, decision: Decision) -> Result<Vec<Effect>, SessionError> {
        if !decision.is_decided() {
            return Err(SessionError::UndecidedChoice);
        }
        if self.screen != Screen::Playing {
            debug!("decide ignored on {:?}", self.screen);
            return Ok(Vec::new());
        }
        if self.current_item().is_none() {
            debug!("decide ignored: item {} still loading", self.cursor);
            return Ok(Vec::new());
        }
        self.pending_decision = decision;
        self.screen = Screen::Confirming;
        Ok(Vec::new())
    }

    /// Confirming -> Playing (cancel) or ShowingResult (accept).
    ///
    /// Accepting prefetches the next page when the cursor is within the
    /// margin and records the vote.
    pub fn confirm(&mut self, accepted: bool) -> Result<Vec<Effect>, SessionError> {
        if self.screen != Screen::Confirming {
            debug!("confirm ignored on {:?}", self.screen);
            return Ok(Vec::new());
        }

        if !accepted {
            self.pending_decision = Decision::Undecided;
            self.screen = Screen::Playing;
            return Ok(Vec::new());
        }

        let decision = self.pending_decision;
        if !decision.is_decided() {
            return Err(SessionError::NoPendingDecision);
        }

        let mut effects = Vec::new();
        if self.feed.needs_prefetch(self.cursor) {
            if let Some(req) = self.feed.request_next_page() {
                effects.push(Effect::FetchPage(req));
            }
        }

        // Decide only succeeds on a loaded item and the cursor cannot move
        // while confirming, so the item is still here.
        let item = match self.feed.item_at(self.cursor) {
            FeedSlot::Ready(item) => item.clone(),
            FeedSlot::Pending => return Err(SessionError::NoPendingDecision),
        };
        if let Some(vote) = self.recorder.record(&item, decision) {
            effects.push(Effect::RecordVote(vote));
        }

        match decision {
            Decision::Smash => self.player_stats.smashed += 1,
            Decision::Pass => self.player_stats.passed += 1,
            Decision::Undecided => {}
        }
        self.last_decision = decision;
        self.pending_decision = Decision::Undecided;
        self.screen = Screen::ShowingResult;
        Ok(effects)
    }

    /// ShowingResult -> Playing, or GameOver once the cursor reaches the end.
    pub fn advance(&mut self) -> Vec<Effect> {
        if self.screen != Screen::ShowingResult {
            debug!("advance ignored on {:?}", self.screen);
            return Vec::new();
        }
        self.cursor += 1;
        if self.at_end() {
            info!(
                "Session {} game over at item {} of {}",
                self.id,
                self.cursor,
                self.feed.total()
            );
            self.screen = Screen::GameOver;
        } else {
            self.screen = Screen::Playing;
        }
        Vec::new()
    }

    /// Open "your stats" from the result screen or from game over.
    pub fn open_stats(&mut self) {
        let origin = match self.screen {
            Screen::ShowingResult => StatsOrigin::Result,
            Screen::GameOver => StatsOrigin::GameOver,
            other => {
                debug!("open_stats ignored on {:?}", other);
                return;
            }
        };
        self.screen = Screen::ShowingYourStats { origin };
    }

    /// Close "your stats" and return to the screen it was opened from.
    pub fn close_stats(&mut self) {
        match self.screen {
            Screen::ShowingYourStats { origin } => {
                self.screen = match origin {
                    StatsOrigin::Result => Screen::ShowingResult,
                    StatsOrigin::GameOver => Screen::GameOver,
                };
            }
            other => debug!("close_stats ignored on {:?}", other),
        }
    }

    /// Re-issue the next-page request after a failure. No-op while a fetch
    /// is outstanding or when nothing is missing.
    pub fn retry_feed(&mut self) -> Vec<Effect> {
        if self.feed.last_error().is_none() {
            debug!("retry_feed ignored: feed is healthy");
            return Vec::new();
        }
        info!("Session {} retrying page {}", self.id, self.feed.current_page() + 1);
        self.feed
            .request_next_page()
            .map(Effect::FetchPage)
            .into_iter()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Async completions
    // -----------------------------------------------------------------------

    /// Apply the response to a request for page `requested`. Returns
    /// `false` if it belongs to another session.
    pub fn page_loaded(&mut self, session: u64, requested: u32, page: Page) -> bool {
        if session != self.id {
            debug!(
                "Discarding page {} for stale session {} (current {})",
                page.page, session, self.id
            );
            return false;
        }
        let was_initialized = self.feed.is_initialized();
        let before = self.feed.len();
        self.feed.complete_page(requested, page);
        self.recorder
            .store_mut()
            .seed_all(&self.feed.loaded()[before..]);

        if !was_initialized && self.feed.is_initialized() && self.feed.total() == 0 {
            info!("Session {} has no items, game over", self.id);
            self.screen = Screen::GameOver;
        }
        true
    }

    /// Record a failed fetch. Returns `false` if it belongs to another session.
    pub fn page_failed(&mut self, session: u64, page: u32, message: &str) -> bool {
        if session != self.id {
            debug!(
                "Discarding failure of page {} for stale session {} (current {})",
                page, session, self.id
            );
            return false;
        }
        warn!("Session {} feed unavailable: {}", self.id, message);
        self.feed.fail_page(page, message);
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn pending_decision(&self) -> Decision {
        self.pending_decision
    }

    pub fn last_decision(&self) -> Decision {
        self.last_decision
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn feed(&self) -> &ItemFeed {
        &self.feed
    }

    pub fn recorder(&self) -> &DecisionRecorder {
        &self.recorder
    }

    pub fn player_stats(&self) -> PlayerStats {
        self.player_stats
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.feed.item_at(self.cursor).item()
    }

    pub fn is_over(&self) -> bool {
        matches!(
            self.screen,
            Screen::GameOver
                | Screen::ShowingYourStats {
                    origin: StatsOrigin::GameOver
                }
        )
    }

    /// Snapshot for the presentation layer.
    pub fn view(&self) -> SessionView {
        let item = self.current_item().map(|item| ItemView {
            item: item.clone(),
            tally: self.recorder.store().tally_for(item),
        });
        SessionView {
            session: self.id,
            screen: self.screen,
            loading: item.is_none() && !self.is_over(),
            item,
            cursor: self.cursor,
            total: self.feed.total(),
            pending_decision: self.pending_decision,
            last_decision: self.last_decision,
            feed_error: self.feed.last_error().map(str::to_string),
            player_stats: self.player_stats,
        }
    }

    fn at_end(&self) -> bool {
        self.cursor >= self.feed.total().saturating_sub(1)
    }
}
