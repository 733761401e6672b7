// Application orchestration.
//
// Owns the live `GameSession` and runs the event loop that feeds it user
// commands and async completions, one event at a time. Side effects returned
// by the session are executed here as spawned tokio tasks; their results come
// back over `event_tx` tagged with the session id that issued them, so a
// finished fetch from an abandoned session cannot touch the new one.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use smashpass_core::protocol::{Effect, Page, PageRequest, UiUpdate, UserCommand, VoteRequest};
use smashpass_core::session::{GameSession, SessionSettings};

use crate::backend::{submit_decision, DecisionSink, FeedSource};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Completions of background work, delivered back to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    PageFetched {
        session: u64,
        page: u32,
        result: Result<Page, String>,
    },
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub settings: SessionSettings,
    pub session: GameSession,
    pub feed_source: Arc<dyn FeedSource>,
    pub decision_sink: Arc<dyn DecisionSink>,
    /// Sender for completions; spawned tasks use a clone of it.
    pub event_tx: mpsc::Sender<AppEvent>,
    /// Id of the most recently created session. Incremented on every new
    /// game; completions carrying an older id are discarded.
    pub session_generation: u64,
}

impl AppState {
    /// Create the state with an idle first session. Nothing is fetched until
    /// [`AppState::start_new_session`] runs.
    pub fn new(
        settings: SessionSettings,
        feed_source: Arc<dyn FeedSource>,
        decision_sink: Arc<dyn DecisionSink>,
        event_tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        AppState {
            settings,
            session: GameSession::new(0, settings),
            feed_source,
            decision_sink,
            event_tx,
            session_generation: 0,
        }
    }

    /// Replace the current session with a fresh one and request its first
    /// page.
    pub fn start_new_session(&mut self) {
        self.session_generation += 1;
        self.session = GameSession::new(self.session_generation, self.settings);
        info!("Started session {}", self.session_generation);
        let effects = self.session.start();
        self.execute(effects);
    }

    /// Run side effects requested by the session.
    pub fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchPage(request) => self.spawn_fetch(request),
                Effect::RecordVote(vote) => self.spawn_vote(vote),
            }
        }
    }

    fn spawn_fetch(&self, request: PageRequest) {
        let source = Arc::clone(&self.feed_source);
        let tx = self.event_tx.clone();
        debug!(
            "Fetching page {} for session {}",
            request.page, request.session
        );
        tokio::spawn(async move {
            let result = source
                .fetch_page(request.page, request.page_size)
                .await
                .map_err(|e| e.to_string());
            let event = AppEvent::PageFetched {
                session: request.session,
                page: request.page,
                result,
            };
            if tx.send(event).await.is_err() {
                debug!("Event loop gone, dropping page {}", request.page);
            }
        });
    }

    /// Fire-and-forget: failures are logged and the optimistic local counts
    /// are kept.
    fn spawn_vote(&self, vote: VoteRequest) {
        let sink = Arc::clone(&self.decision_sink);
        tokio::spawn(async move {
            if let Err(e) = submit_decision(sink.as_ref(), &vote.item_id, vote.decision).await {
                warn!(
                    "Failed to record {} for {}: {}",
                    vote.decision.label(),
                    vote.item_id,
                    e
                );
            }
        });
    }

    /// Apply a user command to the session. Returns `false` for `Quit`.
    pub fn handle_user_command(&mut self, cmd: UserCommand) -> bool {
        let effects = match cmd {
            UserCommand::Decide(decision) => self.session.decide(decision),
            UserCommand::Confirm(accepted) => self.session.confirm(accepted),
            UserCommand::Advance => Ok(self.session.advance()),
            UserCommand::OpenStats => {
                self.session.open_stats();
                Ok(Vec::new())
            }
            UserCommand::CloseStats => {
                self.session.close_stats();
                Ok(Vec::new())
            }
            UserCommand::RetryFeed => Ok(self.session.retry_feed()),
            UserCommand::NewGame => {
                self.start_new_session();
                Ok(Vec::new())
            }
            UserCommand::Quit => return false,
        };

        match effects {
            Ok(effects) => self.execute(effects),
            Err(e) => warn!("Rejected command in session {}: {}", self.session.id(), e),
        }
        true
    }

    /// Apply a background completion. Returns `true` if it changed the
    /// current session.
    pub fn handle_app_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::PageFetched {
                session,
                page,
                result,
            } => match result {
                Ok(p) => self.session.page_loaded(session, page, p),
                Err(message) => self.session.page_failed(session, page, &message),
            },
        }
    }

    fn snapshot(&self) -> UiUpdate {
        UiUpdate::Snapshot(Box::new(self.session.view()))
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the application event loop until `Quit` arrives or the command
/// channel closes.
///
/// Starts a session immediately. A fresh snapshot is pushed through `ui_tx`
/// after every event that may have changed what is on screen.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut event_rx: mpsc::Receiver<AppEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    state.start_new_session();
    let _ = ui_tx.send(state.snapshot()).await;

    loop {
        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        debug!("Command: {:?}", cmd);
                        if !state.handle_user_command(cmd) {
                            info!("Quit command received, shutting down");
                            break;
                        }
                        let _ = ui_tx.send(state.snapshot()).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Background completions ---
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        if state.handle_app_event(event) {
                            let _ = ui_tx.send(state.snapshot()).await;
                        }
                    }
                    None => {
                        // Unreachable while `state` holds a sender.
                        info!("Event channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!("Application event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
