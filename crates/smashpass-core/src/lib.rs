// Core of the smash-or-pass client: the paginated item feed, the decision
// recorder, and the game session state machine. No I/O happens here; side
// effects are returned as `protocol::Effect` values for the orchestrator.

pub mod config;
pub mod feed;
pub mod protocol;
pub mod session;
pub mod votes;
