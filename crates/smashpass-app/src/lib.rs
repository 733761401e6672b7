// Async orchestration for the smash-or-pass client: backend clients and the
// event loop that drives a `GameSession`.

pub mod app;
pub mod backend;
