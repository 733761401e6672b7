// Terminal client for the smash-or-pass game.

pub mod tui;
