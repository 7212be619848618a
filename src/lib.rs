//! WealthSync relay server library.
//!
//! Exposes the server's router so it can be embedded and tested; the
//! `wealthsync-server` binary wires it to the environment.

pub mod server;

pub use server::{router, AppState};
