// defectdesk - client for the construction defect tracker API
//
// Architecture:
// - Transport (reqwest): authorized HTTP calls with a fixed timeout
// - Session manager: login/refresh/logout, tokens persisted to session storage
// - Stores: defect and project caches with derived dashboard counters
// - AppContext: wires the above together once per process
// - CLI (clap): command-line front end over AppContext

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod models;
pub mod session;
pub mod storage;
pub mod stores;
pub mod transport;

#[cfg(test)]
mod testing;

pub use app::AppContext;
pub use error::{ApiError, BestEffort};
pub use session::{SessionManager, SessionPhase};
