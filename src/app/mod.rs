pub mod config;
pub mod controller;
pub mod state;

pub use config::AppConfig;
pub use controller::{spawn_run, RunController, RunOutcome};
pub use state::{AppEvent, AppState, PendingRun, ResultRecord, RunPhase, SessionState};
