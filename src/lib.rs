// ABOUTME: Main library module that exports the public API
// Central module for the Gemini OCR terminal client

pub mod app;
pub mod data;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use app::{AppConfig, AppEvent, AppState, ResultRecord, RunController, RunOutcome, SessionState};
pub use utils::{CostBreakdown, CostCalculator, OcrError, OcrModel, Result};
