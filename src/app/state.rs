// ABOUTME: Central application state and the per-session OCR store
// Holds run history, running cost and the pending-run request shared by UI and controller

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::config::AppConfig;
use crate::data::upload::{ImagePayload, UploadedImage};
use crate::utils::cost_calculator::{CostBreakdown, OcrModel};
use crate::utils::error::{OcrError, Result};

/// A run the user asked for but the controller has not resolved yet
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub image: ImagePayload,
    pub model_id: String,
}

/// Outcome of one successful OCR run
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub timestamp: DateTime<Local>,
    pub model_id: String,
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: CostBreakdown,
    pub elapsed: Duration,
}

impl ResultRecord {
    pub fn total_cost(&self) -> f64 {
        self.cost.total_cost
    }

    pub fn model_name(&self) -> String {
        OcrModel::from_str(&self.model_id)
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| self.model_id.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    PendingSubmit,
    Running,
    Resolved,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub total_cost: f64,
    /// Newest first
    pub history: VecDeque<ResultRecord>,
    pub current_result: Option<ResultRecord>,
    pub run_pending: bool,
    pub pending_run: Option<PendingRun>,
    pub phase: RunPhase,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            total_cost: 0.0,
            history: VecDeque::new(),
            current_result: None,
            run_pending: false,
            pending_run: None,
            phase: RunPhase::Idle,
            last_error: None,
        }
    }

    /// Queue a run. All writes happen under one lock held by the caller.
    pub fn trigger(&mut self, run: PendingRun) -> Result<()> {
        if self.run_pending {
            return Err(OcrError::RunInProgress);
        }

        self.pending_run = Some(run);
        self.run_pending = true;
        self.current_result = None;
        self.last_error = None;
        self.phase = RunPhase::PendingSubmit;
        Ok(())
    }

    /// Move a pending run to `Running`, handing back its payload
    pub(crate) fn begin_run(&mut self) -> Option<PendingRun> {
        if !self.run_pending || self.phase != RunPhase::PendingSubmit {
            return None;
        }
        let run = self.pending_run.clone()?;
        self.phase = RunPhase::Running;
        Some(run)
    }

    pub(crate) fn complete_run(&mut self, record: ResultRecord) {
        self.total_cost += record.total_cost();
        self.history.push_front(record.clone());
        self.current_result = Some(record);
        self.last_error = None;
        self.phase = RunPhase::Resolved;
        self.finish_run();
    }

    pub(crate) fn fail_run(&mut self, message: String) {
        self.current_result = None;
        self.last_error = Some(message);
        self.phase = RunPhase::Resolved;
        self.finish_run();
    }

    fn finish_run(&mut self) {
        self.pending_run = None;
        self.run_pending = false;
        self.phase = RunPhase::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.phase == RunPhase::Idle
    }

    pub fn run_count(&self) -> usize {
        self.history.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Main,
    History,
}

/// Which input currently owns the keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingPath(String),
}

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub session: Arc<Mutex<SessionState>>,
    pub selected_model: Arc<Mutex<OcrModel>>,
    pub uploaded_image: Arc<Mutex<Option<UploadedImage>>>,
    pub upload_error: Arc<Mutex<Option<String>>>,
    pub view_mode: Arc<Mutex<ViewMode>>,
    pub input_mode: Arc<Mutex<InputMode>>,
    pub scroll_offset: Arc<Mutex<u16>>,
    pub selected_history_index: Arc<Mutex<usize>>,
    pub run_started: Arc<Mutex<Option<DateTime<Local>>>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let model = config.default_model;
        Self {
            config,
            session: Arc::new(Mutex::new(SessionState::new())),
            selected_model: Arc::new(Mutex::new(model)),
            uploaded_image: Arc::new(Mutex::new(None)),
            upload_error: Arc::new(Mutex::new(None)),
            view_mode: Arc::new(Mutex::new(ViewMode::Main)),
            input_mode: Arc::new(Mutex::new(InputMode::Normal)),
            scroll_offset: Arc::new(Mutex::new(0)),
            selected_history_index: Arc::new(Mutex::new(0)),
            run_started: Arc::new(Mutex::new(None)),
        }
    }

    /// Clone of the session for rendering
    pub fn snapshot(&self) -> SessionState {
        self.session.lock().unwrap().clone()
    }

    pub fn total_cost(&self) -> f64 {
        self.session.lock().unwrap().total_cost
    }

    pub fn history(&self) -> Vec<ResultRecord> {
        self.session.lock().unwrap().history.iter().cloned().collect()
    }

    pub fn current_result(&self) -> Option<ResultRecord> {
        self.session.lock().unwrap().current_result.clone()
    }

    pub fn is_run_pending(&self) -> bool {
        self.session.lock().unwrap().run_pending
    }

    pub fn selected_model(&self) -> OcrModel {
        *self.selected_model.lock().unwrap()
    }

    pub fn toggle_model(&self) -> OcrModel {
        let mut model = self.selected_model.lock().unwrap();
        *model = model.toggle();
        *model
    }

    pub fn set_uploaded_image(&self, image: UploadedImage) {
        *self.uploaded_image.lock().unwrap() = Some(image);
        *self.upload_error.lock().unwrap() = None;
    }

    pub fn set_upload_error(&self, message: String) {
        *self.uploaded_image.lock().unwrap() = None;
        *self.upload_error.lock().unwrap() = Some(message);
    }

    /// Queue an OCR run for the uploaded image with the selected model
    pub fn trigger_run(&self) -> Result<PendingRun> {
        let image = self
            .uploaded_image
            .lock()
            .unwrap()
            .as_ref()
            .map(|uploaded| uploaded.payload.clone())
            .ok_or_else(|| OcrError::ImageDecode("no image has been loaded".to_string()))?;

        let run = PendingRun {
            image,
            model_id: self.selected_model().id().to_string(),
        };

        self.session.lock().unwrap().trigger(run.clone())?;
        *self.scroll_offset.lock().unwrap() = 0;
        *self.run_started.lock().unwrap() = Some(Local::now());
        Ok(run)
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Input(crossterm::event::KeyEvent),
    RunRequested,
    RunFinished,
    Resize(u16, u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn pending(model: OcrModel) -> PendingRun {
        PendingRun {
            image: ImagePayload {
                bytes: Arc::from(vec![0u8; 8]),
                format: ImageFormat::Png,
            },
            model_id: model.id().to_string(),
        }
    }

    fn record(total: f64) -> ResultRecord {
        ResultRecord {
            timestamp: Local::now(),
            model_id: OcrModel::Flash.id().to_string(),
            text: "text".to_string(),
            input_tokens: 1,
            output_tokens: 1,
            cost: CostBreakdown {
                input_cost: total,
                output_cost: 0.0,
                total_cost: total,
            },
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_initial_session() {
        let session = SessionState::new();
        assert_eq!(session.total_cost, 0.0);
        assert!(session.history.is_empty());
        assert!(session.current_result.is_none());
        assert!(!session.run_pending);
        assert!(session.pending_run.is_none());
        assert!(session.is_idle());
    }

    #[test]
    fn test_trigger_sets_pending_and_clears_result() {
        let mut session = SessionState::new();
        session.current_result = Some(record(0.1));
        session.last_error = Some("old".to_string());

        session.trigger(pending(OcrModel::Pro)).unwrap();

        assert!(session.run_pending);
        assert_eq!(session.phase, RunPhase::PendingSubmit);
        assert_eq!(session.pending_run.as_ref().unwrap().model_id, OcrModel::Pro.id());
        assert!(session.current_result.is_none());
        assert!(session.last_error.is_none());
    }

    #[test]
    fn test_second_trigger_rejected() {
        let mut session = SessionState::new();
        session.trigger(pending(OcrModel::Flash)).unwrap();

        let err = session.trigger(pending(OcrModel::Pro)).unwrap_err();
        assert!(matches!(err, OcrError::RunInProgress));
        assert_eq!(session.pending_run.as_ref().unwrap().model_id, OcrModel::Flash.id());
    }

    #[test]
    fn test_begin_run_only_once() {
        let mut session = SessionState::new();
        assert!(session.begin_run().is_none());

        session.trigger(pending(OcrModel::Flash)).unwrap();
        assert!(session.begin_run().is_some());
        assert_eq!(session.phase, RunPhase::Running);
        assert!(session.run_pending);
        assert!(session.pending_run.is_some());
        assert!(session.begin_run().is_none());
    }

    #[test]
    fn test_complete_and_fail() {
        let mut session = SessionState::new();

        session.trigger(pending(OcrModel::Flash)).unwrap();
        session.begin_run();
        session.complete_run(record(0.5));
        assert_eq!(session.total_cost, 0.5);
        assert_eq!(session.run_count(), 1);
        assert!(!session.run_pending);
        assert!(session.pending_run.is_none());
        assert!(session.is_idle());

        session.trigger(pending(OcrModel::Flash)).unwrap();
        session.begin_run();
        session.fail_run("boom".to_string());
        assert_eq!(session.total_cost, 0.5);
        assert_eq!(session.run_count(), 1);
        assert!(session.current_result.is_none());
        assert_eq!(session.last_error.as_deref(), Some("boom"));
        assert!(!session.run_pending);
        assert!(session.pending_run.is_none());
    }

    #[test]
    fn test_trigger_without_image() {
        let state = AppState::new(AppConfig::default());
        let err = state.trigger_run().unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));
        assert!(!state.is_run_pending());
    }

    #[test]
    fn test_toggle_model() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(state.selected_model(), OcrModel::Flash);
        assert_eq!(state.toggle_model(), OcrModel::Pro);
        assert_eq!(state.selected_model(), OcrModel::Pro);
    }
}
