// ABOUTME: Run controller driving one OCR invocation from pending to resolved
// Runs as a spawned task so the dashboard keeps drawing while the request is in flight

use crate::app::state::{AppEvent, AppState, ResultRecord, SessionState};
use crate::data::inference::{InferenceClient, OCR_INSTRUCTION};
use crate::utils::cost_calculator::CostCalculator;
use chrono::Local;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(ResultRecord),
    Failed(String),
}

pub struct RunController {
    client: Arc<dyn InferenceClient>,
    calculator: CostCalculator,
}

impl RunController {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self {
            client,
            calculator: CostCalculator::new(),
        }
    }

    /// Resolve the session's pending run, if any.
    ///
    /// Makes a single inference attempt. Whatever happens, the pending flag is
    /// cleared before returning. Returns `None` when nothing was pending.
    pub async fn run_pending(&self, session: &Mutex<SessionState>) -> Option<RunOutcome> {
        let run = session.lock().unwrap().begin_run()?;
        info!(model = %run.model_id, bytes = run.image.len(), "OCR run started");

        let started = Instant::now();
        let result = self.client.infer(&run.model_id, OCR_INSTRUCTION, &run.image).await;
        let elapsed = started.elapsed();

        let mut session = session.lock().unwrap();
        match result {
            Ok(output) => {
                let cost = self
                    .calculator
                    .compute_cost(&run.model_id, output.input_tokens, output.output_tokens);

                let record = ResultRecord {
                    timestamp: Local::now(),
                    model_id: run.model_id,
                    text: output.text,
                    input_tokens: output.input_tokens,
                    output_tokens: output.output_tokens,
                    cost,
                    elapsed,
                };

                info!(
                    input_tokens = record.input_tokens,
                    output_tokens = record.output_tokens,
                    cost = record.total_cost(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "OCR run completed"
                );

                session.complete_run(record.clone());
                Some(RunOutcome::Completed(record))
            }
            Err(e) => {
                let message = e.to_string();
                error!(model = %run.model_id, "OCR run failed: {}", message);
                session.fail_run(message.clone());
                Some(RunOutcome::Failed(message))
            }
        }
    }
}

/// Resolve the pending run in the background and notify the event loop
pub fn spawn_run(
    state: Arc<AppState>,
    controller: Arc<RunController>,
    event_tx: Sender<AppEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = controller.run_pending(&state.session).await;
        *state.run_started.lock().unwrap() = None;

        if outcome.is_some() {
            if let Err(e) = event_tx.send(AppEvent::RunFinished) {
                error!("Failed to notify UI of finished run: {}", e);
            }
        }
    })
}
