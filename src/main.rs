// ABOUTME: Entry point for the Gemini OCR terminal client
// Sets up logging, credentials, terminal and the event loop that drives OCR runs

use anyhow::{bail, Result};
use clap::{Arg, Command};
use crossbeam_channel::{bounded, Receiver, Sender};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gemini_ocr::{
    app::{
        config::AppConfig,
        controller::{spawn_run, RunController, RunOutcome},
        state::{AppEvent, AppState},
    },
    data::{gemini::GeminiClient, inference::InferenceClient, upload::{expand_path, load_image}},
    ui::dashboard::{format_elapsed, Dashboard},
    utils::{CostCalculator, OcrModel},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;

struct CliArgs {
    config: AppConfig,
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let CliArgs { config, image } = parse_args()?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let log_guard = if config.debug { init_logging(&config) } else { None };

    // The API key is a startup precondition: without it nothing else runs
    let api_key = match config.resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            tracing::error!("startup aborted: {}", e);
            eprintln!("⚠️  {}", e);
            eprintln!("Set the GOOGLE_API_KEY environment variable, or create secrets.toml containing:");
            eprintln!("    GOOGLE_API_KEY = \"YOUR_API_KEY\"");
            // exit() skips destructors, so flush the log writer first
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let client: Arc<dyn InferenceClient> = Arc::new(GeminiClient::new(api_key, &config)?);
    let controller = Arc::new(RunController::new(client));
    let state = Arc::new(AppState::new(config.clone()));

    // Check if we're in a TTY
    if !atty::is(atty::Stream::Stdout) {
        return run_single_image(state, controller, image).await;
    }

    if let Some(path) = image {
        match load_image(&path, &state.config.accepted_extensions) {
            Ok(uploaded) => state.set_uploaded_image(uploaded),
            Err(e) => state.set_upload_error(e.to_string()),
        }
    }

    let mut terminal = setup_terminal()?;

    let (event_tx, event_rx) = bounded::<AppEvent>(100);
    spawn_input_handler(event_tx.clone());

    let mut dashboard = Dashboard::new(state.clone(), event_tx.clone());

    let result = run_event_loop(
        &mut terminal,
        &mut dashboard,
        state,
        controller,
        event_tx,
        event_rx,
        Duration::from_millis(config.tick_rate_ms),
    )
    .await;

    restore_terminal(&mut terminal)?;

    result
}

fn parse_args() -> Result<CliArgs> {
    let matches = Command::new("gemini-ocr")
        .version("0.1.0")
        .author("Gemini OCR Team")
        .about("Extract text from images with Gemini and track what it costs")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .help("Model to start with: flash or pro"),
        )
        .arg(
            Arg::new("image")
                .short('i')
                .long("image")
                .value_name("FILE")
                .help("Image to load (required when stdout is not a terminal)"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let mut config = AppConfig::load_from(&expand_path(path))?;
            config.apply_env_overrides();
            config
        }
        None => AppConfig::load(),
    };

    if let Some(model) = matches.get_one::<String>("model") {
        match OcrModel::from_str(model) {
            Some(parsed) => config.default_model = parsed,
            None => bail!("Unknown model '{}', expected 'flash' or 'pro'", model),
        }
    }

    config.debug = matches.get_flag("debug");

    let image = matches.get_one::<String>("image").map(|p| expand_path(p));

    Ok(CliArgs { config, image })
}

fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    let log_dir = config.log_directory();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: could not create log directory {:?}: {}", log_dir, e);
        return None;
    }

    let appender = tracing_appender::rolling::never(&log_dir, "gemini-ocr.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter("gemini_ocr=debug")
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_handler(tx: Sender<AppEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(100)) {
            let sent = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => tx.send(AppEvent::Input(key)),
                Ok(Event::Resize(w, h)) => tx.send(AppEvent::Resize(w, h)),
                _ => Ok(()),
            };
            if sent.is_err() {
                break;
            }
        }
    });
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    dashboard: &mut Dashboard,
    state: Arc<AppState>,
    controller: Arc<RunController>,
    event_tx: Sender<AppEvent>,
    event_rx: Receiver<AppEvent>,
    tick_rate: Duration,
) -> Result<()> {
    loop {
        terminal.draw(|f| dashboard.render(f))?;

        // A timeout still redraws so the spinner keeps moving
        if let Ok(event) = event_rx.recv_timeout(tick_rate) {
            match event {
                AppEvent::Input(key) => {
                    if !dashboard.handle_key(key.code) {
                        break;
                    }
                }
                AppEvent::RunRequested => {
                    spawn_run(state.clone(), controller.clone(), event_tx.clone());
                }
                AppEvent::RunFinished => {
                    // Session already updated by the controller
                }
                AppEvent::Resize(_, _) => {
                    // Terminal will handle resize automatically
                }
            }
        }
    }

    Ok(())
}

async fn run_single_image(
    state: Arc<AppState>,
    controller: Arc<RunController>,
    image: Option<PathBuf>,
) -> Result<()> {
    let Some(path) = image else {
        println!("Gemini OCR");
        println!("==========");
        println!("stdout is not a terminal, so the interactive dashboard is unavailable.");
        println!("Pass an image to extract its text directly:");
        println!("  gemini-ocr --image scan.png [--model pro]");
        return Ok(());
    };

    let uploaded = match load_image(&path, &state.config.accepted_extensions) {
        Ok(uploaded) => uploaded,
        Err(e) => bail!("Could not load {}: {}", path.display(), e),
    };
    state.set_uploaded_image(uploaded);
    state.trigger_run()?;

    match controller.run_pending(&state.session).await {
        Some(RunOutcome::Completed(record)) => {
            println!("{}", record.text);
            eprintln!();
            eprintln!("Model: {}", record.model_name());
            eprintln!(
                "Input tokens: {} ({})",
                record.input_tokens,
                CostCalculator::format_cost(record.cost.input_cost)
            );
            eprintln!(
                "Output tokens: {} ({})",
                record.output_tokens,
                CostCalculator::format_cost(record.cost.output_cost)
            );
            eprintln!("Total cost: {}", CostCalculator::format_cost(record.total_cost()));
            eprintln!("Elapsed: {}", format_elapsed(record.elapsed));
            Ok(())
        }
        Some(RunOutcome::Failed(message)) => bail!("{}", message),
        None => bail!("No OCR run was queued"),
    }
}
