#![recursion_limit = "256"]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info, warn};

use soft_q_cartpole::ai::{SoftQAgent, TrainableAgent};
use soft_q_cartpole::checkpoint::{CheckpointManager, CheckpointManagerConfig};
use soft_q_cartpole::config::AppConfig;
use soft_q_cartpole::logging;
use soft_q_cartpole::training::dashboard_msg::{TrainingCommand, TrainingUpdate};
use soft_q_cartpole::training::scalar_log::JsonlScalarWriter;
use soft_q_cartpole::training::trainer::{Trainer, TrainingSummary};
use soft_q_cartpole::ui::training_dashboard::{DashboardState, TrainingStatus};
use soft_q_cartpole::ui::training_view;

const TUI_LOG_FILE: &str = "sql-train.log";

/// Train a Soft Q-Learning agent on CartPole.
#[derive(Parser)]
#[command(name = "train", about = "Train a Soft Q-Learning agent on CartPole")]
struct Cli {
    /// Resume training from the latest checkpoint
    #[arg(long)]
    resume: bool,

    /// Run in headless mode (log output, no TUI dashboard)
    #[arg(long)]
    headless: bool,

    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override number of training episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Override learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Override the Boltzmann temperature
    #[arg(long)]
    alpha: Option<f32>,

    /// Seed the environment, action sampling and replay sampling
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.headless {
        logging::init_console_logging();
    } else {
        logging::init_file_logging(Path::new(TUI_LOG_FILE))
            .with_context(|| format!("creating log file {TUI_LOG_FILE}"))?;
    }

    // Load configuration
    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(episodes) = cli.episodes {
        app_config.training.num_episodes = episodes;
    }
    if let Some(lr) = cli.lr {
        app_config.sql.learning_rate = lr;
    }
    if let Some(alpha) = cli.alpha {
        app_config.sql.alpha = alpha;
    }
    if cli.seed.is_some() {
        app_config.training.seed = cli.seed;
    }
    app_config.validate().context("validating configuration")?;

    let mut agent = match app_config.training.seed {
        Some(seed) => SoftQAgent::with_seed(app_config.sql.clone(), seed),
        None => SoftQAgent::new(app_config.sql.clone()),
    };
    if cli.resume {
        resume_agent(&mut agent, &app_config)?;
    }

    let sink = JsonlScalarWriter::create(&app_config.training.log_dir).with_context(|| {
        format!(
            "creating scalar log in {}",
            app_config.training.log_dir.display()
        )
    })?;
    info!(path = %sink.path().display(), "writing scalar log");

    let trainer = Trainer::with_checkpoint_config(
        app_config.training.clone(),
        app_config.env,
        app_config.checkpoint.clone(),
    );

    if cli.headless {
        let mut sink = sink;
        let summary = trainer
            .train(&mut agent, &mut sink)
            .context("training failed")?;
        log_reward_history(&summary);
        Ok(())
    } else {
        run_dashboard(agent, trainer, sink, app_config.env.x_threshold)
    }
}

/// Resume an agent from the latest checkpoint. The training state is restored
/// first so the network shapes match the saved weights.
fn resume_agent(agent: &mut dyn TrainableAgent, config: &AppConfig) -> Result<()> {
    let manager = CheckpointManager::new(CheckpointManagerConfig {
        checkpoint_dir: config.training.checkpoint_dir.clone(),
        ..config.checkpoint.clone()
    });
    match manager.load_agent_latest() {
        Ok(data) => {
            agent
                .restore_training_state_json(&data.training_state_json)
                .map_err(|e| anyhow::anyhow!("restoring training state: {e}"))?;
            agent
                .load_weights_from_dir(&data.path)
                .map_err(|e| anyhow::anyhow!("loading checkpoint weights: {e}"))?;
            info!(
                episode = data.metadata.episode,
                learn_steps = agent.step_count(),
                "resumed from checkpoint"
            );
        }
        Err(e) => {
            warn!(error = %e, "no checkpoint found, starting fresh");
        }
    }
    Ok(())
}

/// Headless stand-in for the reward plot.
fn log_reward_history(summary: &TrainingSummary) {
    for (episode, reward) in &summary.reward_history {
        info!(episode, reward, "reward history");
    }
    info!(
        episodes = summary.episodes,
        final_average_reward = summary.final_average_reward,
        best_average_reward = summary.best_average_reward,
        "done"
    );
}

fn run_dashboard(
    agent: SoftQAgent,
    trainer: Trainer,
    sink: JsonlScalarWriter,
    x_threshold: f64,
) -> Result<()> {
    let algorithm = agent.algorithm_name().to_string();
    let total_episodes = agent.episode_count() + trainer.config().num_episodes;

    let (update_tx, update_rx) = mpsc::channel::<TrainingUpdate>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<TrainingCommand>();

    let pause = Arc::new(AtomicBool::new(false));
    let quit = Arc::new(AtomicBool::new(false));

    let pause_clone = pause.clone();
    let quit_clone = quit.clone();

    let training_handle = std::thread::spawn(move || {
        let mut agent = agent;
        let mut sink = sink;
        let result = trainer.train_with_dashboard(
            &mut agent,
            &mut sink,
            update_tx,
            cmd_rx,
            pause_clone,
            quit_clone,
        );
        match &result {
            Ok(summary) => {
                for (episode, reward) in &summary.reward_history {
                    info!(episode, reward, "reward history");
                }
            }
            Err(e) => error!(error = %e, "training failed"),
        }
        result
    });

    let mut dashboard = DashboardState::new(total_episodes, x_threshold);
    dashboard.algorithm = algorithm;
    run_dashboard_ui(update_rx, cmd_tx, pause, quit, dashboard)?;

    // The terminal is restored by now, so a training error reaches stderr
    match training_handle.join() {
        Ok(result) => {
            result.context("training failed")?;
        }
        Err(_) => anyhow::bail!("training thread panicked"),
    }
    Ok(())
}

fn run_dashboard_ui(
    update_rx: mpsc::Receiver<TrainingUpdate>,
    cmd_tx: mpsc::Sender<TrainingCommand>,
    pause: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
    mut dashboard: DashboardState,
) -> Result<()> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal")?;

    let frame_duration = Duration::from_millis(100);

    loop {
        while let Ok(update) = update_rx.try_recv() {
            match update {
                TrainingUpdate::Metrics(snap) => {
                    dashboard.apply_metrics(&snap);
                }
                TrainingUpdate::LiveFrame(frame) => {
                    dashboard.apply_live_frame(&frame);
                }
                TrainingUpdate::EvalResult {
                    episode,
                    mean_reward,
                } => {
                    dashboard.apply_eval(episode, mean_reward);
                }
                TrainingUpdate::CheckpointSaved { episode, path } => {
                    dashboard.last_checkpoint =
                        Some(format!("ep {} ({})", episode, path.display()));
                }
                TrainingUpdate::Finished => {
                    dashboard.status = TrainingStatus::Finished;
                }
                TrainingUpdate::Failed(message) => {
                    dashboard.apply_failure(message);
                }
            }
        }

        terminal
            .draw(|f| training_view::render(f, &dashboard))
            .context("drawing dashboard")?;

        // After training finishes the charts stay up until the user quits.
        if event::poll(frame_duration).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => {
                        quit.store(true, Ordering::Relaxed);
                        break;
                    }
                    KeyCode::Char('p') | KeyCode::Char('P')
                        if !dashboard.is_done() =>
                    {
                        let was_paused = pause.load(Ordering::Relaxed);
                        pause.store(!was_paused, Ordering::Relaxed);
                        dashboard.status = if was_paused {
                            TrainingStatus::Running
                        } else {
                            TrainingStatus::Paused
                        };
                    }
                    KeyCode::Char('s') | KeyCode::Char('S') => {
                        let _ = cmd_tx.send(TrainingCommand::SaveCheckpoint);
                    }
                    _ => {}
                }
            }
        }
    }

    // Terminal cleanup; ignore errors to avoid a double panic
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
    Ok(())
}
