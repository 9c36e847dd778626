//! `run` command handler
//!
//! Starts the orchestrator and its monitor thread against the simulated
//! hardware and serves console commands from stdin until EOF, `quit`, or
//! a shutdown signal.

use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::cli::console::{self, ConsoleCommand};
use crate::config::{ConfigLoader, LoadedConfig, config_path};
use crate::error::TriggerError;
use crate::hardware::SimHardware;
use crate::observability::{Event, EventEmitter, EventPublisher};
use crate::trigger::{IntervalTicker, LoggingCapture, Monitor, Orchestrator, Ticker};

/// Interval ticker that ends the loop once `cancel` fires.
struct CancellableTicker {
    inner: IntervalTicker,
    cancel: CancellationToken,
}

impl Ticker for CancellableTicker {
    fn tick(&mut self) -> bool {
        self.inner.tick() && !self.cancel.is_cancelled()
    }
}

/// Runs the orchestrator.
///
/// # Errors
///
/// Returns an error if the configuration fails to load, the metrics
/// endpoint or event file cannot be opened, or the monitor thread cannot
/// be spawned.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), TriggerError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let path = config_path(args.config.as_deref());
    let config = match &path {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading configuration");
            let load_result = ConfigLoader::default().load(path)?;
            for warning in &load_result.warnings {
                tracing::warn!(
                    location = warning.location.as_deref().unwrap_or("<unknown>"),
                    "{}",
                    warning.message
                );
            }
            load_result.config
        }
        None => LoadedConfig::default(),
    };

    let emitter = Arc::new(if args.no_events {
        EventEmitter::noop()
    } else if let Some(path) = &args.events_file {
        EventEmitter::from_file(path)?
    } else {
        EventEmitter::stderr()
    });

    emitter.emit(Event::Started {
        timestamp: Utc::now(),
        hardware: "sim".to_owned(),
        config: path.as_ref().map(|p| p.display().to_string()),
    });

    let orchestrator = Arc::new(Orchestrator::new(
        SimHardware::with_capture_polls(args.capture_polls),
        Arc::new(LoggingCapture),
        Arc::new(EventPublisher::new(Arc::clone(&emitter))),
    ));
    orchestrator.apply_settings(&config.settings);

    let monitor = Monitor::new(Arc::clone(&orchestrator), config.input_poll_ticks);
    let handle = monitor.spawn(CancellableTicker {
        inner: IntervalTicker::new(config.interval),
        cancel: cancel.clone(),
    })?;

    tracing::info!(interval = ?config.interval, "trigger orchestrator running");

    let reason = serve_console(&orchestrator, &cancel).await;

    cancel.cancel();
    let joined = tokio::task::spawn_blocking(move || handle.join()).await;
    if !matches!(joined, Ok(Ok(()))) {
        tracing::error!("monitor thread panicked");
    }

    emitter.emit(Event::Stopped {
        timestamp: Utc::now(),
        reason: reason.to_owned(),
    });
    Ok(())
}

/// Reads and executes console commands. Returns the stop reason.
async fn serve_console(
    orchestrator: &Arc<Orchestrator<SimHardware>>,
    cancel: &CancellationToken,
) -> &'static str {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => return "signal",
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return "end of input",
            Err(e) => {
                tracing::error!(error = %e, "failed to read console input");
                return "console error";
            }
        };

        match console::parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => return "quit",
            Ok(Some(command)) => match execute_blocking(command, orchestrator).await {
                Ok(Ok(Some(output))) => println!("{output}"),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => eprintln!("error: {e}"),
                Err(e) => {
                    tracing::error!(error = %e, "console command panicked");
                    return "console error";
                }
            },
            Err(e) => eprintln!("error: {e}"),
        }
    }
}

/// Runs one console command on the blocking pool.
///
/// Commands hold the orchestrator lock for the duration of their hardware
/// access.
async fn execute_blocking(
    command: ConsoleCommand,
    orchestrator: &Arc<Orchestrator<SimHardware>>,
) -> Result<Result<Option<String>, TriggerError>, JoinError> {
    let orchestrator = Arc::clone(orchestrator);
    tokio::task::spawn_blocking(move || console::execute(&command, &orchestrator)).await
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::trigger::CaptureTargetId;

    fn orchestrator() -> Arc<Orchestrator<SimHardware>> {
        Arc::new(Orchestrator::new(
            SimHardware::new(),
            Arc::new(LoggingCapture),
            Arc::new(EventPublisher::new(Arc::new(EventEmitter::noop()))),
        ))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn command_waits_for_lock_off_runtime_thread() {
        let orchestrator = orchestrator();
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = Arc::clone(&orchestrator);
        let holder = std::thread::spawn(move || {
            holder.with_hardware(|_| {
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            });
        });
        held_rx.recv().unwrap();

        let pending = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                execute_blocking(ConsoleCommand::Arm(CaptureTargetId::Buf), &orchestrator).await
            })
        };
        // the runtime keeps running timers while the command is blocked
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        release_tx.send(()).unwrap();
        let output = pending.await.unwrap().unwrap().unwrap().unwrap();
        assert!(output.starts_with("Fired"));
        holder.join().unwrap();
        assert!(orchestrator.snapshot().buf.armed);
    }
}
