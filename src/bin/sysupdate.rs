//! sysupdate - headless software update pane
//!
//! Drives the update session controller against a scripted package
//! backend and renders each view as text.
//!
//! # Usage
//!
//! ```bash
//! # Refresh sources and list available updates
//! sysupdate check
//!
//! # Check, then install every listed update
//! sysupdate upgrade
//!
//! # Install only some of them, replaying a custom backend script
//! sysupdate --scenario demo.toml upgrade --only write-activity=84
//! ```
//!
//! Ctrl-C requests cancellation of the running step; the backend decides
//! whether it can be cancelled right now.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sysupdate_backend::{Scenario, ScriptedService};
use sysupdate_core::view::SIZE_CALCULATING;
use sysupdate_core::{PackageId, ViewState};
use sysupdate_session::{spawn_controller, SessionConfig, SessionEvent, SessionHandle};

/// How long to wait for a download size once the update list is shown.
const SIZE_WAIT: Duration = Duration::from_secs(10);

/// Width of the text progress bar.
const BAR_WIDTH: usize = 30;

/// sysupdate - check for and install software updates
#[derive(Parser, Debug)]
#[command(name = "sysupdate", version, about)]
struct Args {
    /// Configuration file (default: $SYSUPDATE_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend scenario to replay instead of the built-in demo
    #[arg(short, long, global = true)]
    scenario: Option<PathBuf>,

    /// Print the final view and session state as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh sources and list available updates
    Check {
        /// Skip the metadata refresh
        #[arg(long)]
        no_refresh: bool,
    },
    /// Check for updates, then install them
    Upgrade {
        /// Install only these package ids (name=version)
        #[arg(long = "only", value_name = "ID")]
        only: Vec<PackageId>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let code = run(args)?;
    process::exit(code);
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sysupdate=warn".parse()?)
                .add_directive("sysupdate_session=warn".parse()?)
                .add_directive("sysupdate_backend=warn".parse()?)
                .add_directive("sysupdate_protocol=warn".parse()?)
                .add_directive("sysupdate_core=warn".parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn run(args: Args) -> Result<i32> {
    let config = SessionConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("Failed to load scenario {}", path.display()))?,
        None => Scenario::demo(),
    };

    info!(version = env!("CARGO_PKG_VERSION"), "sysupdate starting");

    let handle = spawn_controller(Arc::new(ScriptedService::new(scenario)), &config);
    let mut session = Session {
        events: handle.subscribe(),
        interrupts: spawn_interrupt_listener(),
        render: Render { json: args.json },
        handle,
    };

    if let Some(view) = session.handle.view().await {
        session.render.view(&view)?;
    }

    let command = args.command.unwrap_or(Command::Check { no_refresh: false });
    let view = match command {
        Command::Check { no_refresh } => session.check(!no_refresh).await?,
        Command::Upgrade { only } => session.upgrade(only).await?,
    };

    if args.json {
        let snapshot = session
            .handle
            .snapshot()
            .await
            .context("Session controller stopped")?;
        let out = serde_json::json!({ "view": view, "session": snapshot });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    Ok(match view {
        ViewState::ShowingError { .. } => 1,
        _ => 0,
    })
}

// ============================================================================
// Session Driver
// ============================================================================

struct Session {
    handle: SessionHandle,
    events: broadcast::Receiver<SessionEvent>,
    interrupts: mpsc::UnboundedReceiver<()>,
    render: Render,
}

impl Session {
    /// Runs a check and returns once the update list (with its size) or
    /// a final view is shown.
    async fn check(&mut self, refresh: bool) -> Result<ViewState> {
        if refresh {
            self.handle.refresh().await.context("Failed to start refresh")?;
        } else {
            self.handle.check().await.context("Failed to start check")?;
        }
        self.wait().await
    }

    async fn upgrade(&mut self, only: Vec<PackageId>) -> Result<ViewState> {
        let view = self.check(true).await?;
        let ViewState::ShowingUpdateList(_) = view else {
            return Ok(view);
        };

        if !only.is_empty() {
            self.handle.selection_changed(only).await?;
            // The narrowed list is rendered once below
            while self.events.try_recv().is_ok() {}

            let Some(view) = self.handle.view().await else {
                bail!("Session controller stopped");
            };
            self.render.view(&view)?;
            if !view.as_update_list().is_some_and(|l| l.can_install()) {
                warn!("None of the requested packages can be updated");
                return Ok(view);
            }
        }

        self.handle
            .install_selected()
            .await
            .context("Failed to start install")?;
        self.wait().await
    }

    /// Renders views until a final view, or an update list whose size is
    /// known, is shown. Interrupts are forwarded as cancel requests.
    async fn wait(&mut self) -> Result<ViewState> {
        let mut pending_list: Option<(ViewState, Instant)> = None;

        loop {
            let deadline = pending_list
                .as_ref()
                .map(|(_, at)| *at)
                .unwrap_or_else(Instant::now);

            tokio::select! {
                Some(()) = self.interrupts.recv() => {
                    if self.handle.cancel().await {
                        info!("Cancellation requested");
                    } else {
                        eprintln!("The current step cannot be cancelled");
                    }
                }
                _ = sleep_until(deadline), if pending_list.is_some() => {
                    if let Some((view, _)) = pending_list.take() {
                        warn!("Download size not reported in time");
                        return Ok(view);
                    }
                }
                event = self.events.recv() => match event {
                    Ok(SessionEvent::ViewChanged { view }) => {
                        let view = *view;
                        self.render.view(&view)?;
                        let sizing = view
                            .as_update_list()
                            .is_some_and(|l| l.total_size_label.as_deref() == Some(SIZE_CALCULATING));
                        if sizing {
                            pending_list = Some((view, Instant::now() + SIZE_WAIT));
                        } else if view.as_update_list().is_some() || view.is_settled() {
                            return Ok(view);
                        } else {
                            pending_list = None;
                        }
                    }
                    Ok(other) => debug!(?other, "Session event"),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Rendering fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        bail!("Session controller stopped");
                    }
                },
            }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

struct Render {
    json: bool,
}

impl Render {
    fn view(&self, view: &ViewState) -> Result<()> {
        if self.json {
            return Ok(());
        }

        let mut out = io::stdout().lock();
        match view {
            ViewState::ShowingProgress(progress) => {
                let filled = (progress.fraction * BAR_WIDTH as f64).round() as usize;
                let filled = filled.min(BAR_WIDTH);
                write!(
                    out,
                    "[{}{}] {:>3}% {}",
                    "#".repeat(filled),
                    ".".repeat(BAR_WIDTH - filled),
                    (progress.fraction * 100.0).round() as u32,
                    progress.message
                )?;
                if let Some(detail) = &progress.detail {
                    write!(out, "  {detail}")?;
                }
                if progress.cancellable {
                    write!(out, "  (Ctrl-C to cancel)")?;
                }
                writeln!(out)?;
            }
            ViewState::ShowingUpdateList(list) => {
                writeln!(out, "{}", view.headline())?;
                for record in &list.packages {
                    let mark = if record.selected { 'x' } else { ' ' };
                    writeln!(out, "  [{mark}] {} {}", record.name(), record.version())?;
                }
                if let Some(label) = &list.total_size_label {
                    writeln!(out, "Download size: {label}")?;
                }
            }
            other => {
                writeln!(out, "{}", other.headline())?;
                if let Some(hint) = other.hint() {
                    writeln!(out, "{hint}")?;
                }
            }
        }
        out.flush()?;
        Ok(())
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Forwards every SIGINT/SIGTERM (Ctrl-C elsewhere) as one message.
fn spawn_interrupt_listener() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            if let Err(e) = wait_for_interrupt().await {
                error!(error = %e, "Error waiting for interrupt signal");
                return;
            }
            if tx.send(()).is_err() {
                return;
            }
        }
    });
    rx
}

async fn wait_for_interrupt() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
