//! floatwatchd - host bridge daemon for floatwatch
//!
//! Responsibilities:
//! - Own all decision state (classifier mode, debounce guard, overlay state
//!   machine) behind one serialized dispatcher lane
//! - Read host callbacks as JSON lines on stdin (screen snapshots,
//!   notification postings, user actions, grant state)
//! - Emit overlay operations, grant requests, commit hand-offs, and toasts
//!   as JSON lines on stdout

mod bridge;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bridge::{
    apply_field_edit, BridgeEvent, BridgeNotice, BridgeProbe, BridgeSink, BridgeSurface,
    NoticeSender,
};
use floatwatch_core::{
    ControllerEvent, Dispatcher, DispatcherOptions, OverlayController, SettingsStore,
    DEFAULT_COOLDOWN_MS,
};

#[derive(Parser, Debug)]
#[command(name = "floatwatchd", about = "Transaction detection daemon")]
struct Args {
    /// Settings file (diagnostic mode, per-channel toggles)
    #[arg(long, default_value = "floatwatch.yaml")]
    settings: PathBuf,

    /// Directory for rolling log files; stderr only when absent
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Cooldown between accepted overlay triggers, in milliseconds
    #[arg(long, default_value_t = DEFAULT_COOLDOWN_MS)]
    cooldown_ms: i64,

    /// This application's package identifier (self-notifications dropped)
    #[arg(long, default_value = "com.floatisland.app")]
    own_package: String,
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_env("FLOATWATCH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn init_logging(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "floatwatchd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(log_filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(log_filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    }
}

/// Drain notices to stdout, one JSON object per line.
async fn run_notice_writer(mut rx: mpsc::UnboundedReceiver<BridgeNotice>) {
    let mut stdout = tokio::io::stdout();
    while let Some(notice) = rx.recv().await {
        let line = match serde_json::to_string(&notice) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to encode notice");
                continue;
            }
        };
        if stdout.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if stdout.write_all(b"\n").await.is_err() {
            break;
        }
        let _ = stdout.flush().await;
    }
}

/// Map controller transitions to the transient toasts the host shows.
async fn run_toast_relay(
    mut events: tokio::sync::broadcast::Receiver<ControllerEvent>,
    notices: NoticeSender,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "toast relay lagged");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };
        let message = match event {
            ControllerEvent::Shown { .. } => Some("悬浮窗已开启".to_string()),
            ControllerEvent::Updated { .. } | ControllerEvent::AlreadyCurrent => {
                Some("内容已更新".to_string())
            }
            ControllerEvent::PermissionRequested => {
                Some("请开启[显示在其他应用上层]权限".to_string())
            }
            ControllerEvent::HandOffFailed(_) => Some("无法启动应用".to_string()),
            ControllerEvent::SurfaceError(e) => Some(format!("显示失败: {}", e)),
            ControllerEvent::Dismissed | ControllerEvent::Committed(_) => None,
        };
        if let Some(message) = message {
            let _ = notices.send(BridgeNotice::Toast { message });
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_ref());

    info!(
        settings = ?args.settings,
        cooldown_ms = args.cooldown_ms,
        "floatwatchd starting"
    );

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(run_notice_writer(notice_rx));

    let (surface, fields) = BridgeSurface::new(notice_tx.clone());
    let (probe, overlay_granted) = BridgeProbe::new(notice_tx.clone());
    let sink = BridgeSink::new(notice_tx.clone());

    let controller =
        OverlayController::new(Box::new(surface), Arc::new(probe), Arc::new(sink));
    let toasts = tokio::spawn(run_toast_relay(controller.subscribe(), notice_tx.clone()));

    let (handle, lane) = Dispatcher::spawn(
        SettingsStore::new(&args.settings),
        controller,
        DispatcherOptions {
            own_package: args.own_package.clone(),
            cooldown_ms: args.cooldown_ms,
            ..Default::default()
        },
    );

    // Host bridge ingestion. EOF means the host went away; drain and stop.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: BridgeEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "unparseable bridge event, skipping");
                continue;
            }
        };
        match event {
            BridgeEvent::Screen { package, root } => {
                handle.screen_snapshot(package, root).await;
            }
            BridgeEvent::Notification(posting) => {
                handle.notification(posting).await;
            }
            BridgeEvent::FieldEdit {
                amount,
                description,
            } => {
                apply_field_edit(&fields, amount.as_deref(), description.as_deref());
            }
            BridgeEvent::Commit => handle.commit().await,
            BridgeEvent::Dismiss => handle.dismiss().await,
            BridgeEvent::Permission { overlay_granted: g } => {
                debug!(granted = g, "overlay grant state updated");
                overlay_granted.store(g, Ordering::SeqCst);
            }
        }
    }

    info!("stdin closed, shutting down");
    drop(handle);
    lane.await?;
    toasts.await?;
    drop(notice_tx);
    writer.await?;
    info!("floatwatchd stopped");
    Ok(())
}
