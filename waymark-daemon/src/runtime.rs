use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use waymark_core::source::{FileSource, WaypointSource};
use waymark_core::{config, Config};
use waymark_renderer::{MarkerBuilder, TooltipEngine};
use waymark_sync::{
    ChangeDetector, LayerPublisher, MemorySurface, RecoveryReport, SurfaceRegistry, SyncScope,
    SyncSettings, Synchronizer, TickOutcome,
};

use crate::auth::OperatorPolicy;
use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, socket_path, waymark_root, DAEMON_LABEL, RESET_RECOVERY_DELAY};
use crate::protocol::{
    DaemonRequest, DaemonResponse, CMD_REFRESH, CMD_RELOAD_SURFACE, CMD_STATUS, CMD_STOP,
};
use crate::timer::RefreshTimer;

pub const REFRESH_STARTED: &str = "Refreshing waystone markers on the map...";
pub const REFRESH_DONE: &str = "Waystone markers refreshed successfully!";
pub const REFRESH_FAILED_PREFIX: &str = "Error refreshing markers";

struct SyncJob {
    scope: SyncScope,
    trigger: &'static str,
    respond_to: Option<oneshot::Sender<Result<SyncSummary, String>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub scope: String,
    pub trigger: String,
    pub partitions: usize,
    pub registered: usize,
    pub markers: usize,
    pub failures: Vec<String>,
    pub finished_at_unix: u64,
    pub duration_ms: u64,
}

impl SyncSummary {
    fn new(scope: SyncScope, trigger: &str, report: &RecoveryReport, duration: Duration) -> Self {
        Self {
            scope: match scope {
                SyncScope::All => "all".to_string(),
                SyncScope::Partition(id) => id.to_string(),
            },
            trigger: trigger.to_string(),
            partitions: report.recovered.len(),
            registered: report.registered(),
            markers: report.total_markers(),
            failures: report
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.world, f.error))
                .collect(),
            finished_at_unix: unix_seconds_now(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Everything the daemon tasks share.
pub(crate) struct DaemonContext {
    home: PathBuf,
    sync: Arc<Synchronizer>,
    surface: Arc<MemorySurface>,
    detector: Arc<ChangeDetector>,
    policy: OperatorPolicy,
    refresh_interval: Option<Duration>,
    started_at_unix: u64,
    last_sync: RwLock<Option<SyncSummary>>,
}

impl DaemonContext {
    fn new(
        home: &Path,
        config: &Config,
        source: Arc<dyn WaypointSource>,
        surface: Arc<MemorySurface>,
        builder: MarkerBuilder,
    ) -> Result<Self, DaemonError> {
        let registry: Arc<dyn SurfaceRegistry> = surface.clone();
        let sync = Synchronizer::new(
            Arc::clone(&source),
            registry,
            builder,
            SyncSettings::from(config),
        )?;
        Ok(Self {
            home: home.to_path_buf(),
            sync: Arc::new(sync),
            surface,
            detector: Arc::new(ChangeDetector::new(source)),
            policy: OperatorPolicy::from(&config.operator),
            refresh_interval: config.effective_refresh_interval(),
            started_at_unix: unix_seconds_now(),
            last_sync: RwLock::new(None),
        })
    }

    /// Wire the configured file source, surface and templates together.
    fn from_config(home: &Path, config: &Config) -> Result<Self, DaemonError> {
        let source: Arc<dyn WaypointSource> =
            Arc::new(FileSource::new(config.source_path_at(home)));

        let mut surface = MemorySurface::new(config.surface.worlds.clone());
        if let Some(dir) = config.publish_dir_at(home) {
            tracing::info!(dir = %dir.display(), "publishing layer snapshots");
            surface = surface.with_publisher(LayerPublisher::new(dir));
        }

        let engine = TooltipEngine::new(config.template_dir_at(home).as_deref())?;
        let builder = MarkerBuilder::new(engine, config.icon_size());
        Self::new(home, config, source, Arc::new(surface), builder)
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let config = config::load_at(&home)?;
    let ctx = Arc::new(DaemonContext::from_config(&home, &config)?);
    tracing::info!(
        worlds = config.surface.worlds.len(),
        source = %config.source_path_at(&home).display(),
        "waymark daemon starting"
    );

    let (job_tx, job_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let (reset_tx, reset_rx) = mpsc::unbounded_channel::<()>();
    ctx.surface.on_reset(move || {
        let _ = reset_tx.send(());
    });

    initial_sync(&ctx).await?;

    let mut timer = RefreshTimer::new(ctx.refresh_interval);
    {
        let detector = ctx.detector.clone();
        let job_tx = job_tx.clone();
        timer.start(move || check_for_changes(detector.clone(), job_tx.clone()));
    }

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(ctx, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let reset_handle = {
        let shutdown = shutdown_tx.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result =
                reset_listener_task(job_tx, reset_rx, shutdown.subscribe(), RESET_RECOVERY_DELAY)
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(ctx, job_tx, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (processor_result, reset_result, socket_result, signal_result) =
        tokio::join!(processor_handle, reset_handle, socket_handle, signal_handle);

    timer.stop();
    let sync = ctx.sync.clone();
    tokio::task::spawn_blocking(move || sync.shutdown())
        .await
        .map_err(|err| DaemonError::Protocol(format!("shutdown join error: {err}")))?;

    handle_join("sync_processor", processor_result)?;
    handle_join("reset_listener", reset_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("waymark daemon stopped");
    Ok(())
}

/// Initial full recovery, then prime the change detector with the snapshot
/// as it stands afterwards.
async fn initial_sync(ctx: &Arc<DaemonContext>) -> Result<(), DaemonError> {
    let started = Instant::now();
    let sync = ctx.sync.clone();
    let detector = ctx.detector.clone();
    let (report, primed) = tokio::task::spawn_blocking(move || {
        let report = sync.recover_all();
        (report, detector.prime())
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("initial sync join error: {err}")))?;

    match primed {
        Ok(fingerprint) => tracing::info!(%fingerprint, "change detector primed"),
        Err(err) => tracing::warn!(error = %err, "change detector not primed; first check will refresh"),
    }
    *ctx.last_sync.write().await = Some(SyncSummary::new(
        SyncScope::All,
        "startup",
        &report,
        started.elapsed(),
    ));
    Ok(())
}

/// One timer tick: fingerprint the source off the async workers and, when it
/// moved, run a full refresh through the job queue. The detector only commits
/// the new fingerprint once that refresh comes back clean, so a failed
/// refresh is retried on the next tick.
async fn check_for_changes(detector: Arc<ChangeDetector>, job_tx: mpsc::Sender<SyncJob>) {
    let outcome = tokio::task::spawn_blocking(move || {
        detector.tick(|| {
            let (respond_to, reply) = oneshot::channel();
            let job = SyncJob {
                scope: SyncScope::All,
                trigger: "detector",
                respond_to: Some(respond_to),
            };
            if job_tx.blocking_send(job).is_err() {
                tracing::warn!("sync queue closed; change-triggered refresh dropped");
                return false;
            }
            match reply.blocking_recv() {
                Ok(Ok(summary)) => summary.failures.is_empty(),
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "change-triggered refresh failed");
                    false
                }
                Err(_) => {
                    tracing::warn!("sync processor dropped change-triggered refresh");
                    false
                }
            }
        })
    })
    .await;

    match outcome {
        Ok(TickOutcome::Changed { current, .. }) => {
            tracing::debug!(fingerprint = %current, "change-triggered refresh committed");
        }
        Ok(TickOutcome::RefreshFailed { current, .. }) => {
            tracing::warn!(fingerprint = %current, "change-triggered refresh incomplete; will retry");
        }
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "change check task failed"),
    }
}

async fn sync_processor_task(
    ctx: Arc<DaemonContext>,
    mut job_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = execute_job(&ctx, job.scope, job.trigger).await;
                if let Some(respond_to) = job.respond_to {
                    let _ = respond_to.send(outcome);
                }
            }
        }
    }
    Ok(())
}

async fn execute_job(
    ctx: &Arc<DaemonContext>,
    scope: SyncScope,
    trigger: &'static str,
) -> Result<SyncSummary, String> {
    let started = Instant::now();
    let sync = ctx.sync.clone();
    let result = tokio::task::spawn_blocking(move || sync.run(scope))
        .await
        .map_err(|err| format!("sync task join error: {err}"))?;

    match result {
        Ok(report) => {
            let summary = SyncSummary::new(scope, trigger, &report, started.elapsed());
            tracing::info!(
                trigger,
                partitions = summary.partitions,
                registered = summary.registered,
                markers = summary.markers,
                failures = summary.failures.len(),
                duration_ms = summary.duration_ms,
                "sync completed",
            );
            *ctx.last_sync.write().await = Some(summary.clone());
            Ok(summary)
        }
        Err(err) => {
            tracing::warn!(trigger, error = %err, "sync failed");
            Err(err.to_string())
        }
    }
}

/// Wait `delay` after a reset, fold in any resets that arrived meanwhile,
/// then queue one full recovery.
async fn reset_listener_task(
    job_tx: mpsc::Sender<SyncJob>,
    mut reset_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    delay: Duration,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            signal = reset_rx.recv() => {
                if signal.is_none() {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                let mut coalesced = 0usize;
                while reset_rx.try_recv().is_ok() {
                    coalesced += 1;
                }
                tracing::info!(coalesced, "rendering surface was reset; recovering waystone layers");
                match enqueue_sync(&job_tx, SyncScope::All, "reset").await {
                    Ok(summary) => tracing::info!(
                        registered = summary.registered,
                        markers = summary.markers,
                        "waystone layers recovered after reset",
                    ),
                    Err(err) => tracing::error!(error = %err, "recovery after reset failed"),
                }
            }
        }
    }
    Ok(())
}

async fn socket_server_task(
    ctx: Arc<DaemonContext>,
    job_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&ctx.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for operator commands");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let ctx = ctx.clone();
                let job_tx = job_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(err) = handle_client(reader, writer, ctx, job_tx, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_client<R, W>(
    reader: R,
    mut writer: W,
    ctx: Arc<DaemonContext>,
    job_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            CMD_STATUS => DaemonResponse::ok(build_status_payload(&ctx).await),
            CMD_REFRESH => match authorized(&ctx, &request) {
                Err(denied) => denied,
                Ok(actor) => {
                    tracing::info!(actor, "operator refresh requested");
                    write_response(&mut writer, &DaemonResponse::progress(REFRESH_STARTED))
                        .await?;
                    refresh_response(enqueue_sync(&job_tx, SyncScope::All, "operator").await)
                }
            },
            CMD_RELOAD_SURFACE => match authorized(&ctx, &request) {
                Err(denied) => denied,
                Ok(actor) => {
                    tracing::info!(actor, "operator reloaded the rendering surface");
                    let surface = ctx.surface.clone();
                    tokio::task::spawn_blocking(move || surface.reset())
                        .await
                        .map_err(|err| DaemonError::Protocol(format!("surface reset join error: {err}")))?;
                    DaemonResponse::ok(json!({
                        "message": "Rendering surface reloaded; waystone layers will be recovered shortly."
                    }))
                }
            },
            CMD_STOP => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == CMD_STOP {
            break;
        }
    }

    Ok(())
}

fn authorized<'a>(
    ctx: &DaemonContext,
    request: &'a DaemonRequest,
) -> Result<&'a str, DaemonResponse> {
    ctx.policy
        .authorize(request.actor.as_deref())
        .map_err(|denied| {
            tracing::warn!(
                cmd = %request.cmd,
                actor = ?request.actor,
                permission = ctx.policy.permission(),
                "operator command denied",
            );
            DaemonResponse::error(denied)
        })
}

/// Completion line of an operator refresh. Any failed world makes the whole
/// refresh a failure.
fn refresh_response(outcome: Result<SyncSummary, DaemonError>) -> DaemonResponse {
    match outcome {
        Ok(summary) if summary.failures.is_empty() => DaemonResponse::ok(json!({
            "message": REFRESH_DONE,
            "summary": summary,
        })),
        Ok(summary) => DaemonResponse::error(format!(
            "{REFRESH_FAILED_PREFIX}: {}",
            summary.failures.join("; ")
        )),
        Err(err) => DaemonResponse::error(format!("{REFRESH_FAILED_PREFIX}: {err}")),
    }
}

async fn build_status_payload(ctx: &DaemonContext) -> Value {
    let owned = ctx.sync.owned_partitions();
    let worlds: Vec<Value> = ctx
        .surface
        .partitions()
        .into_iter()
        .map(|world| {
            json!({
                "id": world.id,
                "name": world.name,
                "layer": owned.contains(&world.id),
            })
        })
        .collect();
    let last_sync = ctx.last_sync.read().await.clone();

    json!({
        "running": true,
        "label": DAEMON_LABEL,
        "started_at_unix": ctx.started_at_unix,
        "socket": socket_path(&ctx.home).display().to_string(),
        "source": ctx.sync.source().capability().name,
        "auto_refresh_secs": ctx.refresh_interval.map(|d| d.as_secs()),
        "fingerprint": ctx.detector.previous().map(|f| f.to_string()),
        "worlds": worlds,
        "last_sync": last_sync,
    })
}

async fn enqueue_sync(
    job_tx: &mpsc::Sender<SyncJob>,
    scope: SyncScope,
    trigger: &'static str,
) -> Result<SyncSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(SyncJob {
            scope,
            trigger,
            respond_to: Some(tx),
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [waymark_root(home), run_dir(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global subscriber. `RUST_LOG` filters; `WAYMARK_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("WAYMARK_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
