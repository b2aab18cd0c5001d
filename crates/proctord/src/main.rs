//! proctord - The proctoring background service
//!
//! This is the main entry point for the proctord service.
//! It wires together all the components:
//! - Configuration loading
//! - Audit store and termination log
//! - Core engine (session registry)
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use proctor_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Request,
    Response, ResponsePayload, API_VERSION,
};
use proctor_config::load_config_or_default;
use proctor_core::{CoreEvent, ProctorEngine};
use proctor_ipc::{IpcServer, ServerMessage};
use proctor_store::{
    AuditEvent, AuditEventType, FileTerminationLog, SqliteStore, Store, TerminationSink,
};
use proctor_util::{default_config_path, ClientId, ProctorError, RateLimiter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Requests allowed per second in each bucket. A client has one bucket for
/// control commands and one per session it submits frames to, so every 30 fps
/// feed gets this budget on its own.
const REQUESTS_PER_SECOND: u32 = 60;

/// proctord - Real-time proctoring violation service
#[derive(Parser, Debug)]
#[command(name = "proctord")]
#[command(about = "Real-time proctoring violation and termination service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/proctord/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set PROCTOR_SOCKET env var)
    #[arg(short, long, env = "PROCTOR_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set PROCTOR_DATA_DIR env var)
    #[arg(short, long, env = "PROCTOR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Termination log directory override
    #[arg(long, env = "PROCTOR_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

/// Main service state
struct Service {
    engine: ProctorEngine,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            target_labels = ?policy.objects.target_labels,
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.daemon.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.daemon.data_dir.clone());

        let log_dir = args
            .log_dir
            .clone()
            .unwrap_or_else(|| policy.daemon.log_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("proctord.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        let termination_log = FileTerminationLog::open(&log_dir)
            .with_context(|| format!("Failed to open termination log in {:?}", log_dir))?;

        info!(
            csv = %termination_log.csv_path().display(),
            jsonl = %termination_log.jsonl_path().display(),
            "Termination log ready"
        );

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let sink: Arc<dyn TerminationSink> = Arc::new(termination_log);
        let engine = ProctorEngine::new(policy, store.clone(), sink)
            .context("Failed to initialize proctor engine")?;

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let rate_limiter = RateLimiter::new(REQUESTS_PER_SECOND, Duration::from_secs(1));

        Ok(Self {
            engine,
            ipc: Arc::new(ipc),
            store,
            rate_limiter,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let engine = Arc::new(Mutex::new(self.engine));
        let rate_limiter = Arc::new(Mutex::new(self.rate_limiter));
        let store = self.store.clone();

        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                msg = ipc_messages.recv() => {
                    let Some(msg) = msg else {
                        warn!("IPC message channel closed");
                        break;
                    };
                    handle_ipc_message(&engine, &ipc_ref, &store, &rate_limiter, msg).await;
                }
            }
        }

        info!("Shutting down proctord");

        {
            let engine = engine.lock().await;
            let live = engine.session_count();
            if live > 0 {
                info!(sessions = live, "Discarding live sessions");
            }
        }

        ipc_ref.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        ipc_ref.shutdown();

        info!("Shutdown complete");
        Ok(())
    }
}

async fn handle_ipc_message(
    engine: &Arc<Mutex<ProctorEngine>>,
    ipc: &Arc<IpcServer>,
    store: &Arc<dyn Store>,
    rate_limiter: &Arc<Mutex<RateLimiter>>,
    msg: ServerMessage,
) {
    match msg {
        ServerMessage::Request { client_id, request } => {
            {
                let mut limiter = rate_limiter.lock().await;
                if !admit(&mut limiter, &client_id, &request.command) {
                    let response = error_response(request.request_id, &ProctorError::RateLimited);
                    if let Err(e) = ipc.send_response(&client_id, response).await {
                        debug!(client_id = %client_id, error = %e, "Failed to send response");
                    }
                    return;
                }
            }

            let role = ipc
                .get_client_info(&client_id)
                .await
                .map(|info| info.role)
                .unwrap_or(ClientRole::Observer);

            let stopped = match &request.command {
                Command::StopSession { session_id } => Some(session_id.clone()),
                _ => None,
            };

            let response = handle_request(engine, ipc, role, &client_id, request).await;

            if let Some(session_id) = stopped {
                rate_limiter.lock().await.remove_session(&session_id);
            }

            if let Err(e) = ipc.send_response(&client_id, response).await {
                debug!(client_id = %client_id, error = %e, "Failed to send response");
            }
        }

        ServerMessage::ClientConnected { client_id, info } => {
            info!(
                client_id = %client_id,
                role = ?info.role,
                uid = ?info.uid,
                "Client connected"
            );

            if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                client_id: client_id.to_string(),
                role: format!("{:?}", info.role),
                uid: info.uid,
            })) {
                warn!(error = %e, "Failed to audit client connection");
            }
        }

        ServerMessage::ClientDisconnected { client_id } => {
            debug!(client_id = %client_id, "Client disconnected");

            if let Err(e) = store.append_audit(AuditEvent::new(
                AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                },
            )) {
                warn!(error = %e, "Failed to audit client disconnection");
            }

            let mut limiter = rate_limiter.lock().await;
            limiter.remove_client(&client_id);
        }
    }
}

/// Frames draw from the per-session feed bucket, everything else from the
/// client's control bucket
fn admit(limiter: &mut RateLimiter, client_id: &ClientId, command: &Command) -> bool {
    match command {
        Command::SubmitFrame { session_id, .. } => limiter.check_feed(client_id, session_id),
        _ => limiter.check(client_id),
    }
}

/// Check version and permissions, then dispatch the command
async fn handle_request(
    engine: &Arc<Mutex<ProctorEngine>>,
    ipc: &Arc<IpcServer>,
    role: ClientRole,
    client_id: &ClientId,
    request: Request,
) -> Response {
    let request_id = request.request_id;

    if request.api_version != API_VERSION {
        return Response::error(
            request_id,
            ErrorInfo::new(
                ErrorCode::InvalidRequest,
                format!(
                    "Unsupported API version {} (expected {})",
                    request.api_version, API_VERSION
                ),
            ),
        );
    }

    if request.command.is_mutating() && !role.can_control_sessions() {
        warn!(client_id = %client_id, role = ?role, "Rejected mutating command");
        return Response::error(
            request_id,
            ErrorInfo::new(ErrorCode::PermissionDenied, "Operator role required"),
        );
    }

    handle_command(engine, ipc, client_id, request_id, request.command).await
}

async fn handle_command(
    engine: &Arc<Mutex<ProctorEngine>>,
    ipc: &Arc<IpcServer>,
    client_id: &ClientId,
    request_id: u64,
    command: Command,
) -> Response {
    match command {
        Command::StartSession { session_id } => {
            let now = proctor_util::now();
            let result = {
                let mut engine = engine.lock().await;
                engine
                    .start_session(session_id.clone(), now)
                    .and_then(|event| Ok((event, engine.status(&session_id)?)))
            };

            match result {
                Ok((event, status)) => {
                    broadcast_core_event(ipc, event);
                    Response::success(request_id, ResponsePayload::SessionStarted(status))
                }
                Err(e) => error_response(request_id, &e),
            }
        }

        Command::SubmitFrame { session_id, frame } => {
            let result = engine.lock().await.submit_frame(&session_id, &frame);

            match result {
                Ok(outcome) => {
                    for event in outcome.events {
                        broadcast_core_event(ipc, event);
                    }
                    Response::success(request_id, ResponsePayload::Frame(outcome.result))
                }
                Err(e) => {
                    debug!(session_id = %session_id, error = %e, "Frame rejected");
                    error_response(request_id, &e)
                }
            }
        }

        Command::GetStatus { session_id } => match engine.lock().await.status(&session_id) {
            Ok(status) => Response::success(request_id, ResponsePayload::Status(status)),
            Err(e) => error_response(request_id, &e),
        },

        Command::StopSession { session_id } => {
            let event = engine.lock().await.stop_session(&session_id);
            let existed = event.is_some();
            if let Some(event) = event {
                broadcast_core_event(ipc, event);
            }
            Response::success(
                request_id,
                ResponsePayload::Stopped {
                    session_id,
                    existed,
                },
            )
        }

        Command::ListSessions => {
            let sessions = engine.lock().await.list_sessions();
            Response::success(request_id, ResponsePayload::Sessions(sessions))
        }

        Command::SubscribeEvents => Response::success(
            request_id,
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },
        ),

        Command::UnsubscribeEvents => Response::success(request_id, ResponsePayload::Unsubscribed),

        Command::GetHealth => {
            let engine = engine.lock().await;
            let store_ok = engine.store_healthy();
            let health = HealthStatus {
                live: true,
                ready: store_ok,
                store_ok,
                active_sessions: engine.session_count(),
            };
            Response::success(request_id, ResponsePayload::Health(health))
        }

        Command::Ping => Response::success(request_id, ResponsePayload::Pong),
    }
}

fn event_payload(event: CoreEvent) -> EventPayload {
    match event {
        CoreEvent::SessionStarted { session_id, .. } => EventPayload::SessionStarted { session_id },
        CoreEvent::EnrollmentLocked { session_id } => EventPayload::EnrollmentLocked { session_id },
        CoreEvent::ViolationCounted {
            session_id,
            kind,
            count,
        } => EventPayload::ViolationCounted {
            session_id,
            kind,
            count,
        },
        CoreEvent::SessionTerminated { session_id, event } => {
            EventPayload::SessionTerminated { session_id, event }
        }
        CoreEvent::SessionStopped { session_id } => EventPayload::SessionStopped { session_id },
    }
}

fn broadcast_core_event(ipc: &IpcServer, event: CoreEvent) {
    ipc.broadcast_event(Event::new(event_payload(event)));
}

fn error_code(error: &ProctorError) -> ErrorCode {
    match error {
        ProctorError::SessionNotFound(_) => ErrorCode::SessionNotFound,
        ProctorError::SessionTerminated(_) => ErrorCode::SessionTerminated,
        ProctorError::OutOfOrderFrame { .. } => ErrorCode::OutOfOrderFrame,
        ProctorError::RateLimited => ErrorCode::RateLimited,
        ProctorError::ConfigError(_)
        | ProctorError::StoreError(_)
        | ProctorError::IpcError(_)
        | ProctorError::Internal(_) => ErrorCode::InternalError,
    }
}

fn error_response(request_id: u64, error: &ProctorError) -> Response {
    Response::error(request_id, ErrorInfo::new(error_code(error), error.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "proctord starting"
    );

    let service = Service::new(&args).await?;
    service.run().await
}
