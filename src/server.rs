use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    HealthResponse, HealthStatus, MessageResponse, UserPayload, UserRecord, NAMES_REQUIRED,
};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, put};
use axum::{Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;

const INDEX_HTML: &str = include_str!("../ui/index.html");

#[derive(Clone)]
pub struct AppState {
    db: Database,
}

pub fn create_router(db: Database) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", put(update_user).delete(delete_user))
        .layer(CorsLayer::permissive())
        .with_state(AppState { db })
}

pub async fn serve<F>(listener: tokio::net::TcpListener, db: Database, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(db))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Ok,
    })
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserRecord>>> {
    let db = state.db.clone();
    let users = run_blocking(move || db.list_users()).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<UserRecord>)> {
    let name = parse_payload(&body)?.into_name()?;
    let db = state.db.clone();
    let user = run_blocking(move || db.create_user(name)).await?;
    tracing::info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<UserRecord>> {
    let name = parse_payload(&body)?.into_name()?;
    let db = state.db.clone();
    let user = run_blocking(move || db.update_user(&id, name)).await?;
    tracing::info!(user_id = %user.id, "user updated");
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let db = state.db.clone();
    let deleted_id = id.clone();
    run_blocking(move || db.delete_user(&id)).await?;
    tracing::info!(user_id = %deleted_id, "user deleted");
    Ok(Json(MessageResponse {
        message: "Benutzer gelöscht".to_string(),
    }))
}

fn parse_payload(body: &[u8]) -> AppResult<UserPayload> {
    serde_json::from_slice::<UserPayload>(body)
        .map_err(|_| AppError::Validation(NAMES_REQUIRED.to_string()))
}

async fn run_blocking<T, F>(operation: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|error| AppError::Internal(format!("store task failed: {}", error)))?
}

pub struct ServerHandle {
    addr: SocketAddr,
    runtime: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Binds `host:port` on a new thread and returns once the listener is up
    /// or the bind has failed.
    pub fn start(db: Database, host: &str, port: u16) -> AppResult<Self> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(SocketAddr, Handle), String>>();
        let host = host.to_string();

        let thread = thread::Builder::new()
            .name("benutzerverwaltung-server".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(error) => {
                        let _ = ready_tx.send(Err(format!("failed to start runtime: {}", error)));
                        return;
                    }
                };

                let listener = match rt.block_on(tokio::net::TcpListener::bind((host.as_str(), port))) {
                    Ok(listener) => listener,
                    Err(error) => {
                        let _ = ready_tx.send(Err(format!(
                            "failed to bind {}:{}: {}",
                            host, port, error
                        )));
                        return;
                    }
                };
                let addr = match listener.local_addr() {
                    Ok(addr) => addr,
                    Err(error) => {
                        let _ = ready_tx.send(Err(format!("failed to read local address: {}", error)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((addr, rt.handle().clone())));

                let shutdown = async move {
                    let _ = shutdown_rx.await;
                };
                if let Err(error) = rt.block_on(serve(listener, db, shutdown)) {
                    tracing::error!(error = %error, "http server failed");
                }
                tracing::info!("http server stopped");
            })
            .map_err(|error| AppError::Internal(format!("failed to spawn server thread: {}", error)))?;

        match ready_rx.recv() {
            Ok(Ok((addr, runtime))) => {
                tracing::info!(%addr, "http server listening");
                Ok(Self {
                    addr,
                    runtime,
                    shutdown: Some(shutdown_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(AppError::Io(message))
            }
            Err(_) => {
                let _ = thread.join();
                Err(AppError::Internal(
                    "server thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn stop(mut self, grace: Duration) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(thread) = self.thread.take() else {
            return;
        };

        let deadline = Instant::now() + grace;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!("http server did not stop within grace period");
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        let _ = thread.join();
    }
}
