//! Shared serve entrypoint, used by the binary and the tests.

use crate::acceptor;
use crate::api;
use crate::config::CoordinatorConfig;
use crate::pipeline::Pipeline;
use crate::registry::Registry;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle returned by [`serve`]: bound addresses, shared state and the
/// shutdown triggers.
pub struct ServeHandle {
    /// Address agents connect to.
    pub agent_addr: SocketAddr,
    /// Address of the HTTP API.
    pub http_addr: SocketAddr,
    registry: Arc<Registry>,
    pipeline: Pipeline,
    accept_shutdown: Option<oneshot::Sender<()>>,
    acceptor: Option<JoinHandle<()>>,
    http_shutdown: Option<oneshot::Sender<()>>,
    http: Option<JoinHandle<Result<(), std::io::Error>>>,
    worker: Option<JoinHandle<()>>,
}

impl ServeHandle {
    /// Registered agents.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handle for submitting actions directly.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Stop accepting agents, close every agent connection, then stop the
    /// HTTP server and the pipeline worker.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.accept_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.acceptor.take() {
            join.await?;
        }

        let closed = self.registry.close_all();
        tracing::info!("closed {closed} agent connection(s)");

        if let Some(tx) = self.http_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.http.take() {
            join.await??;
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        Ok(())
    }
}

/// Load the config at `path`, or the defaults when it does not exist, and
/// start serving.
pub async fn serve(path: &Path) -> Result<ServeHandle> {
    let config = CoordinatorConfig::load_or_default(path)?;
    serve_with_config(&config).await
}

/// Bind both listeners and start the acceptor, the pipeline worker and
/// the HTTP server. Everything runs on spawned tasks; call
/// [`ServeHandle::shutdown`] to stop them.
pub async fn serve_with_config(config: &CoordinatorConfig) -> Result<ServeHandle> {
    let registry = Arc::new(Registry::new());

    let agent_listener = TcpListener::bind(&config.server.agent_address)
        .await
        .with_context(|| format!("failed to bind agent port {}", config.server.agent_address))?;
    let agent_addr = agent_listener.local_addr()?;
    let http_listener = TcpListener::bind(&config.server.http_address)
        .await
        .with_context(|| format!("failed to bind http port {}", config.server.http_address))?;
    let http_addr = http_listener.local_addr()?;

    let (pipeline, worker) = Pipeline::spawn(Arc::clone(&registry), &config.pipeline);
    let app = api::router(pipeline.clone(), &config.cors);

    let (accept_shutdown, accept_rx) = oneshot::channel();
    let acceptor = tokio::spawn(acceptor::accept_loop(
        agent_listener,
        Arc::clone(&registry),
        accept_rx,
    ));
    tracing::info!("listening for agents on {agent_addr}");

    let (http_shutdown, http_rx) = oneshot::channel();
    let http = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(async {
                let _ = http_rx.await;
                tracing::info!("http server shutting down");
            })
            .await
    });
    tracing::info!("http api listening on {http_addr}");

    Ok(ServeHandle {
        agent_addr,
        http_addr,
        registry,
        pipeline,
        accept_shutdown: Some(accept_shutdown),
        acceptor: Some(acceptor),
        http_shutdown: Some(http_shutdown),
        http: Some(http),
        worker: Some(worker),
    })
}
