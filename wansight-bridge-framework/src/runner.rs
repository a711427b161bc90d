//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;

use wansight_common::connect;

use crate::BridgeArgs;
use crate::availability::Availability;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::ZenohSink;
use crate::reporter::Reporter;
use crate::sink::{LogSink, Sink};

/// Time given to the transport to flush the final retained messages.
const SHUTDOWN_FLUSH: Duration = Duration::from_millis(500);

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Zenoh connection (or a logging sink for dry runs)
/// - Task spawning and management
/// - Shutdown on Ctrl+C or SIGTERM
/// - Final `offline` availability announcement
///
/// # Example
///
/// ```ignore
/// use wansight_bridge_framework::{BridgeArgs, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut runner = BridgeRunner::connect("mybridge", &config, &args).await?;
///
///     let reporter = runner.reporter();
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await
/// }
/// ```
pub struct BridgeRunner {
    /// Bridge name for logging.
    name: String,
    /// Zenoh sink, absent for dry runs and injected sinks.
    zenoh: Option<Arc<ZenohSink>>,
    /// Sink shared by all workers.
    sink: Arc<dyn Sink>,
    /// Availability announcer used on shutdown.
    availability: Option<Availability>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeRunner {
    /// Create a runner connected to the bus described by `config`.
    ///
    /// With `--dry-run` no connection is made and publications are logged.
    /// Tracing must already be initialised.
    pub async fn connect<C: BridgeConfig>(
        name: impl Into<String>,
        config: &C,
        args: &BridgeArgs,
    ) -> Result<Self> {
        let name = name.into();

        if args.dry_run {
            tracing::info!(bridge = %name, "Dry run, publications will only be logged");
            return Ok(Self::with_sink(name, Arc::new(LogSink)));
        }

        let session = connect(&config.zenoh())
            .await
            .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?;

        let zenoh = Arc::new(ZenohSink::new(Arc::new(session)));
        let mut runner = Self::with_sink(name, zenoh.clone());
        runner.zenoh = Some(zenoh);
        Ok(runner)
    }

    /// Create a runner publishing to an arbitrary sink.
    pub fn with_sink(name: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        let name = name.into();
        tracing::info!(bridge = %name, version = env!("CARGO_PKG_VERSION"), "Starting bridge");

        Self {
            name,
            zenoh: None,
            sink,
            availability: None,
            tasks: Vec::new(),
        }
    }

    /// Announce `offline` on these topics when shutting down.
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = Some(availability);
        self
    }

    /// Get a reporter publishing to the runner's sink.
    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.sink.clone())
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the bridge until `shutdown` completes.
    ///
    /// This will:
    /// 1. Wait for the shutdown future
    /// 2. Abort all spawned tasks and wait for them to stop
    /// 3. Publish `offline` availability (if configured)
    /// 4. Close the Zenoh session
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        shutdown.await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }
        // No worker publish may land after the offline announcement.
        for task in self.tasks.drain(..) {
            match task.await {
                Err(e) if !e.is_cancelled() => {
                    tracing::warn!(bridge = %self.name, error = %e, "Worker task failed");
                }
                _ => {}
            }
        }

        if let Some(availability) = &self.availability {
            let stats = availability.announce_offline().await;
            if stats.failed > 0 {
                tracing::warn!(failed = stats.failed, "Some offline announcements were lost");
            }
        }

        if let Some(zenoh) = &self.zenoh {
            tokio::time::sleep(SHUTDOWN_FLUSH).await;
            zenoh.release().await;
            if let Err(e) = zenoh.session().close().await {
                tracing::warn!(error = %e, "Error closing Zenoh session");
            }
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Resolves on Ctrl+C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn test_run_until_announces_offline() {
        let sink = Arc::new(MemorySink::new());
        let runner = BridgeRunner::with_sink("test", sink.clone());
        let availability = Availability::new(
            runner.reporter(),
            vec!["r/wan/availability".to_string(), "r/mwan3/availability".to_string()],
        );
        let runner = runner.with_availability(availability);

        runner.run_until(async {}).await.unwrap();

        let offline = sink.publications();
        assert_eq!(offline.len(), 2);
        assert!(offline.iter().all(|p| p.payload == "offline" && p.retain));
    }

    #[tokio::test]
    async fn test_run_until_aborts_workers() {
        let sink = Arc::new(MemorySink::new());
        let mut runner = BridgeRunner::with_sink("test", sink.clone());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        runner.spawn(async move {
            let _guard = tx;
            std::future::pending::<()>().await;
        });

        runner.run_until(async {}).await.unwrap();

        // The worker owned the sender; aborting it drops the sender.
        assert!(rx.await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_offline_lands_after_worker_publishes() {
        let sink = Arc::new(MemorySink::new());
        let mut runner = BridgeRunner::with_sink("test", sink.clone());
        let topic = "r/wan/availability";
        let availability = Availability::new(runner.reporter(), vec![topic.to_string()]);

        let reporter = runner.reporter();
        runner.spawn(async move {
            loop {
                reporter.publish(topic, "online", true).await;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        let runner = runner.with_availability(availability);

        runner
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();

        let publications = sink.publications();
        assert!(publications.iter().any(|p| p.payload == "online"));
        assert_eq!(publications.last().map(|p| p.payload.as_str()), Some("offline"));

        // Nothing is still publishing once the runner has returned.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.publications().len(), publications.len());
    }
}
