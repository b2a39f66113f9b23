//! Ownership of background workers and cooperative shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default time a worker gets to finish after cancellation.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Tracks every long-running task of the process.
///
/// Workers receive a child of the supervisor's [`CancellationToken`] and are
/// expected to return once it is cancelled. [`Supervisor::shutdown`] cancels
/// the token and then awaits each worker in spawn order.
#[derive(Debug)]
pub struct Supervisor {
    token: CancellationToken,
    workers: Vec<(String, JoinHandle<()>)>,
    grace: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            workers: Vec::new(),
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Token that is cancelled when shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn `make(token)` on the runtime and track it under `name`.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, make: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(make(self.token.child_token()));
        log::debug!("Started worker {}", name);
        self.workers.push((name, handle));
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Cancel every worker and wait for them to finish.
    ///
    /// A worker that panicked is logged; one that overruns the grace period
    /// is aborted.
    pub async fn shutdown(mut self) {
        log::info!("Shutting down {} worker(s)", self.workers.len());
        self.token.cancel();

        for (name, mut handle) in self.workers.drain(..) {
            match tokio::time::timeout(self.grace, &mut handle).await {
                Ok(Ok(())) => log::debug!("Worker {} stopped", name),
                Ok(Err(e)) if e.is_panic() => log::error!("Worker {} panicked: {}", name, e),
                Ok(Err(e)) => log::warn!("Worker {} was cancelled: {}", name, e),
                Err(_) => {
                    log::warn!("Worker {} did not stop within {:?}, aborting", name, self.grace);
                    handle.abort();
                }
            }
        }
    }
}
