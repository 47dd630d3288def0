//! Releasing connections during graceful shutdown.

use std::future::Future;

use tracing::{error, info};

/// Closes a SeaORM pool and logs the outcome.
pub async fn close_postgres(db: sea_orm::DatabaseConnection, name: &str) {
    match db.close().await {
        Ok(()) => info!(connection = name, "PostgreSQL connection closed"),
        Err(e) => error!(connection = name, error = %e, "Error closing PostgreSQL connection"),
    }
}

/// `ConnectionManager` has no explicit close; dropping the last clone
/// releases the socket.
pub async fn close_redis(redis: redis::aio::ConnectionManager, name: &str) {
    drop(redis);
    info!(connection = name, "Redis connection released");
}

/// Runs named cleanup tasks concurrently and waits for all of them.
///
/// ```ignore
/// let mut cleanup = CleanupCoordinator::new();
/// cleanup.add_task("postgres", close_postgres(db, "main"));
/// cleanup.add_task("redis", close_redis(redis, "main"));
/// cleanup.run().await;
/// ```
#[derive(Default)]
pub struct CleanupCoordinator {
    tasks: Vec<(&'static str, tokio::task::JoinHandle<()>)>,
}

impl CleanupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` immediately; [`run`](Self::run) awaits it.
    pub fn add_task<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// A panicking task is logged and does not stop the others.
    pub async fn run(self) {
        info!(tasks = self.tasks.len(), "Running cleanup tasks");

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => info!(task = name, "Cleanup task completed"),
                Err(e) => error!(task = name, error = %e, "Cleanup task failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_runs_every_task_even_after_a_panic() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut cleanup = CleanupCoordinator::new();

        let first = done.clone();
        cleanup.add_task("first", async move {
            first.fetch_add(1, Ordering::SeqCst);
        });
        cleanup.add_task("broken", async { panic!("boom") });
        let last = done.clone();
        cleanup.add_task("last", async move {
            last.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(cleanup.len(), 3);
        cleanup.run().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }
}
