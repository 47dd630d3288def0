//! Redis container for idempotency and connection tests.

use redis::Client;
use redis::aio::ConnectionManager;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// A throwaway Redis 8 instance; the container stops when this is dropped.
///
/// ```no_run
/// use test_utils::TestRedis;
///
/// # async fn example() {
/// let redis = TestRedis::new().await;
/// let conn = redis.connection_manager().await;
/// // hand `conn` to a RedisIdempotencyStore
/// # }
/// ```
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    url: String,
}

impl TestRedis {
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");
        let url = format!("redis://127.0.0.1:{}", port);

        tracing::info!(port, "Test Redis ready");

        Self {
            _container: container,
            url,
        }
    }

    /// A fresh reconnecting connection, the same kind `database::redis::connect` returns
    pub async fn connection_manager(&self) -> ConnectionManager {
        let client = Client::open(self.url.as_str()).expect("Failed to create Redis client");
        ConnectionManager::new(client)
            .await
            .expect("Failed to create Redis connection manager")
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
