use std::time::Instant;

use redis::aio::ConnectionManager;
use tracing::debug;

use crate::common::DatabaseError;

/// `PING` must answer `PONG`. Returns the round trip in milliseconds.
pub async fn check_health(conn: &mut ConnectionManager) -> Result<u64, DatabaseError> {
    let started = Instant::now();
    let response: String = redis::cmd("PING")
        .query_async(conn)
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(format!("Redis: {}", e)))?;

    if response != "PONG" {
        return Err(DatabaseError::HealthCheckFailed(format!(
            "Redis PING returned unexpected response: {}",
            response
        )));
    }

    let elapsed = started.elapsed().as_millis() as u64;
    debug!(elapsed_ms = elapsed, "Redis health check passed");
    Ok(elapsed)
}
