//! Redis connection manager and health probe.

mod config;
mod connector;
mod health;

pub use config::RedisConfig;
pub use connector::{connect, connect_with_retry};
pub use health::check_health;

pub use redis::aio::ConnectionManager;
pub use redis::{AsyncCommands, RedisResult};
