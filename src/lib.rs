//! # repool
//!
//! Self-tuning, thread-safe object pool: lock-free borrowing plus a
//! background maintenance task that keeps the number of idle objects
//! within configured bounds.
//!
//! ## Features
//!
//! - Lock-free borrow/return over a bounded or unbounded MPMC queue
//! - On-demand creation through an injected factory when the pool runs dry
//! - Periodic background top-up and trim toward configured water marks
//! - Idempotent start/shutdown of the maintenance task
//! - Pluggable scheduling, with a deterministic scheduler for tests
//! - RAII guards that return objects automatically
//! - Activity metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use repool::{Pool, PoolConfig, PoolResult};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> PoolResult<()> {
//! let pool = Pool::new(
//!     || PoolResult::Ok(String::with_capacity(256)),
//!     PoolConfig::new(2, 8, Duration::from_secs(30)),
//! )?;
//!
//! let mut line = pool.borrow_object()?;
//! line.push_str("hello");
//! line.clear();
//! pool.return_object(line);
//!
//! pool.shutdown();
//! # Ok(())
//! # }
//! ```

mod config;
mod errors;
mod factory;
mod metrics;
mod pool;
mod queue;
mod scheduler;

pub use config::{DEFAULT_VALIDATION_INTERVAL, PoolConfig};
pub use errors::{PoolError, PoolResult};
pub use factory::ObjectFactory;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{Pool, PooledObject};
pub use queue::QueueStrategy;
pub use scheduler::{ManualScheduler, PeriodicTask, Scheduler, TaskHandle, TokioScheduler};
