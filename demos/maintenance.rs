//! Background maintenance: watching top-up and trim happen on schedule

use repool::{Pool, PoolConfig, PoolResult};
use std::time::Duration;

#[tokio::main]
async fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== repool - Maintenance Demo ===\n");

    let pool = Pool::new(
        || PoolResult::Ok(Vec::<u8>::with_capacity(1024)),
        PoolConfig::new(2, 5, Duration::from_secs(1)),
    )?;
    println!("Pool created with min_idle=2, max_idle=5, interval=1s");
    println!("Idle after construction: {}", pool.size());

    // Drain the pool below the low-water mark.
    let first = pool.borrow_object()?;
    let second = pool.borrow_object()?;
    println!("Idle after borrowing 2: {}", pool.size());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    println!("Idle after one maintenance pass (topped up): {}", pool.size());

    // Push the idle set past the high-water mark.
    pool.return_object(first);
    pool.return_object(second);
    println!("Idle after returning 2: {}", pool.size());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    println!("Idle after one maintenance pass (trimmed): {}", pool.size());

    pool.shutdown();
    println!("\nMaintenance stopped; final metrics:");
    for (key, value) in pool.export_metrics() {
        println!("  {}: {}", key, value);
    }

    Ok(())
}
