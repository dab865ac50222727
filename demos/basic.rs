//! Basic usage: borrowing, returning, guards, and metrics

use repool::{Pool, PoolConfig, PoolResult, QueueStrategy};
use std::time::Duration;

#[tokio::main]
async fn main() -> PoolResult<()> {
    println!("=== repool - Basic Examples ===\n");

    borrow_and_return()?;
    raii_guard()?;
    queue_strategies()?;
    metrics()?;

    Ok(())
}

fn buffer_factory() -> PoolResult<Vec<u8>> {
    Ok(Vec::with_capacity(4096))
}

fn borrow_and_return() -> PoolResult<()> {
    println!("1. Borrow and return:");
    let pool = Pool::new(buffer_factory, PoolConfig::new(2, 8, Duration::from_secs(30)))?;

    let buffer = pool.borrow_object()?;
    println!("   Borrowed a buffer with capacity {}", buffer.capacity());
    println!("   Idle while borrowed: {}", pool.size());

    pool.return_object(buffer);
    println!("   Idle after return: {}\n", pool.size());
    Ok(())
}

fn raii_guard() -> PoolResult<()> {
    println!("2. RAII guard:");
    let pool = Pool::new(buffer_factory, PoolConfig::new(1, 4, Duration::from_secs(30)))?;

    {
        let mut buffer = pool.checkout()?;
        buffer.extend_from_slice(b"scratch data");
        println!("   Guard holds {} bytes", buffer.len());
        // Returned automatically when the guard drops
    }

    println!("   Idle after guard drop: {}\n", pool.size());
    Ok(())
}

fn queue_strategies() -> PoolResult<()> {
    println!("3. Queue strategies:");

    let bounded = Pool::new(
        buffer_factory,
        PoolConfig::new(2, 8, Duration::from_secs(30)),
    )?;
    println!("   Bounded array queue (default), idle: {}", bounded.size());

    let unbounded = Pool::new(
        buffer_factory,
        PoolConfig::new(2, 8, Duration::from_secs(30))
            .with_queue_strategy(QueueStrategy::UnboundedLinked),
    )?;
    println!("   Unbounded linked queue, idle: {}\n", unbounded.size());
    Ok(())
}

fn metrics() -> PoolResult<()> {
    println!("4. Metrics:");
    let pool = Pool::new(buffer_factory, PoolConfig::new(3, 8, Duration::from_secs(30)))?;

    for _ in 0..5 {
        let buffer = pool.borrow_object()?;
        pool.return_object(buffer);
    }

    for (key, value) in pool.export_metrics() {
        println!("   {}: {}", key, value);
    }

    println!();
    println!("{}", pool.export_metrics_prometheus("demo", None));
    Ok(())
}
