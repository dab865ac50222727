//! Core self-tuning object pool

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::factory::ObjectFactory;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::queue::IdleQueue;
use crate::scheduler::{PeriodicTask, Scheduler, TaskHandle, TokioScheduler};

/// Shared pool state. Everything the maintenance task and outstanding
/// guards touch lives here, behind one `Arc`.
struct PoolInner<T: Send> {
    idle: IdleQueue<T>,
    factory: Box<dyn ObjectFactory<Object = T>>,
    config: PoolConfig,
    scheduler: Arc<dyn Scheduler>,
    /// Slot for the active maintenance task. At most one handle lives
    /// here; the lock is held only for swaps, never across a tick or a
    /// factory call.
    worker: Mutex<Option<TaskHandle>>,
    metrics: MetricsTracker,
}

impl<T: Send> PoolInner<T> {
    fn create_object(&self) -> PoolResult<T> {
        match self.factory.create() {
            Ok(object) => {
                self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                Ok(object)
            }
            Err(err) => {
                self.metrics.factory_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn return_idle(&self, object: T) {
        self.metrics.total_returned.fetch_add(1, Ordering::Relaxed);
        if !self.idle.try_enqueue(object) {
            self.metrics.total_discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// One maintenance pass. The size reading races with concurrent
    /// borrow/return, so rebalancing is best effort, not an exact
    /// target.
    fn rebalance(&self) {
        let size = self.idle.len();
        if size < self.config.min_idle {
            // Top-up target is max_idle, the high-water mark.
            let shortfall = self.config.max_idle.saturating_sub(size);
            let mut added = 0;
            for _ in 0..shortfall {
                match self.create_object() {
                    Ok(object) => {
                        if !self.idle.try_enqueue(object) {
                            self.metrics.total_discarded.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        added += 1;
                    }
                    Err(err) => {
                        // Remaining top-up is abandoned for this pass;
                        // the next pass re-reads the size and retries.
                        warn!(error = %err, added, "top-up aborted by factory failure");
                        break;
                    }
                }
            }
            debug!(size, added, "maintenance pass topped up idle set");
        } else if size > self.config.max_idle {
            let excess = size - self.config.max_idle;
            let mut removed = 0;
            for _ in 0..excess {
                if self.idle.try_dequeue().is_none() {
                    break;
                }
                removed += 1;
            }
            self.metrics.total_discarded.fetch_add(removed, Ordering::Relaxed);
            debug!(size, removed, "maintenance pass trimmed idle set");
        }
    }
}

/// Generic, self-tuning object pool.
///
/// Borrow and return are lock-free and never block. A background
/// maintenance task, scheduled through an injected [`Scheduler`], tops
/// the idle set up toward `max_idle` whenever it drops below `min_idle`
/// and trims it back down whenever it grows past `max_idle`. Callers
/// never wait on the maintenance task and the maintenance task never
/// waits on callers.
///
/// Dropping the pool cancels the maintenance task; idle objects are
/// dropped with the pool while borrowed objects stay with their
/// borrowers.
///
/// # Examples
///
/// ```
/// use repool::{Pool, PoolConfig, PoolResult};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> PoolResult<()> {
/// let pool = Pool::new(
///     || PoolResult::Ok(Vec::<u8>::with_capacity(4096)),
///     PoolConfig::new(2, 8, Duration::from_secs(30)),
/// )?;
///
/// let buffer = pool.borrow_object()?;
/// pool.return_object(buffer);
///
/// pool.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Pool<T> {
    /// Creates a pool that schedules maintenance on the ambient tokio
    /// runtime.
    ///
    /// The idle queue is built per the configured [`QueueStrategy`],
    /// `min_idle` objects are created synchronously through the
    /// factory, then the maintenance task is started. A factory failure
    /// here fails construction.
    ///
    /// [`QueueStrategy`]: crate::QueueStrategy
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; use
    /// [`with_scheduler`](Self::with_scheduler) to supply one.
    pub fn new<F>(factory: F, config: PoolConfig) -> PoolResult<Self>
    where
        F: ObjectFactory<Object = T> + 'static,
    {
        Self::with_scheduler(factory, config, Arc::new(TokioScheduler::current()))
    }

    /// Creates a pool with an explicitly supplied scheduler.
    pub fn with_scheduler<F>(
        factory: F,
        config: PoolConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> PoolResult<Self>
    where
        F: ObjectFactory<Object = T> + 'static,
    {
        if config.validation_interval.is_zero() {
            return Err(PoolError::ZeroValidationInterval);
        }

        let inner = Arc::new(PoolInner {
            idle: IdleQueue::new(config.queue_strategy, config.max_idle),
            factory: Box::new(factory),
            config,
            scheduler,
            worker: Mutex::new(None),
            metrics: MetricsTracker::new(),
        });

        for _ in 0..inner.config.min_idle {
            let object = inner.create_object()?;
            inner.idle.try_enqueue(object);
        }

        let pool = Self { inner };
        pool.start();
        Ok(pool)
    }

    /// Gets the next free object from the pool. When no idle object is
    /// available a new one is created synchronously and handed to the
    /// caller instead. Never blocks; a factory failure propagates and
    /// leaves the pool unchanged.
    pub fn borrow_object(&self) -> PoolResult<T> {
        let object = match self.inner.idle.try_dequeue() {
            Some(object) => object,
            None => self.inner.create_object()?,
        };
        self.inner.metrics.total_borrowed.fetch_add(1, Ordering::Relaxed);
        Ok(object)
    }

    /// Returns an object to the pool. `None` is a no-op. The idle set
    /// may transiently exceed `max_idle` until the next maintenance
    /// pass; that is accepted rather than prevented here.
    pub fn return_object(&self, object: impl Into<Option<T>>) {
        let Some(object) = object.into() else {
            return;
        };
        self.inner.return_idle(object);
    }

    /// Borrows an object wrapped in a guard that returns it to the pool
    /// when dropped.
    pub fn checkout(&self) -> PoolResult<PooledObject<T>> {
        let object = self.borrow_object()?;
        Ok(PooledObject {
            value: Some(object),
            pool: Arc::downgrade(&self.inner),
        })
    }

    /// Starts the maintenance task. Idempotent: if a task is already
    /// active the freshly scheduled one is cancelled immediately, so at
    /// most one maintenance task ever runs.
    pub fn start(&self) {
        let worker = {
            // The tick holds only a weak reference, so a scheduled task
            // never keeps a dropped pool alive.
            let inner = Arc::downgrade(&self.inner);
            let tick: PeriodicTask = Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.rebalance();
                }
            });
            self.inner.scheduler.schedule_periodically(
                tick,
                self.inner.config.validation_interval,
                self.inner.config.validation_interval,
            )
        };

        let mut slot = self.inner.worker.lock();
        if slot.is_none() {
            *slot = Some(worker);
        } else {
            drop(slot);
            worker.cancel();
        }
    }

    /// Cancels the maintenance task. Idempotent: a second call finds
    /// the slot empty and does nothing. Idle objects and outstanding
    /// borrows are unaffected; a tick already in flight completes.
    pub fn shutdown(&self) {
        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel();
        }
    }

    /// Whether a maintenance task is currently installed.
    pub fn is_running(&self) -> bool {
        self.inner.worker.lock().is_some()
    }

    /// Number of idle objects. Approximate under concurrent use.
    pub fn size(&self) -> usize {
        self.inner.idle.len()
    }

    /// Snapshot of the pool's activity counters.
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.metrics.snapshot(self.inner.idle.len())
    }

    /// Export metrics as a string map.
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus exposition format.
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }
}

impl<T: Send + 'static> Drop for Pool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A borrowed object that returns itself to the pool when dropped.
///
/// If the pool has been dropped in the meantime the object is simply
/// dropped too.
pub struct PooledObject<T: Send> {
    value: Option<T>,
    pool: Weak<PoolInner<T>>,
}

impl<T: Send> PooledObject<T> {
    /// Takes the inner value out of the guard without returning it to
    /// the pool.
    pub fn into_inner(mut self) -> T {
        self.value.take().expect("value already taken")
    }
}

impl<T: Send> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("value already taken")
    }
}

impl<T: Send> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("value already taken")
    }
}

impl<T: Send> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take()
            && let Some(pool) = self.pool.upgrade()
        {
            pool.return_idle(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_secs(1);

    fn sequence_factory(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> PoolResult<usize> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || Ok(calls.fetch_add(1, Ordering::Relaxed))
    }

    /// Factory that fails exactly on the calls named in `failing_calls`
    /// (zero-based) and succeeds otherwise.
    fn flaky_factory(
        calls: &Arc<AtomicUsize>,
        failing_calls: &'static [usize],
    ) -> impl Fn() -> PoolResult<usize> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            let call = calls.fetch_add(1, Ordering::Relaxed);
            if failing_calls.contains(&call) {
                Err(PoolError::factory(std::io::Error::other("factory down")))
            } else {
                Ok(call)
            }
        }
    }

    fn manual_pool(
        min_idle: usize,
        max_idle: usize,
    ) -> (Pool<usize>, Arc<ManualScheduler>, Arc<AtomicUsize>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Pool::with_scheduler(
            sequence_factory(&calls),
            PoolConfig::new(min_idle, max_idle, INTERVAL),
            Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        )
        .unwrap();
        (pool, scheduler, calls)
    }

    #[test]
    fn construction_prepopulates_min_idle() {
        let (pool, _scheduler, calls) = manual_pool(3, 5);

        assert_eq!(pool.size(), 3);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert!(pool.is_running());
    }

    #[test]
    fn construction_rejects_zero_interval() {
        let scheduler = Arc::new(ManualScheduler::new());
        let result = Pool::with_scheduler(
            || PoolResult::Ok(0usize),
            PoolConfig::new(0, 0, Duration::ZERO),
            scheduler as Arc<dyn Scheduler>,
        );

        assert!(matches!(result, Err(PoolError::ZeroValidationInterval)));
    }

    #[test]
    fn construction_propagates_factory_failure() {
        let scheduler = Arc::new(ManualScheduler::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let result = Pool::with_scheduler(
            flaky_factory(&calls, &[1]),
            PoolConfig::new(3, 5, INTERVAL),
            scheduler as Arc<dyn Scheduler>,
        );

        assert!(matches!(result, Err(PoolError::Factory(_))));
    }

    #[test]
    fn borrow_on_empty_creates_on_demand() {
        let (pool, _scheduler, calls) = manual_pool(0, 5);

        let object = pool.borrow_object().unwrap();
        assert_eq!(object, 0);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn borrow_prefers_idle_objects() {
        let (pool, _scheduler, calls) = manual_pool(2, 5);

        let _first = pool.borrow_object().unwrap();
        let _second = pool.borrow_object().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn returned_objects_are_recycled() {
        let (pool, _scheduler, calls) = manual_pool(0, 5);

        let object = pool.borrow_object().unwrap();
        pool.return_object(object);
        let again = pool.borrow_object().unwrap();

        assert_eq!(again, 0);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn returning_none_is_a_noop() {
        let (pool, _scheduler, _calls) = manual_pool(2, 5);

        pool.return_object(None::<usize>);

        assert_eq!(pool.size(), 2);
        assert_eq!(pool.metrics().total_returned, 0);
    }

    #[test]
    fn returns_past_max_idle_are_accepted() {
        let (pool, scheduler, _calls) = manual_pool(0, 2);

        let borrowed: Vec<_> = (0..5).map(|_| pool.borrow_object().unwrap()).collect();
        for object in borrowed {
            pool.return_object(object);
        }
        assert_eq!(pool.size(), 5);

        scheduler.tick();
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.metrics().total_discarded, 3);
    }

    #[test]
    fn borrow_propagates_factory_failure_unchanged() {
        let scheduler = Arc::new(ManualScheduler::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Pool::with_scheduler(
            flaky_factory(&calls, &[0]),
            PoolConfig::new(0, 5, INTERVAL),
            scheduler as Arc<dyn Scheduler>,
        )
        .unwrap();

        assert!(matches!(pool.borrow_object(), Err(PoolError::Factory(_))));
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.metrics().factory_failures, 1);
        assert_eq!(pool.metrics().total_borrowed, 0);

        // The failure was local to that one call.
        assert_eq!(pool.borrow_object().unwrap(), 1);
    }

    #[test]
    fn maintenance_tick_tops_up_to_max_idle() {
        let (pool, scheduler, _calls) = manual_pool(2, 5);

        let _a = pool.borrow_object().unwrap();
        let _b = pool.borrow_object().unwrap();
        assert_eq!(pool.size(), 0);

        scheduler.tick();
        assert_eq!(pool.size(), 5);
    }

    #[test]
    fn maintenance_tick_trims_to_exactly_max_idle() {
        let (pool, scheduler, _calls) = manual_pool(0, 3);

        let borrowed: Vec<_> = (0..8).map(|_| pool.borrow_object().unwrap()).collect();
        for object in borrowed {
            pool.return_object(object);
        }
        assert_eq!(pool.size(), 8);

        scheduler.tick();
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn maintenance_tick_within_bounds_is_a_noop() {
        let (pool, scheduler, calls) = manual_pool(2, 5);

        scheduler.tick();

        assert_eq!(pool.size(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn maintenance_top_up_aborts_on_factory_failure() {
        let scheduler = Arc::new(ManualScheduler::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Pool::with_scheduler(
            flaky_factory(&calls, &[2]),
            PoolConfig::new(4, 4, INTERVAL),
            Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        )
        .unwrap();
        assert_eq!(pool.size(), 0);

        // Call #2 fails, ending the pass at two objects.
        scheduler.tick();
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.metrics().factory_failures, 1);

        // The next pass re-evaluates independently and finishes the job.
        scheduler.tick();
        assert_eq!(pool.size(), 4);
    }

    #[test]
    fn shutdown_twice_is_a_noop() {
        let (pool, scheduler, _calls) = manual_pool(2, 5);
        let _drained: Vec<_> = (0..2).map(|_| pool.borrow_object().unwrap()).collect();

        pool.shutdown();
        pool.shutdown();

        assert!(!pool.is_running());
        assert_eq!(scheduler.active_tasks(), 0);

        // No maintenance happens once shut down.
        scheduler.tick();
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn start_twice_keeps_a_single_task() {
        let (pool, scheduler, _calls) = manual_pool(2, 5);

        pool.start();
        assert_eq!(scheduler.active_tasks(), 1);

        // One shutdown suffices: the duplicate was cancelled on arrival.
        pool.shutdown();
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn restart_after_shutdown_resumes_maintenance() {
        let (pool, scheduler, _calls) = manual_pool(2, 5);

        pool.shutdown();
        pool.start();
        assert!(pool.is_running());

        let _drained: Vec<_> = (0..2).map(|_| pool.borrow_object().unwrap()).collect();
        scheduler.tick();
        assert_eq!(pool.size(), 5);
    }

    #[test]
    fn dropping_the_pool_cancels_maintenance() {
        let (pool, scheduler, _calls) = manual_pool(2, 5);

        drop(pool);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn guard_returns_object_on_drop() {
        let (pool, _scheduler, _calls) = manual_pool(1, 5);

        {
            let mut guard = pool.checkout().unwrap();
            *guard += 10;
            assert_eq!(pool.size(), 0);
        }

        assert_eq!(pool.size(), 1);
        assert_eq!(pool.borrow_object().unwrap(), 10);
    }

    #[test]
    fn guard_into_inner_detaches_object() {
        let (pool, _scheduler, _calls) = manual_pool(1, 5);

        let guard = pool.checkout().unwrap();
        let object = guard.into_inner();

        assert_eq!(object, 0);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.metrics().total_returned, 0);
    }

    #[test]
    fn concurrent_borrow_return_conserves_objects() {
        const THREADS: usize = 8;
        const CYCLES: usize = 200;

        let (pool, _scheduler, _calls) = manual_pool(4, 16);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..CYCLES {
                        let object = pool.borrow_object().unwrap();
                        pool.return_object(object);
                    }
                });
            }
        });

        let metrics = pool.metrics();
        assert_eq!(metrics.total_borrowed, THREADS * CYCLES);
        assert_eq!(metrics.total_returned, THREADS * CYCLES);
        assert_eq!(metrics.total_discarded, 0);
        // Every created object is accounted for: all were returned, so
        // the idle set holds exactly what the factory ever produced.
        assert_eq!(pool.size(), metrics.total_created);
        assert!(metrics.total_created >= 4);
        assert!(metrics.total_created <= 4 + THREADS * CYCLES);
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_rebalances_on_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new(
            sequence_factory(&calls),
            PoolConfig::new(2, 5, Duration::from_secs(1)),
        )
        .unwrap();

        let first = pool.borrow_object().unwrap();
        let second = pool.borrow_object().unwrap();
        assert_eq!(pool.size(), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(pool.size(), 5);

        pool.return_object(first);
        pool.return_object(second);
        assert_eq!(pool.size(), 7);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(pool.size(), 5);

        pool.shutdown();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(pool.size(), 5);
    }
}
