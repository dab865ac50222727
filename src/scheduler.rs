//! Periodic scheduling capability consumed by the pool
//!
//! The pool does not own a timer thread. It is handed a [`Scheduler`]
//! at construction and asks it for one recurring task; everything else
//! (runtime, threads, clocks) belongs to the scheduler implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// A recurring job run by a [`Scheduler`].
pub type PeriodicTask = Box<dyn FnMut() + Send>;

/// Cancellable reference to a scheduled recurring task.
///
/// `cancel` is idempotent: the first call stops all future runs, any
/// later call is a no-op. A run already in flight when `cancel` happens
/// completes normally; only future runs are prevented.
pub struct TaskHandle {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl TaskHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Stops future runs of the task. Safe to call more than once.
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

/// Capability to run a task repeatedly at a fixed period, on a thread
/// distinct from the caller, until the returned handle is cancelled.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to first run after `initial_delay` and then
    /// once every `period`.
    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle;
}

/// Scheduler backed by a tokio runtime.
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Uses the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }

    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_periodically(
        &self,
        mut task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticks = tokio::time::interval(period);
            loop {
                // The first tick of a fresh interval completes at once,
                // so the first run lands exactly at `initial_delay`.
                ticks.tick().await;
                task();
            }
        });
        // abort() only takes effect at an await point; a task() call
        // already running finishes its tick.
        TaskHandle::new(move || join.abort())
    }
}

/// Deterministic scheduler for tests: registered tasks run only when
/// [`tick`](ManualScheduler::tick) is called, regardless of the delays
/// they were scheduled with.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use repool::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let handle = scheduler.schedule_periodically(
///     Box::new(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     }),
///     Duration::from_secs(1),
///     Duration::from_secs(1),
/// );
///
/// scheduler.tick();
/// scheduler.tick();
/// assert_eq!(runs.load(Ordering::Relaxed), 2);
///
/// handle.cancel();
/// scheduler.tick();
/// assert_eq!(runs.load(Ordering::Relaxed), 2);
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<ManualTask>>,
}

struct ManualTask {
    run: PeriodicTask,
    cancelled: Arc<AtomicBool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every non-cancelled task once, in registration order.
    /// Cancelled tasks are dropped before the pass.
    pub fn tick(&self) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.cancelled.load(Ordering::Acquire));
        for task in tasks.iter_mut() {
            (task.run)();
        }
    }

    /// Number of tasks that would run on the next [`tick`](Self::tick).
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|task| !task.cancelled.load(Ordering::Acquire))
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        _initial_delay: Duration,
        _period: Duration,
    ) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().push(ManualTask {
            run: task,
            cancelled: Arc::clone(&cancelled),
        });
        TaskHandle::new(move || cancelled.store(true, Ordering::Release))
    }
}
