//! Lock-free queue backing the idle-object set

use crossbeam::queue::{ArrayQueue, SegQueue};

/// Smallest capacity ever allocated for the bounded variant.
const MIN_BOUNDED_CAPACITY: usize = 1024;

/// Which concurrent queue implementation holds the pool's idle objects.
///
/// Both variants are lock-free and safe for arbitrary concurrent
/// producers and consumers. The choice is an explicit construction-time
/// policy set via [`PoolConfig`](crate::PoolConfig).
///
/// # Examples
///
/// ```
/// use repool::{PoolConfig, QueueStrategy};
///
/// let config = PoolConfig::default().with_queue_strategy(QueueStrategy::UnboundedLinked);
/// assert_eq!(config.queue_strategy, QueueStrategy::UnboundedLinked);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStrategy {
    /// Bounded MPMC array queue, sized to `max(max_idle, 1024)`.
    #[default]
    BoundedArray,

    /// Unbounded MPMC linked queue.
    UnboundedLinked,
}

/// Idle-object store. Enqueue and dequeue never block.
pub(crate) enum IdleQueue<T> {
    Bounded(ArrayQueue<T>),
    Unbounded(SegQueue<T>),
}

impl<T> IdleQueue<T> {
    pub(crate) fn new(strategy: QueueStrategy, max_idle: usize) -> Self {
        match strategy {
            QueueStrategy::BoundedArray => {
                IdleQueue::Bounded(ArrayQueue::new(max_idle.max(MIN_BOUNDED_CAPACITY)))
            }
            QueueStrategy::UnboundedLinked => IdleQueue::Unbounded(SegQueue::new()),
        }
    }

    /// Returns `false` only when the bounded variant is full. Callers
    /// treat rejection as a silent drop of the item, not an error.
    pub(crate) fn try_enqueue(&self, item: T) -> bool {
        match self {
            IdleQueue::Bounded(queue) => queue.push(item).is_ok(),
            IdleQueue::Unbounded(queue) => {
                queue.push(item);
                true
            }
        }
    }

    /// Returns `None` immediately when no item is available.
    pub(crate) fn try_dequeue(&self) -> Option<T> {
        match self {
            IdleQueue::Bounded(queue) => queue.pop(),
            IdleQueue::Unbounded(queue) => queue.pop(),
        }
    }

    /// Approximate under concurrent enqueue/dequeue.
    pub(crate) fn len(&self) -> usize {
        match self {
            IdleQueue::Bounded(queue) => queue.len(),
            IdleQueue::Unbounded(queue) => queue.len(),
        }
    }
}
