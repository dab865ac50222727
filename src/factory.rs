//! Factory contract for producing pooled objects

use crate::errors::PoolResult;

/// Capability to create one new instance of the pooled type.
///
/// Supplied by whoever instantiates the pool, either as a type
/// implementing this trait or as a plain closure. `create` is invoked
/// from borrower threads on a pool miss and from the maintenance task
/// while topping up, possibly at the same time, so implementations must
/// be safe to call concurrently. The pool never retries a failed call.
///
/// # Examples
///
/// ```
/// use repool::{ObjectFactory, PoolResult};
///
/// struct BufferFactory {
///     capacity: usize,
/// }
///
/// impl ObjectFactory for BufferFactory {
///     type Object = Vec<u8>;
///
///     fn create(&self) -> PoolResult<Vec<u8>> {
///         Ok(Vec::with_capacity(self.capacity))
///     }
/// }
///
/// let factory = BufferFactory { capacity: 4096 };
/// assert_eq!(factory.create().unwrap().capacity(), 4096);
/// ```
pub trait ObjectFactory: Send + Sync {
    type Object: Send;

    /// Creates a new object.
    fn create(&self) -> PoolResult<Self::Object>;
}

impl<T, F> ObjectFactory for F
where
    T: Send,
    F: Fn() -> PoolResult<T> + Send + Sync,
{
    type Object = T;

    fn create(&self) -> PoolResult<T> {
        self()
    }
}
