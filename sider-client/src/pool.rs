//! # Resource Pool
//!
//! Purpose: Bound concurrent use of expensive resources (here, `Redis`
//! connection managers) to a fixed set created up front.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: A fixed number of items is created eagerly
//!    and recycled; nothing is created on demand.
//! 2. **LIFO Reuse**: The most recently returned item is handed out first so
//!    warm connections stay warm.
//! 3. **Minimal Locking**: The mutex guards only non-suspending moves between
//!    the idle stack and the used map; waiting happens on a semaphore.
//! 4. **Permissive Return**: Returning an item the pool does not consider
//!    checked out is a silent no-op.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::{debug, warn};

use sider_common::{Arg, Command, WireValue};

use crate::client::Redis;
use crate::config::{ClientConfig, ClientOptions, ConnectionInfo};
use crate::error::{ClientError, ClientResult, TimeoutPhase};
use crate::transport::with_timeout;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct PoolState<T> {
    /// LIFO stack of `(slot, item)`.
    idle: Vec<(u64, T)>,
    /// Checked-out items by slot; kept so `close` can reach them.
    used: HashMap<u64, T>,
}

struct PoolInner<T> {
    id: u64,
    size: usize,
    state: Mutex<PoolState<T>>,
    available: Semaphore,
}

/// Fixed-size async LIFO pool. Cloning yields another handle to the same
/// pool.
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// An item checked out with [`Pool::get`]; hand it back with [`Pool::put`].
#[derive(Debug)]
pub struct PoolItem<T> {
    pool_id: u64,
    slot: u64,
    value: T,
}

impl<T> PoolItem<T> {
    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for PoolItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for PoolItem<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Clone + Send + 'static> Pool<T> {
    /// Creates `size` items with `factory` before returning.
    ///
    /// The first factory error aborts construction.
    pub async fn new<F, Fut, E>(mut factory: F, size: usize) -> Result<Self, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut idle = Vec::with_capacity(size);
        for slot in 0..size as u64 {
            idle.push((slot, factory().await?));
        }
        Ok(Pool {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                size,
                state: Mutex::new(PoolState {
                    idle,
                    used: HashMap::with_capacity(size),
                }),
                available: Semaphore::new(size),
            }),
        })
    }

    /// Waits for a free item and checks it out.
    ///
    /// Fails only once the pool has been closed.
    pub async fn get(&self) -> ClientResult<PoolItem<T>> {
        let permit = self
            .inner
            .available
            .acquire()
            .await
            .map_err(|_| ClientError::PoolClosed)?;
        permit.forget();

        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        let Some((slot, value)) = state.idle.pop() else {
            // Permits never exceed idle items while the pool is open.
            drop(state);
            self.inner.available.add_permits(1);
            return Err(ClientError::PoolClosed);
        };
        state.used.insert(slot, value.clone());
        Ok(PoolItem {
            pool_id: self.inner.id,
            slot,
            value,
        })
    }

    /// Returns a checked-out item. Items this pool did not hand out, or that
    /// were already returned, are ignored.
    pub fn put(&self, item: PoolItem<T>) {
        if item.pool_id != self.inner.id {
            return;
        }
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.used.remove(&item.slot).is_none() {
            return;
        }
        state.idle.push((item.slot, item.value));
        drop(state);
        self.inner.available.add_permits(1);
    }

    /// Checks out an item that returns itself to the pool on drop.
    pub async fn checkout(&self, timeout: Option<Duration>) -> ClientResult<PoolGuard<T>> {
        let item = with_timeout(TimeoutPhase::Checkout, timeout, self.get()).await?;
        Ok(PoolGuard {
            pool: self.clone(),
            item: Some(item),
        })
    }

    /// Applies `closer` to every item, checked-out ones first, then idle
    /// ones. Later `get` calls fail with `PoolClosed`.
    pub async fn close<F, Fut>(&self, mut closer: F)
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.inner.available.close();
        let items: Vec<T> = {
            let mut state = self.inner.state.lock().expect("pool mutex poisoned");
            let mut used: Vec<(u64, T)> = state.used.drain().collect();
            used.sort_by_key(|(slot, _)| *slot);
            let idle = std::mem::take(&mut state.idle);
            used.into_iter()
                .chain(idle.into_iter().rev())
                .map(|(_, value)| value)
                .collect()
        };
        debug!(items = items.len(), "closing pool");
        for item in items {
            closer(item).await;
        }
    }
}

impl<T> Pool<T> {
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Items ready to be checked out.
    pub fn idle(&self) -> usize {
        self.inner.state.lock().expect("pool mutex poisoned").idle.len()
    }

    pub fn in_use(&self) -> usize {
        self.inner.state.lock().expect("pool mutex poisoned").used.len()
    }
}

/// `Pool[idle/size]`
impl<T> fmt::Display for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pool[{}/{}]", self.idle(), self.size())
    }
}

/// RAII checkout returning its item to the pool on drop.
pub struct PoolGuard<T: Clone + Send + 'static> {
    pool: Pool<T>,
    item: Option<PoolItem<T>>,
}

impl<T: Clone + Send + 'static> Deref for PoolGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => &item.value,
            None => unreachable!("pool guard used after release"),
        }
    }
}

impl<T: Clone + Send + 'static> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

/// Commands `RedisPool` refuses because they need connection affinity.
const CONNECTION_BOUND: [&str; 7] = [
    "multi",
    "exec",
    "discard",
    "subscribe",
    "psubscribe",
    "unsubscribe",
    "punsubscribe",
];

/// Shared handle to a pooled connection manager.
pub type SharedRedis = Arc<AsyncMutex<Redis>>;

/// Pool of `Redis` connection managers for one endpoint.
///
/// ```no_run
/// # async fn demo() -> sider_client::ClientResult<()> {
/// use sider_client::{ClientConfig, RedisPool};
///
/// let pool = RedisPool::new(ClientConfig::new("redis://localhost/0"), 4).await?;
/// pool.execute_cmd("set", ["key", "value"]).await?;
///
/// let lease = pool.get_redis(None).await?;
/// lease.lock().await.execute_cmd("get", ["key"]).await?;
/// lease.release().await?;
/// pool.close().await;
/// # Ok(())
/// # }
/// ```
pub struct RedisPool {
    config: ClientConfig,
    info: ConnectionInfo,
    pool: Pool<SharedRedis>,
}

impl RedisPool {
    /// Creates `size` connection managers; connections open lazily.
    pub async fn new(config: ClientConfig, size: usize) -> ClientResult<Self> {
        let info = config.connection_info()?;
        let pool = Pool::new(
            || {
                let config = config.clone();
                async move { Redis::new(config).map(|redis| Arc::new(AsyncMutex::new(redis))) }
            },
            size,
        )
        .await?;
        Ok(RedisPool { config, info, pool })
    }

    /// Builds the pool from deserialized options, using `pool_size`.
    pub async fn from_options(options: ClientOptions) -> ClientResult<Self> {
        let size = options.pool_size;
        Self::new(options.into_config()?, size).await
    }

    pub fn pool(&self) -> &Pool<SharedRedis> {
        &self.pool
    }

    /// Checks out one connection manager for exclusive use.
    pub async fn get_redis(&self, timeout: Option<Duration>) -> ClientResult<RedisLease> {
        let guard = self.pool.checkout(timeout).await?;
        Ok(RedisLease {
            guard: Some(guard),
            timeout,
        })
    }

    /// Runs one command on a pooled connection. Checkout waits at most the
    /// connect timeout.
    pub async fn execute_cmd<I, A>(&self, name: &str, args: I) -> ClientResult<WireValue>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.execute(Command::with_args(name, args)).await
    }

    pub async fn execute(&self, cmd: Command) -> ClientResult<WireValue> {
        if let Some(name) = CONNECTION_BOUND.iter().find(|name| cmd.is(name)) {
            return Err(ClientError::Unsupported(format!(
                "'{}' needs a dedicated connection, use get_redis()",
                name
            )));
        }
        let guard = self.pool.checkout(self.config.connect_timeout).await?;
        let mut redis = guard.lock().await;
        redis.execute_now(cmd).await
    }

    /// `DEL key [key ...]`
    pub async fn delete<I, A>(&self, keys: I) -> ClientResult<WireValue>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.execute_cmd("del", keys).await
    }

    /// Closes every connection manager, checked-out ones first.
    pub async fn close(&self) {
        self.pool
            .close(|redis| async move {
                redis.lock().await.close().await;
            })
            .await;
    }
}

/// `RedisPool[host:port/db][Pool[idle/size]]`
impl fmt::Display for RedisPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedisPool[{}][{}]", self.info, self.pool)
    }
}

/// A checked-out connection manager.
///
/// Prefer [`RedisLease::release`]: it gives an active pub/sub listener the
/// checkout timeout to finish before closing the connection. Dropping the
/// lease closes such a connection immediately.
pub struct RedisLease {
    guard: Option<PoolGuard<SharedRedis>>,
    timeout: Option<Duration>,
}

impl RedisLease {
    /// Returns the connection manager to the pool.
    ///
    /// An active pub/sub listener gets the lease's checkout timeout to end;
    /// with no timeout the wait is unbounded. If it is still running after
    /// that, the connection is closed so a subscribed socket never re-enters
    /// the pool, and `PubSubActive` is returned.
    pub async fn release(mut self) -> ClientResult<()> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };
        let mut redis = guard.lock().await;
        if !redis.listener_active() {
            return Ok(());
        }
        if redis.wait_listener(self.timeout).await {
            return Ok(());
        }
        warn!(endpoint = %redis.connection_info(), "closing connection with active pub/sub listener");
        redis.close().await;
        Err(ClientError::PubSubActive)
    }
}

impl Deref for RedisLease {
    type Target = SharedRedis;

    fn deref(&self) -> &SharedRedis {
        match &self.guard {
            Some(guard) => guard,
            None => unreachable!("redis lease used after release"),
        }
    }
}

impl Drop for RedisLease {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        if let Ok(mut redis) = guard.try_lock() {
            if redis.listener_active() {
                warn!(endpoint = %redis.connection_info(), "dropping connection with active pub/sub listener");
                redis.discard_connection();
            }
        };
    }
}
