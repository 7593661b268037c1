//! # Sider Async Client
//!
//! Purpose: Async Redis client for tokio: a connection manager with
//! pipelining and pub/sub, plus a fixed-size pool of managers.
//!
//! ## Design Principles
//! 1. **Lazy Connections**: A `Redis` opens its socket on first use and
//!    reopens it transparently after a failure.
//! 2. **Single Reader**: While subscribed, one listener task owns the read
//!    half and routes replies and pushes apart.
//! 3. **Object Pool Pattern**: `RedisPool` bounds concurrency to a set of
//!    managers created up front.
//! 4. **Protocol Clarity**: RESP framing lives in `sider-common`; this crate
//!    only moves bytes.

mod client;
mod config;
mod error;
mod pool;
mod pubsub;
mod transport;

pub use client::{PipelineGuard, Redis};
pub use config::{
    ClientConfig, ClientOptions, ConnectionInfo, Endpoint, DEFAULT_POOL_SIZE,
    DEFAULT_PUBSUB_CAPACITY, DEFAULT_PORT, DEFAULT_URL,
};
pub use error::{ClientError, ClientResult, ConfigError, TimeoutPhase};
pub use pool::{Pool, PoolGuard, PoolItem, RedisLease, RedisPool, SharedRedis};
pub use pubsub::PubSubQueue;
pub use sider_common::{Arg, Backend, Command, ServerError, Utf8Policy, WireValue};
