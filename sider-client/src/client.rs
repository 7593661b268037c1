//! # Async Connection Manager
//!
//! Purpose: Own one connection to a Redis-compatible server and run the
//! request/response cycle over it, including the AUTH/SELECT handshake,
//! pipelining and the pub/sub listener.
//!
//! ## Design Principles
//! 1. **Lazy Connect**: The socket is opened by the first command and reopened
//!    transparently after any failure.
//! 2. **Batch First**: Every execution is a list of commands written with one
//!    write; a single command is just a list of one.
//! 3. **Teardown on I/O Failure**: Timeouts, transport errors and corrupt
//!    replies close the connection before the error propagates. Server error
//!    replies are values and leave the connection usable.
//! 4. **Exclusive Access**: Methods take `&mut self`; sharing a connection
//!    requires external synchronization such as the pool.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use sider_common::{encode, new_protocol, Arg, Command, Protocol, WireValue};

use crate::config::{ClientConfig, ConnectionInfo, DEFAULT_PUBSUB_CAPACITY};
use crate::error::{ClientError, ClientResult, TimeoutPhase};
use crate::pubsub::{self, PubSubQueue, QueueSender, Subscriptions};
use crate::transport::{self, with_timeout, Transport};

const READ_CHUNK: usize = 2048;

/// A command already encoded for the wire.
struct PendingCommand {
    name: String,
    argc: usize,
    frame: Vec<u8>,
}

impl PendingCommand {
    fn encode(cmd: &Command) -> ClientResult<Self> {
        let mut frame = Vec::new();
        encode(cmd, &mut frame)?;
        Ok(PendingCommand {
            name: cmd.name().to_owned(),
            argc: cmd.args().len(),
            frame,
        })
    }
}

fn concat(commands: &[PendingCommand]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(commands.iter().map(|cmd| cmd.frame.len()).sum());
    for cmd in commands {
        payload.extend_from_slice(&cmd.frame);
    }
    payload
}

/// Read half of the socket plus the protocol decoding it.
struct ReadSide {
    reader: ReadHalf<Transport>,
    proto: Box<dyn Protocol>,
    /// Decoded replies not yet handed out, oldest first.
    backlog: VecDeque<WireValue>,
    chunk: Box<[u8]>,
}

impl ReadSide {
    fn new(reader: ReadHalf<Transport>, proto: Box<dyn Protocol>) -> Self {
        ReadSide {
            reader,
            proto,
            backlog: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Reads exactly `count` replies; later ones stay buffered.
    async fn read_replies(&mut self, count: usize) -> ClientResult<Vec<WireValue>> {
        loop {
            self.drain_decoded();
            if self.backlog.len() >= count {
                return Ok(self.backlog.drain(..count).collect());
            }
            self.fill().await?;
        }
    }

    /// Waits for at least one reply and returns every reply decoded so far.
    async fn read_batch(&mut self) -> ClientResult<Vec<WireValue>> {
        loop {
            self.drain_decoded();
            if !self.backlog.is_empty() {
                return Ok(self.backlog.drain(..).collect());
            }
            self.fill().await?;
        }
    }

    fn drain_decoded(&mut self) {
        while let Some(value) = self.proto.gets() {
            self.backlog.push_back(value);
        }
    }

    async fn fill(&mut self) -> ClientResult<()> {
        let read = self.reader.read(&mut self.chunk).await?;
        if read == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        self.proto.feed(&self.chunk[..read])?;
        Ok(())
    }
}

/// Replies the listener hands back to the caller.
struct Delivery {
    replies: Vec<WireValue>,
    /// The subscription ended and the listener is returning the read side.
    finished: bool,
}

/// Background task reading a subscribed connection.
struct Listener {
    handle: Option<JoinHandle<Option<ReadSide>>>,
    replies: mpsc::UnboundedReceiver<Delivery>,
    /// Replies delivered beyond what the last caller asked for.
    surplus: VecDeque<WireValue>,
}

impl Listener {
    fn spawn(side: ReadSide, queue: QueueSender, label: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Listener {
            handle: Some(tokio::spawn(listen(side, queue, tx, label))),
            replies: rx,
            surplus: VecDeque::new(),
        }
    }

    fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Collects exactly `count` replies, or fewer if the subscription ended
    /// first. Extra replies are kept for the next caller.
    async fn collect(&mut self, count: usize) -> ClientResult<(Vec<WireValue>, bool)> {
        let take = count.min(self.surplus.len());
        let mut out: Vec<WireValue> = self.surplus.drain(..take).collect();
        let mut finished = false;
        while out.len() < count && !finished {
            let delivery = self
                .replies
                .recv()
                .await
                .ok_or(ClientError::ConnectionClosed)?;
            out.extend(delivery.replies);
            finished = delivery.finished;
        }
        if out.len() > count {
            self.surplus.extend(out.drain(count..));
        }
        Ok((out, finished))
    }

    /// Waits for the task, taking back the read side if it ended cleanly.
    async fn join(mut self) -> Option<ReadSide> {
        let handle = self.handle.take()?;
        let side = handle.await.ok().flatten()?;
        Some(self.restore(side))
    }

    /// Puts replies the listener received but nobody collected back in
    /// front of the read side's backlog.
    fn restore(&mut self, mut side: ReadSide) -> ReadSide {
        while let Ok(delivery) = self.replies.try_recv() {
            self.surplus.extend(delivery.replies);
        }
        let mut backlog = mem::take(&mut self.surplus);
        backlog.append(&mut side.backlog);
        side.backlog = backlog;
        side
    }

    async fn cancel(mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        handle.abort();
        if let Err(err) = handle.await {
            if !err.is_cancelled() {
                warn!(error = %err, "pub/sub listener panicked");
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn listen(
    mut side: ReadSide,
    queue: QueueSender,
    replies: mpsc::UnboundedSender<Delivery>,
    label: String,
) -> Option<ReadSide> {
    let mut queue = Some(queue);
    loop {
        let batch = match side.read_batch().await {
            Ok(batch) => batch,
            Err(err) => {
                error!(client = %label, error = %err, "pub/sub listener stopped");
                if let Some(queue) = queue.take() {
                    queue.fail(err);
                }
                return None;
            }
        };

        let mut incoming = Vec::new();
        for item in batch {
            let Some(active) = &queue else {
                incoming.push(item);
                continue;
            };
            if pubsub::is_message(&item) {
                if !active.send(item).await {
                    debug!(client = %label, "pub/sub queue dropped, discarding message");
                }
                continue;
            }
            if pubsub::ends_subscription(&item) {
                // Dropping the sender closes the queue.
                queue = None;
            }
            incoming.push(pubsub::collapse_pong(item));
        }

        let finished = queue.is_none();
        if !incoming.is_empty() || finished {
            let _ = replies.send(Delivery {
                replies: incoming,
                finished,
            });
        }
        if finished {
            debug!(client = %label, "subscription ended");
            return Some(side);
        }
    }
}

enum ReadState {
    Direct(ReadSide),
    Listening(Listener),
    /// The read side was lost with its listener.
    Broken,
}

impl ReadState {
    fn take_listener(&mut self) -> Option<Listener> {
        match mem::replace(self, ReadState::Broken) {
            ReadState::Listening(listener) => Some(listener),
            other => {
                *self = other;
                None
            }
        }
    }
}

struct Connection {
    writer: WriteHalf<Transport>,
    read: ReadState,
}

/// Connection manager for one Redis endpoint.
///
/// ```no_run
/// # async fn demo() -> sider_client::ClientResult<()> {
/// use sider_client::{ClientConfig, Redis};
///
/// let mut redis = Redis::new(ClientConfig::new("redis://localhost:6379/0"))?;
/// redis.execute_cmd("set", ["key", "value"]).await?;
/// let value = redis.execute_cmd("get", ["key"]).await?;
/// redis.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Redis {
    config: ClientConfig,
    info: ConnectionInfo,
    conn: Option<Connection>,
    pipeline: bool,
    pipeline_buf: Vec<PendingCommand>,
    queue: PubSubQueue,
    /// Sender for the next listener; taken when a listener starts.
    queue_tx: Option<QueueSender>,
    subscriptions: Subscriptions,
}

impl Redis {
    /// Validates the URL; no connection is opened yet.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let info = config.connection_info()?;
        let (queue_tx, queue) = pubsub::queue(queue_capacity(&config));
        Ok(Redis {
            config,
            info,
            conn: None,
            pipeline: false,
            pipeline_buf: Vec::new(),
            queue,
            queue_tx: Some(queue_tx),
            subscriptions: Subscriptions::default(),
        })
    }

    pub fn from_url(url: &str) -> ClientResult<Self> {
        Self::new(ClientConfig::new(url))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// True while a pub/sub listener owns the read side.
    pub fn listener_active(&self) -> bool {
        match &self.conn {
            Some(Connection {
                read: ReadState::Listening(listener),
                ..
            }) => !listener.is_finished(),
            _ => false,
        }
    }

    /// Executes one command.
    ///
    /// In pipeline mode the command is buffered and `Ok(None)` is returned.
    /// A command answered with several replies, such as `SUBSCRIBE a b`,
    /// gets them back as one array.
    pub async fn execute_cmd<I, A>(&mut self, name: &str, args: I) -> ClientResult<Option<WireValue>>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.execute(Command::with_args(name, args)).await
    }

    pub async fn execute(&mut self, cmd: Command) -> ClientResult<Option<WireValue>> {
        let pending = PendingCommand::encode(&cmd)?;
        if self.pipeline {
            self.pipeline_buf.push(pending);
            return Ok(None);
        }
        self.execute_one(pending).await.map(Some)
    }

    /// Executes one command, ignoring pipeline mode.
    pub(crate) async fn execute_now(&mut self, cmd: Command) -> ClientResult<WireValue> {
        let pending = PendingCommand::encode(&cmd)?;
        self.execute_one(pending).await
    }

    async fn execute_one(&mut self, pending: PendingCommand) -> ClientResult<WireValue> {
        let mut replies = self.execute_cmd_list(vec![pending]).await?;
        replies.pop().ok_or(ClientError::ConnectionClosed)
    }

    /// `DEL key [key ...]`
    pub async fn delete<I, A>(&mut self, keys: I) -> ClientResult<Option<WireValue>>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.execute_cmd("del", keys).await
    }

    pub fn pipeline_on(&mut self) {
        self.pipeline = true;
    }

    pub fn pipeline_off(&mut self) {
        self.pipeline = false;
    }

    pub fn in_pipeline(&self) -> bool {
        self.pipeline
    }

    /// Number of buffered pipeline commands.
    pub fn pipeline_len(&self) -> usize {
        self.pipeline_buf.len()
    }

    /// Enables pipeline mode until the guard is dropped.
    pub fn pipeline(&mut self) -> PipelineGuard<'_> {
        self.pipeline_on();
        PipelineGuard { redis: self }
    }

    /// Sends every buffered command in one write and returns one reply per
    /// command, in order. The buffer is cleared even when execution fails.
    pub async fn pipeline_execute(&mut self) -> ClientResult<Vec<WireValue>> {
        if self.listener_active() {
            return Err(ClientError::PubSubActive);
        }
        let pending = mem::take(&mut self.pipeline_buf);
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        debug!(client = %self, commands = pending.len(), "flushing pipeline");
        self.execute_cmd_list(pending).await
    }

    pub fn pipeline_clear(&mut self) {
        self.pipeline_buf.clear();
    }

    /// Waits for the next pub/sub message.
    pub async fn next_message(&mut self) -> ClientResult<WireValue> {
        self.queue.recv().await
    }

    pub fn pubsub_queue(&mut self) -> &mut PubSubQueue {
        &mut self.queue
    }

    /// Cancels the listener and shuts the socket down. Safe to call on a
    /// closed or never-opened connection.
    pub async fn close(&mut self) {
        let Some(Connection { mut writer, read }) = self.conn.take() else {
            return;
        };
        self.subscriptions.clear();
        if let ReadState::Listening(listener) = read {
            listener.cancel().await;
        }
        let shutdown = with_timeout(TimeoutPhase::Write, self.config.write_timeout, async {
            writer.shutdown().await?;
            Ok::<(), ClientError>(())
        })
        .await;
        if let Err(err) = shutdown {
            debug!(client = %self, error = %err, "socket shutdown failed");
        }
        debug!(client = %self, "connection closed");
    }

    /// Waits for an active listener to end, at most `limit` when given.
    ///
    /// Returns false if it is still running afterwards.
    pub(crate) async fn wait_listener(&mut self, limit: Option<Duration>) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return true;
        };
        let Some(mut listener) = conn.read.take_listener() else {
            return true;
        };
        let Some(handle) = listener.handle.as_mut() else {
            return true;
        };
        let output = match limit {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(output) => output,
                Err(_) => {
                    conn.read = ReadState::Listening(listener);
                    return false;
                }
            },
            None => handle.await,
        };
        listener.handle = None;
        conn.read = match output {
            Ok(Some(side)) => ReadState::Direct(listener.restore(side)),
            _ => ReadState::Broken,
        };
        true
    }

    /// Drops the connection without awaiting anything.
    pub(crate) fn discard_connection(&mut self) {
        self.conn = None;
        self.subscriptions.clear();
    }

    async fn execute_cmd_list(&mut self, commands: Vec<PendingCommand>) -> ClientResult<Vec<WireValue>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_open().await?;
        if commands.iter().any(|cmd| pubsub::is_subscribe_command(&cmd.name)) {
            self.start_listener();
        }

        let counts: Vec<usize> = commands
            .iter()
            .map(|cmd| self.subscriptions.expected_replies(&cmd.name, cmd.argc))
            .collect();
        match self.round_trip(&concat(&commands), counts.iter().sum()).await {
            Ok(replies) => {
                for reply in &replies {
                    self.subscriptions.observe(reply);
                }
                Ok(group_replies(replies, &counts))
            }
            Err(err) => {
                warn!(client = %self, error = %err, "closing connection after failure");
                self.close().await;
                Err(err)
            }
        }
    }

    async fn ensure_open(&mut self) -> ClientResult<()> {
        if let Some(conn) = self.conn.as_mut() {
            if let ReadState::Listening(listener) = &conn.read {
                if listener.is_finished() {
                    if let Some(listener) = conn.read.take_listener() {
                        if let Some(side) = listener.join().await {
                            conn.read = ReadState::Direct(side);
                        }
                    }
                }
            }
            if !matches!(conn.read, ReadState::Broken) {
                return Ok(());
            }
            self.close().await;
        }
        self.open_connection().await
    }

    async fn open_connection(&mut self) -> ClientResult<()> {
        let mut handshake = Vec::new();
        if let Some(password) = &self.info.password {
            let auth = match &self.info.username {
                Some(username) => Command::new("auth").arg(username).arg(password),
                None => Command::new("auth").arg(password),
            };
            handshake.push(PendingCommand::encode(&auth)?);
        }
        if self.info.db != 0 {
            handshake.push(PendingCommand::encode(&Command::new("select").arg(self.info.db))?);
        }

        debug!(client = %self, "opening connection");
        let stream = with_timeout(
            TimeoutPhase::Connect,
            self.config.connect_timeout,
            transport::connect(&self.info, self.config.tls.as_ref()),
        )
        .await?;
        let (reader, writer) = tokio::io::split(stream);
        // Each connection gets a fresh protocol, so no state survives a reopen.
        let proto = new_protocol(self.config.backend, self.config.decoding);
        self.conn = Some(Connection {
            writer,
            read: ReadState::Direct(ReadSide::new(reader, proto)),
        });

        if handshake.is_empty() {
            return Ok(());
        }
        let result = self
            .round_trip(&concat(&handshake), handshake.len())
            .await
            .and_then(|replies| {
                replies
                    .into_iter()
                    .try_for_each(|reply| reply.into_result().map(drop).map_err(ClientError::from))
            });
        if let Err(err) = result {
            warn!(client = %self, error = %err, "handshake failed");
            self.close().await;
            return Err(err);
        }
        debug!(client = %self, "handshake complete");
        Ok(())
    }

    fn start_listener(&mut self) {
        let label = self.to_string();
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        let side = match mem::replace(&mut conn.read, ReadState::Broken) {
            ReadState::Direct(side) => side,
            other => {
                conn.read = other;
                return;
            }
        };
        let queue_tx = match self.queue_tx.take() {
            Some(queue_tx) => queue_tx,
            None => {
                let (queue_tx, queue) = pubsub::queue(queue_capacity(&self.config));
                self.queue = queue;
                queue_tx
            }
        };
        debug!(client = %label, "starting pub/sub listener");
        conn.read = ReadState::Listening(Listener::spawn(side, queue_tx, label));
    }

    /// One write of `payload`, then read `count` replies.
    async fn round_trip(&mut self, payload: &[u8], count: usize) -> ClientResult<Vec<WireValue>> {
        let read_timeout = self.config.read_timeout;
        let write_timeout = self.config.write_timeout;
        let conn = self.conn.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let writer = &mut conn.writer;
        with_timeout(TimeoutPhase::Write, write_timeout, async {
            writer.write_all(payload).await?;
            writer.flush().await?;
            Ok::<(), ClientError>(())
        })
        .await?;

        match &mut conn.read {
            ReadState::Direct(side) => {
                with_timeout(TimeoutPhase::Read, read_timeout, side.read_replies(count)).await
            }
            ReadState::Listening(listener) => {
                let (mut replies, finished) =
                    with_timeout(TimeoutPhase::Read, read_timeout, listener.collect(count)).await?;
                if !finished {
                    return Ok(replies);
                }
                let side = match conn.read.take_listener() {
                    Some(listener) => listener.join().await,
                    None => None,
                };
                let Some(mut side) = side else {
                    return Err(ClientError::ConnectionClosed);
                };
                // Replies to commands queued after the final unsubscribe.
                let rest = with_timeout(
                    TimeoutPhase::Read,
                    read_timeout,
                    side.read_replies(count - replies.len()),
                )
                .await;
                conn.read = ReadState::Direct(side);
                replies.extend(rest?);
                Ok(replies)
            }
            ReadState::Broken => Err(ClientError::ConnectionClosed),
        }
    }
}

/// `Redis[host:port/db]` or `Redis[socket-file]`.
impl fmt::Display for Redis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Redis[{}]", self.info)
    }
}

impl fmt::Debug for Redis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redis")
            .field("endpoint", &self.info.to_string())
            .field("connected", &self.is_connected())
            .field("pipeline", &self.pipeline)
            .field("pipeline_len", &self.pipeline_buf.len())
            .finish()
    }
}

/// Keeps pipeline mode on while alive.
pub struct PipelineGuard<'a> {
    redis: &'a mut Redis,
}

impl Deref for PipelineGuard<'_> {
    type Target = Redis;

    fn deref(&self) -> &Redis {
        self.redis
    }
}

impl DerefMut for PipelineGuard<'_> {
    fn deref_mut(&mut self) -> &mut Redis {
        self.redis
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        self.redis.pipeline_off();
    }
}

/// Splits a flat reply list into one value per command.
fn group_replies(replies: Vec<WireValue>, counts: &[usize]) -> Vec<WireValue> {
    let mut replies = replies.into_iter();
    counts
        .iter()
        .map(|&count| single_or_array(replies.by_ref().take(count).collect()))
        .collect()
}

fn single_or_array(mut replies: Vec<WireValue>) -> WireValue {
    if replies.len() == 1 {
        replies.swap_remove(0)
    } else {
        WireValue::Array(replies)
    }
}

fn queue_capacity(config: &ClientConfig) -> usize {
    config.pubsub_capacity.unwrap_or(DEFAULT_PUBSUB_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[tokio::test]
    async fn default_queue_is_unbounded() {
        let config = ClientConfig::new("redis://localhost");
        assert_eq!(queue_capacity(&config), 0);
        let (tx, mut rx) = pubsub::queue(queue_capacity(&config));
        for idx in 0..5_000 {
            let value = WireValue::Integer(idx);
            let sent = tokio::time::timeout(Duration::from_millis(100), tx.send(value)).await;
            assert_eq!(sent, Ok(true));
        }
        assert_eq!(rx.try_recv().map(Result::ok), Some(Some(WireValue::Integer(0))));

        let bounded = ClientConfig::new("redis://localhost").with_pubsub_capacity(8);
        assert_eq!(queue_capacity(&bounded), 8);
    }

    #[test]
    fn construction_validates_url() {
        let err = Redis::from_url("localhost").unwrap_err();
        assert!(matches!(err, ClientError::Config(ConfigError::SchemeRequired)));
    }

    #[test]
    fn display_uses_endpoint() {
        let redis = Redis::from_url("redis://localhost:6379/0").unwrap();
        assert_eq!(redis.to_string(), "Redis[localhost:6379/0]");
        let redis = Redis::from_url("redis+unix:///var/run/redis.sock").unwrap();
        assert_eq!(redis.to_string(), "Redis[redis.sock]");
    }

    #[tokio::test]
    async fn pipeline_buffers_without_connecting() {
        let mut redis = Redis::from_url("redis://127.0.0.1:1").unwrap();
        {
            let mut pipe = redis.pipeline();
            assert!(pipe.execute_cmd("set", ["a", "1"]).await.unwrap().is_none());
            assert!(pipe.execute_cmd("get", ["a"]).await.unwrap().is_none());
        }
        assert!(!redis.in_pipeline());
        assert_eq!(redis.pipeline_len(), 2);
        assert!(!redis.is_connected());
        redis.pipeline_clear();
        assert!(redis.pipeline_execute().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn encode_error_happens_before_io() {
        let mut redis = Redis::from_url("redis://127.0.0.1:1").unwrap();
        let none: Option<&str> = None;
        let err = redis.execute_cmd("set", [Arg::from("k"), Arg::from(none)]).await.unwrap_err();
        assert!(matches!(err, ClientError::Encode(_)));
        assert!(!redis.is_connected());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut redis = Redis::from_url("redis://127.0.0.1:1").unwrap();
        redis.close().await;
        redis.close().await;
        assert!(!redis.is_connected());
    }

    #[test]
    fn replies_are_grouped_per_command() {
        let replies = (1..=4).map(WireValue::Integer).collect();
        assert_eq!(
            group_replies(replies, &[1, 2, 1]),
            vec![
                WireValue::Integer(1),
                WireValue::Array(vec![WireValue::Integer(2), WireValue::Integer(3)]),
                WireValue::Integer(4),
            ]
        );
    }

    #[test]
    fn single_reply_is_unwrapped() {
        assert_eq!(single_or_array(vec![WireValue::Integer(1)]), WireValue::Integer(1));
        assert_eq!(
            single_or_array(vec![WireValue::Integer(1), WireValue::Integer(2)]),
            WireValue::Array(vec![WireValue::Integer(1), WireValue::Integer(2)])
        );
    }
}
