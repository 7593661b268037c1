//! # Pub/Sub Queue
//!
//! Purpose: Carry `message` / `pmessage` pushes from the listener task to the
//! application.
//!
//! ## Design Principles
//! 1. **Closable**: The listener closes the queue when the subscription ends,
//!    optionally with the error that ended it.
//! 2. **Backpressure**: A bounded queue makes the listener wait for the
//!    consumer; capacity `0` means unbounded.

use std::collections::HashSet;

use bytes::Bytes;
use tokio::sync::mpsc;

use sider_common::WireValue;

use crate::error::{ClientError, ClientResult};

enum QueueItem {
    Message(WireValue),
    Failed(ClientError),
}

enum Receiver {
    Bounded(mpsc::Receiver<QueueItem>),
    Unbounded(mpsc::UnboundedReceiver<QueueItem>),
}

#[derive(Clone)]
enum Sender {
    Bounded(mpsc::Sender<QueueItem>),
    Unbounded(mpsc::UnboundedSender<QueueItem>),
}

/// Receiving end of the pub/sub message queue.
///
/// Each message is the raw push array, e.g.
/// `["message", channel, payload]` or `["pmessage", pattern, channel, payload]`.
pub struct PubSubQueue {
    rx: Receiver,
}

/// Listener-side handle. Dropping every sender closes the queue.
#[derive(Clone)]
pub(crate) struct QueueSender {
    tx: Sender,
}

/// Creates a queue; `capacity == 0` is unbounded.
pub(crate) fn queue(capacity: usize) -> (QueueSender, PubSubQueue) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            QueueSender {
                tx: Sender::Unbounded(tx),
            },
            PubSubQueue {
                rx: Receiver::Unbounded(rx),
            },
        )
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (
            QueueSender {
                tx: Sender::Bounded(tx),
            },
            PubSubQueue {
                rx: Receiver::Bounded(rx),
            },
        )
    }
}

impl PubSubQueue {
    /// Waits for the next message.
    ///
    /// Returns the listener's error once if it failed, then `QueueClosed`.
    pub async fn recv(&mut self) -> ClientResult<WireValue> {
        let item = match &mut self.rx {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        };
        unpack(item)
    }

    /// Returns a buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<ClientResult<WireValue>> {
        let item = match &mut self.rx {
            Receiver::Bounded(rx) => rx.try_recv(),
            Receiver::Unbounded(rx) => rx.try_recv(),
        };
        match item {
            Ok(item) => Some(unpack(Some(item))),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(Err(ClientError::QueueClosed)),
        }
    }
}

fn unpack(item: Option<QueueItem>) -> ClientResult<WireValue> {
    match item {
        Some(QueueItem::Message(value)) => Ok(value),
        Some(QueueItem::Failed(err)) => Err(err),
        None => Err(ClientError::QueueClosed),
    }
}

impl QueueSender {
    /// Delivers a message, waiting while a bounded queue is full.
    ///
    /// Returns false when the consumer is gone.
    pub(crate) async fn send(&self, value: WireValue) -> bool {
        match &self.tx {
            Sender::Bounded(tx) => tx.send(QueueItem::Message(value)).await.is_ok(),
            Sender::Unbounded(tx) => tx.send(QueueItem::Message(value)).is_ok(),
        }
    }

    /// Closes the queue with an error, dropping it if the queue is full.
    pub(crate) fn fail(self, err: ClientError) {
        match &self.tx {
            Sender::Bounded(tx) => {
                let _ = tx.try_send(QueueItem::Failed(err));
            }
            Sender::Unbounded(tx) => {
                let _ = tx.send(QueueItem::Failed(err));
            }
        }
    }
}

/// Channels and patterns the server has confirmed, used to know how many
/// replies an (un)subscribe command produces.
#[derive(Debug, Default)]
pub(crate) struct Subscriptions {
    channels: HashSet<Bytes>,
    patterns: HashSet<Bytes>,
}

impl Subscriptions {
    /// Replies the server sends for one command with `argc` arguments.
    ///
    /// Every (un)subscribe argument gets its own confirmation; a bare
    /// `UNSUBSCRIBE` gets one per current channel, or one when there are
    /// none.
    pub(crate) fn expected_replies(&self, name: &str, argc: usize) -> usize {
        let is = |word: &str| name.eq_ignore_ascii_case(word);
        if is("subscribe") || is("psubscribe") || is("unsubscribe") || is("punsubscribe") {
            if argc > 0 {
                return argc;
            }
        }
        if is("unsubscribe") {
            self.channels.len().max(1)
        } else if is("punsubscribe") {
            self.patterns.len().max(1)
        } else {
            1
        }
    }

    /// Updates the sets from a reply, ignoring anything that is not an
    /// (un)subscribe confirmation.
    pub(crate) fn observe(&mut self, reply: &WireValue) {
        let Some([kind, name, count, ..]) = reply.as_array() else {
            return;
        };
        if count.as_integer() == Some(0) {
            self.clear();
            return;
        }
        let (Some(kind), Some(name)) = (kind.as_bytes(), name.as_bytes()) else {
            return;
        };
        let name = Bytes::copy_from_slice(name);
        if kind.eq_ignore_ascii_case(b"subscribe") {
            self.channels.insert(name);
        } else if kind.eq_ignore_ascii_case(b"psubscribe") {
            self.patterns.insert(name);
        } else if kind.eq_ignore_ascii_case(b"unsubscribe") {
            self.channels.remove(&name);
        } else if kind.eq_ignore_ascii_case(b"punsubscribe") {
            self.patterns.remove(&name);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.channels.clear();
        self.patterns.clear();
    }
}

/// True for `message` and `pmessage` pushes.
pub(crate) fn is_message(value: &WireValue) -> bool {
    first_word_is(value, &["message", "pmessage"])
}

/// True for `SUBSCRIBE` and `PSUBSCRIBE`.
pub(crate) fn is_subscribe_command(name: &str) -> bool {
    name.eq_ignore_ascii_case("subscribe") || name.eq_ignore_ascii_case("psubscribe")
}

/// True for an `unsubscribe` / `punsubscribe` reply reporting zero
/// remaining subscriptions.
pub(crate) fn ends_subscription(value: &WireValue) -> bool {
    if !first_word_is(value, &["unsubscribe", "punsubscribe"]) {
        return false;
    }
    matches!(
        value.as_array().and_then(|items| items.get(2)),
        Some(WireValue::Integer(0))
    )
}

/// `["pong", ""]` becomes `"pong"`; everything else is unchanged.
pub(crate) fn collapse_pong(value: WireValue) -> WireValue {
    match value {
        WireValue::Array(mut items)
            if items.len() == 2 && items[1].as_bytes().is_some_and(|data| data.is_empty()) =>
        {
            items.swap_remove(0)
        }
        other => other,
    }
}

fn first_word_is(value: &WireValue, words: &[&str]) -> bool {
    let Some(head) = value
        .as_array()
        .and_then(|items| items.first())
        .and_then(WireValue::as_bytes)
    else {
        return false;
    };
    words
        .iter()
        .any(|word| head.eq_ignore_ascii_case(word.as_bytes()))
}
