// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The messaging core (§2.B–F of `SPEC_FULL.md`): the buffer pool,
//! subscriptions, pipes, the broker, and the blocking queue that backs
//! queued pipes.

pub mod broker;
pub mod pipe;
pub mod pool;
pub mod queue;
pub mod subscription;

pub use broker::{Broker, BrokerStats, MessageBus};
pub use pipe::{
    MessageHandler, Pipe, Priority, QueuedPipe, StaticHandler, StaticPipe, SyncPipe, WakeupPipe,
    DEFAULT_PRIORITY,
};
pub use pool::{AnyMessage, Buffer, BufferHeader, Message, Pool, PoolStats, RawMessage};
pub use queue::{BlockingQueue, QUEUE_DEPTH_LIMIT};
pub use subscription::Subscription;
