// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Broker (§4.5): holds pipe subscriptions, allocates buffers from the
//! pool, and fans sent messages out to matching pipes.
//!
//! Grounded on `examples/original_source/inc/etfw/msg/Broker.hpp`. Per §9's
//! explicit redesign ("the spec instead releases the pool lock before
//! dispatch, holding only the broker's lock during fan-out, to avoid
//! priority inversion"), `Pool::allocate_*` runs to completion (taking and
//! releasing its own lock) before the broker ever touches `state`.
//!
//! §3 says pipe priority orders delivery "across pipes receiving the same
//! message", while §4.5/§5 say fan-out walks the pipe list "in
//! registration order". `register_pipe` reconciles the two by inserting in
//! priority order (stable on ties), so "registration order" and "priority
//! order" name the same total order — see `DESIGN.md`.

use std::sync::{Arc, Mutex};

use etfw_core::status::{Code, EtfwStatus, Status};

use crate::pipe::Pipe;
use crate::pool::{Buffer, Message, Pool, PoolStats};

/// Read-only snapshot of broker statistics (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    pub registered_pipes: usize,
    pub num_send_calls: u64,
    pub alloc_failures: u64,
}

struct State {
    pipes: Vec<Arc<dyn Pipe>>,
    num_send_calls: u64,
    alloc_failures: u64,
}

/// The message router. `POOL_CAP` is the `pool_capacity` knob from §6.
pub struct Broker<const POOL_CAP: usize> {
    pool: Pool<POOL_CAP>,
    state: Mutex<State>,
}

impl<const POOL_CAP: usize> Default for Broker<POOL_CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const POOL_CAP: usize> Broker<POOL_CAP> {
    pub fn new() -> Self {
        Self {
            pool: Pool::new(),
            state: Mutex::new(State {
                pipes: Vec::new(),
                num_send_calls: 0,
                alloc_failures: 0,
            }),
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn stats(&self) -> BrokerStats {
        let s = self.state.lock().unwrap();
        BrokerStats {
            registered_pipes: s.pipes.len(),
            num_send_calls: s.num_send_calls,
            alloc_failures: s.alloc_failures,
        }
    }

    /// A pipe appears at most once (§4.5). Re-registration after an
    /// `unregister_pipe` is allowed.
    pub fn register_pipe(&self, pipe: Arc<dyn Pipe>) {
        let mut state = self.state.lock().unwrap();
        if state.pipes.iter().any(|p| Arc::ptr_eq(p, &pipe)) {
            return;
        }
        let pos = state
            .pipes
            .iter()
            .position(|p| p.priority() > pipe.priority())
            .unwrap_or(state.pipes.len());
        state.pipes.insert(pos, pipe);
    }

    /// §9's resolved Open Question: always decrement `registered_pipes` on
    /// a successful unregister (the original's two variants disagreed).
    pub fn unregister_pipe(&self, pipe: &Arc<dyn Pipe>) {
        let mut state = self.state.lock().unwrap();
        state.pipes.retain(|p| !Arc::ptr_eq(p, pipe));
    }

    /// `send<T>(value)` (§4.5): allocate, copy in, fan out.
    pub fn send<T: Message>(&self, msg: T) -> EtfwStatus {
        match self.pool.allocate_as(msg) {
            Some(buf) => {
                self.dispatch(buf);
                EtfwStatus::ok_status()
            }
            None => {
                self.state.lock().unwrap().alloc_failures += 1;
                Status::new(Code::Depleted)
            }
        }
    }

    /// `get_message_buf(size)` (§4.5): zero-copy allocation path. The
    /// caller must write a well-formed `id`/`size`/payload via
    /// [`Buffer::raw_mut`] before calling [`Broker::send_buf`], or hand it
    /// back with [`Broker::return_message_buf`].
    pub fn get_message_buf(&self, size: usize) -> Option<Buffer> {
        self.pool.allocate_raw(size)
    }

    pub fn return_message_buf(&self, buf: Buffer) {
        self.pool.return_unused(buf);
    }

    /// `send_buf(buf)` (§4.5): validates the buffer was written to (a
    /// nonzero id — `module_id == 0`/id `0` means "no message", §3), fans
    /// out, and drops the broker's own reference. Invalid buffers are
    /// released immediately rather than dispatched.
    pub fn send_buf(&self, buf: Buffer) -> EtfwStatus {
        if buf.id() == etfw_core::NO_MESSAGE {
            self.pool.return_unused(buf);
            return Status::new(Code::InvalidConfig);
        }
        self.dispatch(buf);
        EtfwStatus::ok_status()
    }

    fn dispatch(&self, buf: Buffer) {
        let mut state = self.state.lock().unwrap();
        // `state` stays locked for the whole fan-out: two concurrent sends
        // are serialized by this lock (§5), and no pipe can be registered
        // or unregistered mid-delivery.
        state.num_send_calls += 1;
        for pipe in state.pipes.iter() {
            if pipe.accepts(buf.id()) {
                pipe.receive_shared(buf.clone());
            }
        }
        // `buf`'s own reference drops here; the buffer returns to the pool
        // now unless a queued pipe retained a clone (§5).
    }
}

/// Object-safe view of a [`Broker`], independent of its `POOL_CAP`.
///
/// `etfw-svc`'s `AppFwProxy` holds one of these rather than a generic
/// `Broker<POOL_CAP>`, so a service doesn't have to carry its broker's pool
/// capacity in its own type parameters (§9's trait-object re-architecture,
/// applied the same way `Pipe` erases pipe implementations).
pub trait MessageBus: Send + Sync {
    fn register_pipe(&self, pipe: Arc<dyn Pipe>);
    fn unregister_pipe(&self, pipe: &Arc<dyn Pipe>);
    fn get_message_buf(&self, size: usize) -> Option<Buffer>;
    fn return_message_buf(&self, buf: Buffer);
    fn send_buf(&self, buf: Buffer) -> EtfwStatus;
}

impl<const POOL_CAP: usize> MessageBus for Broker<POOL_CAP> {
    fn register_pipe(&self, pipe: Arc<dyn Pipe>) {
        Broker::register_pipe(self, pipe)
    }

    fn unregister_pipe(&self, pipe: &Arc<dyn Pipe>) {
        Broker::unregister_pipe(self, pipe)
    }

    fn get_message_buf(&self, size: usize) -> Option<Buffer> {
        Broker::get_message_buf(self, size)
    }

    fn return_message_buf(&self, buf: Buffer) {
        Broker::return_message_buf(self, buf)
    }

    fn send_buf(&self, buf: Buffer) -> EtfwStatus {
        Broker::send_buf(self, buf)
    }
}
