// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Buffer pool (§4.2).
//!
//! A `Buffer` is a reference-counted handle over one message. The original
//! (`examples/original_source/inc/etfw/msg/Pool.hpp`) lays buffers out as a
//! `Pkt` header immediately followed by payload bytes inside a fixed memory
//! arena. Rust's `Arc` already gives us the atomic refcount and the
//! "return to pool on last release" behavior for free, so `Buffer` wraps
//! `Arc<BufferInner>` and the payload is a type-erased `Box<dyn AnyMessage>`
//! rather than a raw byte region — the header/payload *contract* (every
//! buffer names exactly one `id`/`size`) is preserved, the physical layout
//! is not. See `DESIGN.md` for the resolved Open Question.

use std::any::Any;
use std::sync::{Arc, Mutex};

use etfw_core::Describable;

/// A message type carried through the pool/broker/pipe pipeline.
///
/// `Describable` (from `etfw-core`) fixes `ID` at compile time; `msg_size`
/// defaults to `size_of::<Self>()` for fixed-layout messages and is
/// overridden by variable-length message types (§3: "size ... may be less
/// than the containing buffer for variable-length messages").
pub trait Message: Describable + Send + Sync + 'static {
    fn msg_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

/// Type-erased access to a boxed message inside a `Buffer`.
pub trait AnyMessage: Send + Sync {
    fn id(&self) -> u32;
    fn size(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Typed<T>(T);

impl<T: Message> AnyMessage for Typed<T> {
    fn id(&self) -> u32 {
        T::ID
    }
    fn size(&self) -> usize {
        self.0.msg_size()
    }
    fn as_any(&self) -> &dyn Any {
        &self.0
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }
}

/// A raw, not-yet-typed buffer obtained through the zero-copy path
/// (`get_message_buf`/`send_buf`, §4.5). The caller writes `id`, `size`,
/// and the payload bytes before handing it to `Broker::send_buf`.
#[derive(Debug)]
pub struct RawMessage {
    pub id: u32,
    pub size: usize,
    pub bytes: Box<[u8]>,
}

impl AnyMessage for RawMessage {
    fn id(&self) -> u32 {
        self.id
    }
    fn size(&self) -> usize {
        self.size
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Mirrors the original's `Pkt` header: every buffer logically carries an
/// id and a used-byte count ahead of its payload (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHeader {
    pub id: u32,
    pub size: usize,
}

struct PoolState {
    in_use: usize,
    water_mark: usize,
    alloc_count: u64,
    release_count: u64,
}

struct Shared {
    capacity: usize,
    state: Mutex<PoolState>,
}

/// Read-only snapshot of a pool's statistics (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub water_mark: usize,
    pub alloc_count: u64,
    pub release_count: u64,
}

struct BufferInner {
    pool: Arc<Shared>,
    payload: Box<dyn AnyMessage>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        let mut state = self.pool.state.lock().unwrap();
        state.in_use -= 1;
        state.release_count += 1;
    }
}

/// A shared, reference-counted handle onto one pool-owned message.
///
/// Cloning increments the underlying `Arc`; the buffer returns to its pool
/// when the last clone drops (§5: "reaching 0 is the sole trigger for
/// return-to-pool").
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    pub fn id(&self) -> u32 {
        self.inner.payload.id()
    }

    pub fn size(&self) -> usize {
        self.inner.payload.size()
    }

    pub fn header(&self) -> BufferHeader {
        BufferHeader {
            id: self.id(),
            size: self.size(),
        }
    }

    pub fn payload(&self) -> &dyn AnyMessage {
        self.inner.payload.as_ref()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.inner.payload.as_any().downcast_ref::<T>()
    }

    /// Mutable access to the raw payload, available only while this handle
    /// is the buffer's sole owner (refcount 1) — exactly the window between
    /// `get_message_buf` and `send_buf`/`return_message_buf`.
    pub fn raw_mut(&mut self) -> Option<&mut RawMessage> {
        Arc::get_mut(&mut self.inner)?
            .payload
            .as_any_mut()
            .downcast_mut::<RawMessage>()
    }

    fn owning_pool(&self) -> &Arc<Shared> {
        &self.inner.pool
    }
}

/// Fixed-capacity pool of reference-counted message buffers (§4.2).
///
/// `N` is the `pool_capacity` knob from §6, fixed at compile time.
pub struct Pool<const N: usize> {
    shared: Arc<Shared>,
}

impl<const N: usize> Default for Pool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Pool<N> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity: N,
                state: Mutex::new(PoolState {
                    in_use: 0,
                    water_mark: 0,
                    alloc_count: 0,
                    release_count: 0,
                }),
            }),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let s = self.shared.state.lock().unwrap();
        PoolStats {
            capacity: self.shared.capacity,
            in_use: s.in_use,
            water_mark: s.water_mark,
            alloc_count: s.alloc_count,
            release_count: s.release_count,
        }
    }

    /// `allocate_as<T>` (§4.2): construct `msg` into a freshly pool-owned
    /// buffer with refcount 1.
    pub fn allocate_as<T: Message>(&self, msg: T) -> Option<Buffer> {
        self.allocate_boxed(Box::new(Typed(msg)))
    }

    /// `allocate_copy<T>` (§4.2): copy-construct from a reference.
    pub fn allocate_copy<T: Message + Clone>(&self, msg: &T) -> Option<Buffer> {
        self.allocate_boxed(Box::new(Typed(msg.clone())))
    }

    /// `allocate_raw(size)` (§4.2): a buffer with at least `size` usable
    /// bytes and no message type yet attached. Used by `get_message_buf`.
    pub fn allocate_raw(&self, size: usize) -> Option<Buffer> {
        self.allocate_boxed(Box::new(RawMessage {
            id: 0,
            size: 0,
            bytes: vec![0u8; size].into_boxed_slice(),
        }))
    }

    fn allocate_boxed(&self, payload: Box<dyn AnyMessage>) -> Option<Buffer> {
        let mut state = self.shared.state.lock().unwrap();
        if state.in_use >= self.shared.capacity {
            return None;
        }
        state.in_use += 1;
        state.alloc_count += 1;
        if state.in_use > state.water_mark {
            state.water_mark = state.in_use;
        }
        drop(state);
        Some(Buffer {
            inner: Arc::new(BufferInner {
                pool: self.shared.clone(),
                payload,
            }),
        })
    }

    /// `release(&buffer)` (§4.2): the caller's handle is dropped, which
    /// decrements the shared refcount; returning to the pool happens in
    /// `BufferInner`'s `Drop` impl when the count reaches zero.
    pub fn release(&self, buf: Buffer) {
        self.check_ownership(&buf);
        drop(buf);
    }

    /// `return_unused(buf)` (§4.2): hand back a buffer that was never sent.
    /// Treated identically to a normal release.
    pub fn return_unused(&self, buf: Buffer) {
        self.check_ownership(&buf);
        drop(buf);
    }

    fn check_ownership(&self, buf: &Buffer) {
        if !Arc::ptr_eq(buf.owning_pool(), &self.shared) {
            etfw_core::fatal!("buffer returned to a pool that did not allocate it");
        }
    }
}
