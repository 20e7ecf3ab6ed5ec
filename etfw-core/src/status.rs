// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Status codes (§4.10), used uniformly by the pool, broker, runner,
//! service, and executor.

use std::fmt;

/// A user-defined status enumeration: `OK == 0` plus a trailing `COUNT`
/// sentinel, paired with a parallel table of human-readable strings.
pub trait StatusCode: Copy + Eq + fmt::Debug + 'static {
    /// The success code.
    fn ok() -> Self;

    /// Index of this code into `table()`.
    fn index(self) -> usize;

    /// Human strings, one per code, `table().len() == COUNT`.
    fn table() -> &'static [&'static str];
}

/// A `(code, table)` pair: the result type every core component returns.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Status<C: StatusCode> {
    code: C,
}

impl<C: StatusCode> Status<C> {
    pub const fn new(code: C) -> Self {
        Self { code }
    }

    pub fn ok(self) -> bool {
        self.code == C::ok()
    }

    pub fn is_error(self) -> bool {
        !self.ok()
    }

    pub fn code(self) -> C {
        self.code
    }

    pub fn message(self) -> &'static str {
        C::table()
            .get(self.code.index())
            .copied()
            .unwrap_or("<unrecognized status code>")
    }
}

impl<C: StatusCode> fmt::Debug for Status<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Status")
            .field("code", &self.code)
            .field("message", &self.message())
            .finish()
    }
}

impl<C: StatusCode> fmt::Display for Status<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl<C: StatusCode> std::error::Error for Status<C> {}

impl<C: StatusCode> Default for Status<C> {
    fn default() -> Self {
        Self::new(C::ok())
    }
}

/// The status codes shared across the messaging core, the service
/// runner/lifecycle, and the executor. One enumeration, per §4.10's
/// "used uniformly" requirement, rather than a bespoke error type per
/// component.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// Operation succeeded.
    Ok = 0,
    /// Pool had no free buffers (§4.2, §7 "resource exhausted").
    Depleted,
    /// `send`/`send_buf` could not obtain a buffer; reported via stats,
    /// not returned, but the code exists for symmetry with the rest of
    /// the taxonomy and for `return_message_buf`-style paths.
    AllocFailed,
    /// A compile-time/config value was invalid (§7 "programmer error"
    /// surfaced as a status rather than a panic where a caller can
    /// recover, e.g. zero-sized allocation requests).
    InvalidConfig,
    /// A buffer was released twice (fatal; see `etfw_core::fatal!`, kept
    /// here so a caller that catches the panic boundary still has a code
    /// to name it).
    DoubleRelease,
    /// A buffer was returned to a pool that did not allocate it (fatal).
    WrongPool,
    /// `init` called from a state other than `CREATED` (§3, §7 "illegal
    /// state").
    AlreadyInit,
    /// An operation requiring `INITIALIZED` was attempted before `init`.
    UninitErr,
    /// `start` called while already started.
    AlreadyStarted,
    /// `stop`/`cleanup` observed on an already-stopped service; not an
    /// error per §8 ("stop ... from any other state returns STOPPED").
    Stopped,
    /// `stop` called on a service that is not `ACTIVE`.
    NotActive,
    /// `Executor::register` called with an id already registered.
    IdTaken,
    /// `Executor::register` called with no free registry slot.
    RegistryFull,
    /// An executor-targeted operation named an id that was never
    /// registered (§7 "unknown id").
    UnknownId,
    /// A bounded queue was full (`BlockingQueue::push`/`emplace`, or a
    /// queued pipe at depth).
    QueueFull,
    /// A timed wait (`front(.., timeout)`, `process_queue(timeout)`,
    /// `WakeupPipe::wait`) elapsed with nothing delivered.
    Timeout,
    /// An OS-level failure (thread spawn, mutex init) surfaced as
    /// `ERROR` state per §7.
    OsError,
    /// Sentinel: one past the last real code. Not itself a valid status.
    Count,
}

const TABLE: [&str; Code::Count as usize] = [
    "ok",
    "buffer pool depleted",
    "buffer allocation failed",
    "invalid configuration",
    "buffer released twice",
    "buffer returned to the wrong pool",
    "service already initialized",
    "service not yet initialized",
    "service already started",
    "service already stopped",
    "service is not active",
    "service id already registered",
    "service registry is full",
    "unknown service id",
    "queue is full",
    "timed out waiting",
    "operating system error",
    "<sentinel: Code::Count is not a valid status>",
];

impl StatusCode for Code {
    fn ok() -> Self {
        Code::Ok
    }

    fn index(self) -> usize {
        self as usize
    }

    fn table() -> &'static [&'static str] {
        &TABLE
    }
}

/// The concrete status type returned throughout the framework.
pub type EtfwStatus = Status<Code>;

impl EtfwStatus {
    pub const fn ok_status() -> Self {
        Status::new(Code::Ok)
    }
}
