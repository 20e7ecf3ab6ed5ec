// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Compile-time composition of write policies (§4.11).
//!
//! A `Logger<P>` fans every `log()` call out to all of `P`'s write
//! policies. Writers are pure sinks: no allocation, no buffering. `()`
//! and single/tuple writers all implement `WritePolicyList`, so
//! `Logger<(ConsoleWritePolicy, NullWritePolicy)>` composes two sinks
//! with no runtime indirection.

use std::fmt;

/// Log severity levels (§4.11): `DEBUG < INFO < WARNING < ERROR < CRITICAL`.
///
/// Grounded on `examples/original_source/inc/etfw/svcs/log/Logger.hpp`'s
/// `LogLevel` enum, which the `log` crate's own `Level` can't stand in for
/// — `log::Level` stops at `Error` and has no `Critical` variant, but
/// `Critical` is exactly the severity `etfw_core::fatal!`'s
/// fatal-programmer-error sites need (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Low severity message for debugging/diagnostics.
    Debug,
    /// Indicates a nominal event/operation has occurred.
    Info,
    /// Medium severity message indicating a warning.
    Warning,
    /// High severity, off-nominal event has occurred.
    Error,
    /// Highest severity, unrecoverable error has occurred.
    Critical,
}

impl Level {
    const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Maps onto the nearest `log` crate severity for [`FacadeWritePolicy`]:
    /// the `log` crate has no `Critical` variant, so it collapses onto
    /// `Error`, the closest level it exposes.
    const fn as_log_level(self) -> log::Level {
        match self {
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warning => log::Level::Warn,
            Level::Error | Level::Critical => log::Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A pure log sink. Implementations must not allocate or buffer.
pub trait WritePolicy {
    fn write(&self, level: Level, caller: &str, message: &str);
}

/// Discards everything. Satisfies the `WritePolicy` contract trivially;
/// useful as a default in tests that don't care about log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWritePolicy;

impl WritePolicy for NullWritePolicy {
    fn write(&self, _level: Level, _caller: &str, _message: &str) {}
}

/// Writes to stderr in the default console format from §6:
/// `"{caller:<20} {level:<12} {message}"`, newline-terminated, truncated
/// to `MAX_BYTES` (the `log_message_max_bytes` knob from §6).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleWritePolicy<const MAX_BYTES: usize = 256>;

impl<const MAX_BYTES: usize> WritePolicy for ConsoleWritePolicy<MAX_BYTES> {
    fn write(&self, level: Level, caller: &str, message: &str) {
        let truncated = truncate_utf8(message, MAX_BYTES);
        eprintln!("{caller:<20} {level:<12} {truncated}");
    }
}

/// Forwards into the process-wide `log` facade (the crate every teacher
/// binary in this workspace initializes via `env_logger::init()`), so a
/// host application's existing logging setup also sees ETFW's log lines.
/// `Level::Critical` collapses onto `log::Level::Error` (see
/// [`Level::as_log_level`]) since the `log` crate has no fifth severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeWritePolicy;

impl WritePolicy for FacadeWritePolicy {
    fn write(&self, level: Level, caller: &str, message: &str) {
        log::log!(target: "etfw", level.as_log_level(), "{caller:<20} {message}");
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// A type-erased handle onto a [`Logger`], so code that only needs to log —
/// `AppFwProxy` in `etfw-svc`, for instance — doesn't have to be generic
/// over the policy tuple `P`. `Logger<P>` implements this for any `P`.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, caller: &str, message: &str);
}

impl<P: WritePolicyList + Send + Sync> LogSink for Logger<P> {
    fn log(&self, level: Level, caller: &str, message: &str) {
        Logger::log(self, level, caller, message);
    }
}

/// A compile-time list of write policies dispatched in order.
pub trait WritePolicyList {
    fn dispatch(&self, level: Level, caller: &str, message: &str);
}

impl WritePolicyList for () {
    fn dispatch(&self, _level: Level, _caller: &str, _message: &str) {}
}

impl<A: WritePolicy> WritePolicyList for (A,) {
    fn dispatch(&self, level: Level, caller: &str, message: &str) {
        self.0.write(level, caller, message);
    }
}

impl<A: WritePolicy, B: WritePolicy> WritePolicyList for (A, B) {
    fn dispatch(&self, level: Level, caller: &str, message: &str) {
        self.0.write(level, caller, message);
        self.1.write(level, caller, message);
    }
}

impl<A: WritePolicy, B: WritePolicy, C: WritePolicy> WritePolicyList for (A, B, C) {
    fn dispatch(&self, level: Level, caller: &str, message: &str) {
        self.0.write(level, caller, message);
        self.1.write(level, caller, message);
        self.2.write(level, caller, message);
    }
}

/// A logger built from a fixed, compile-time set of write policies `P`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger<P> {
    policies: P,
}

impl<P: WritePolicyList> Logger<P> {
    pub const fn new(policies: P) -> Self {
        Self { policies }
    }

    pub fn log(&self, level: Level, caller: &str, message: &str) {
        self.policies.dispatch(level, caller, message);
    }

    pub fn debug(&self, caller: &str, message: &str) {
        self.log(Level::Debug, caller, message);
    }

    pub fn info(&self, caller: &str, message: &str) {
        self.log(Level::Info, caller, message);
    }

    pub fn warning(&self, caller: &str, message: &str) {
        self.log(Level::Warning, caller, message);
    }

    pub fn error(&self, caller: &str, message: &str) {
        self.log(Level::Error, caller, message);
    }

    /// Highest severity (§4.11): an unrecoverable error has occurred. Used
    /// alongside `etfw_core::fatal!` at the programmer-error sites
    /// SPEC_FULL.md §3 names.
    pub fn critical(&self, caller: &str, message: &str) {
        self.log(Level::Critical, caller, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct RecordingPolicy(Rc<RefCell<Vec<String>>>);

    impl WritePolicy for RecordingPolicy {
        fn write(&self, level: Level, caller: &str, message: &str) {
            self.0.borrow_mut().push(format!("{caller} {level} {message}"));
        }
    }

    #[test]
    fn fans_out_to_every_policy_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = RecordingPolicy(log.clone());
        let b = RecordingPolicy(log.clone());
        let logger = Logger::new((a, b));

        logger.info("svc.mgr", "started");

        assert_eq!(
            *log.borrow(),
            vec!["svc.mgr INFO        started".to_string(), "svc.mgr INFO        started".to_string()]
        );
    }

    #[test]
    fn null_policy_drops_everything() {
        let logger = Logger::new((NullWritePolicy,));
        logger.error("x", "should not panic or allocate observably");
    }

    #[test]
    fn console_policy_truncates_to_max_bytes() {
        let policy = ConsoleWritePolicy::<4>;
        assert_eq!(truncate_utf8("hello world", 4), "hell");
        // Exercise the write path itself (goes to stderr; just must not panic).
        policy.write(Level::Debug, "caller", "hello world");
    }

    #[test]
    fn level_ordering_matches_the_spec() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn critical_is_the_highest_severity_and_logs_at_critical() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let logger = Logger::new((RecordingPolicy(log.clone()),));
        logger.critical("pool", "buffer returned to the wrong pool");
        assert_eq!(log.borrow()[0], "pool CRITICAL buffer returned to the wrong pool");
    }
}
