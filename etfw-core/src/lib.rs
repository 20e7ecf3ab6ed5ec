// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Foundation types shared by every ETFW crate: the message id packing
//! scheme, the `Status` result type, and the compile-time logger.

pub mod log;
pub mod msgid;
pub mod status;

pub use log::{LogSink, Level, Logger, WritePolicy};
pub use msgid::{pack, unpack, Describable, FuncId, ModuleId, MsgType, NO_MESSAGE};
pub use status::{Code, EtfwStatus, Status, StatusCode};

/// Raises a fatal programmer-error condition (§7: "Programmer error").
///
/// These are never recoverable at runtime per the spec (null buffer, wrong
/// pool, double-release, invalid config): the only correct response is to
/// abort loudly rather than let the invariant violation propagate.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        panic!("etfw: fatal programmer error: {}", format!($($arg)*))
    };
}
