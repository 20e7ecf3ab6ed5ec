// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Two collaborators talking through a bare `Broker`, no service layer
//! involved: a telemetry-request responder (`TlmReqHandler`, SPEC_FULL.md
//! §3) answers `TLM_REQ` with `TLM`, and a queued collector drains the
//! replies on its own schedule. This is the pattern `etfw-svc::Service`
//! builds on top of, shown here with the messaging core alone.
//!
//! The responder queues its reply rather than calling `Broker::send` from
//! inside `dispatch`: a sync pipe's handler runs on the sender's thread
//! while the broker's own lock is held for the whole fan-out (§4.5 step 4),
//! and §5 is explicit that a handler "must not take the broker lock
//! recursively" — sending straight back into the same broker from inside
//! `dispatch` would deadlock on that lock. The main loop drains and sends
//! the queued replies once the original `send` call has returned.

use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use etfw_core::{pack, Describable, MsgType};
use etfw_msg::{AnyMessage, Broker, Message, MessageHandler, QueuedPipe, StaticHandler, StaticPipe};

const SENSOR_MODULE: u8 = 1;
const TEMPERATURE_FUNC: u8 = 1;

#[derive(Parser)]
struct Cli {
    /// Number of TLM_REQ messages to send before draining replies.
    #[arg(long, default_value_t = 5)]
    requests: usize,
}

#[derive(Clone, Copy)]
struct TempRequest;
impl Describable for TempRequest {
    const ID: u32 = pack(SENSOR_MODULE, MsgType::TlmReq, TEMPERATURE_FUNC);
}
impl Message for TempRequest {}

#[derive(Clone, Copy)]
struct TempReading {
    value_c: f32,
}
impl Describable for TempReading {
    const ID: u32 = pack(SENSOR_MODULE, MsgType::Tlm, TEMPERATURE_FUNC);
}
impl Message for TempReading {}

/// Queues a `TempReading` for every `TempRequest` it sees; the queued
/// readings are sent back through the broker by the caller, never from
/// inside `dispatch` itself.
struct TlmReqHandler {
    next_reading: Mutex<f32>,
    pending: Mutex<Vec<f32>>,
}

impl TlmReqHandler {
    fn new(starting_reading: f32) -> Self {
        Self {
            next_reading: Mutex::new(starting_reading),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Drains every reading queued since the last drain.
    fn drain_pending(&self) -> Vec<f32> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

impl StaticHandler for TlmReqHandler {
    fn dispatch(&self, id: u32, _msg: &dyn AnyMessage) -> bool {
        if id != TempRequest::ID {
            return false;
        }
        let mut reading = self.next_reading.lock().unwrap();
        let value_c = *reading;
        *reading += 0.5;
        self.pending.lock().unwrap().push(value_c);
        true
    }
}

struct PrintReading;
impl MessageHandler for PrintReading {
    fn handle(&self, msg: &dyn AnyMessage) {
        let reading = msg.as_any().downcast_ref::<TempReading>().expect("TLM id implies TempReading");
        println!("temperature reading: {:.1}C", reading.value_c);
    }
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let bus: Broker<16> = Broker::new();

    let responder = std::sync::Arc::new(StaticPipe::new(0, [TempRequest::ID], TlmReqHandler::new(18.0)));
    bus.register_pipe(responder.clone());

    let collector = std::sync::Arc::new(QueuedPipe::<_, 8>::with_subscription(1, PrintReading, [TempReading::ID]));
    bus.register_pipe(collector.clone());

    for _ in 0..args.requests {
        bus.send(TempRequest).ok();
    }

    for value_c in responder.handler().drain_pending() {
        let status = bus.send(TempReading { value_c });
        if status.is_error() {
            log::warn!("temperature reply dropped: {status}");
        }
    }

    collector.process_queue(Duration::from_millis(50));

    println!(
        "pool: in_use={} alloc_count={} release_count={} water_mark={}",
        bus.pool_stats().in_use,
        bus.pool_stats().alloc_count,
        bus.pool_stats().release_count,
        bus.pool_stats().water_mark,
    );
    if collector.drops() > 0 {
        println!("dropped {} replies (queue depth exceeded)", collector.drops());
    }
}
