// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An `Executor` driving a group of passive services (§4.9): `start_all`
//! initializes and starts every registered service best-effort — one
//! service here fails `on_init` deliberately, and the executor logs it and
//! keeps going rather than aborting the other two.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use etfw_core::log::{Logger, NullWritePolicy};
use etfw_core::status::{Code, EtfwStatus, Status};
use etfw_msg::{Broker, MessageBus};
use etfw_svc::{AppFwProxy, Executor, RunOutcome, Service, ServiceHandle, ServiceLogic};

#[derive(Parser)]
struct Cli {
    /// Number of `process` ticks to drive the passive services through.
    #[arg(long, default_value_t = 5)]
    ticks: usize,
}

struct Collector {
    ticks: AtomicUsize,
    limit: usize,
}

impl ServiceLogic for Collector {
    fn process(&self, _proxy: &AppFwProxy) -> RunOutcome {
        if self.ticks.fetch_add(1, Ordering::SeqCst) < self.limit {
            RunOutcome::Ok
        } else {
            RunOutcome::Done
        }
    }
}

struct Watchdog;
impl ServiceLogic for Watchdog {
    fn process(&self, _proxy: &AppFwProxy) -> RunOutcome {
        RunOutcome::Ok
    }
}

struct Faulty;
impl ServiceLogic for Faulty {
    fn on_init(&self, _proxy: &AppFwProxy) -> EtfwStatus {
        Status::new(Code::OsError)
    }
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let bus: Arc<dyn MessageBus> = Arc::new(Broker::<4>::new());
    let log: Arc<dyn etfw_core::log::LogSink> = Arc::new(Logger::new((NullWritePolicy,)));

    let collector = Arc::new(Service::<Collector, 0>::new_passive(
        1,
        "collector",
        Arc::new(Collector {
            ticks: AtomicUsize::new(0),
            limit: args.ticks,
        }),
        bus.clone(),
        log.clone(),
    ));
    let watchdog = Arc::new(Service::<Watchdog, 0>::new_passive(2, "watchdog", Arc::new(Watchdog), bus.clone(), log.clone()));
    let faulty = Arc::new(Service::<Faulty, 0>::new_passive(3, "faulty", Arc::new(Faulty), bus, log.clone()));

    let executor: Executor<4> = Executor::new(log);
    executor.register(collector.clone() as Arc<dyn ServiceHandle>).ok();
    executor.register(watchdog.clone() as Arc<dyn ServiceHandle>).ok();
    executor.register(faulty.clone() as Arc<dyn ServiceHandle>).ok();

    executor.start_all();

    println!("collector started: {}", collector.is_started());
    println!("watchdog started: {}", watchdog.is_started());
    println!("faulty started (expected false, on_init fails): {}", faulty.is_started());

    // The executor's responsibility ends at start_all(); driving a passive
    // service's process() loop is the host's job (§4.7, §5).
    loop {
        collector.drive_once();
        watchdog.drive_once();
        if collector.runner_state() == etfw_svc::RunnerState::Exited {
            break;
        }
    }

    println!(
        "collector exited on its own after {} ticks; watchdog still active: {}",
        args.ticks,
        watchdog.runner_state() == etfw_svc::RunnerState::Active
    );

    executor.stop_all();
    println!("watchdog started after stop_all: {}", watchdog.is_started());
}
