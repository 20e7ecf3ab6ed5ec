// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An active parent with two active children (spec.md §8 S6): children are
//! registered and started before the parent starts; stopping the parent
//! stops both children first and only then runs the parent's own
//! `post_run_cleanup`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use etfw_core::log::{Level, Logger};
use etfw_msg::{Broker, MessageBus};
use etfw_svc::{AppFwProxy, RunOutcome, Service, ServiceHandle, ServiceLogic};

#[derive(Parser)]
struct Cli {
    /// How long to let the children tick before stopping the parent, in
    /// milliseconds.
    #[arg(long, default_value_t = 200)]
    run_for_ms: u64,
}

const STACK_SIZE: usize = 64 * 1024;

struct ChildLogic {
    name: &'static str,
}

impl ServiceLogic for ChildLogic {
    fn process(&self, proxy: &AppFwProxy) -> RunOutcome {
        proxy.log(Level::Debug, &format!("{} ticking", self.name));
        std::thread::sleep(Duration::from_millis(20));
        RunOutcome::Ok
    }
}

struct ParentLogic;

impl ServiceLogic for ParentLogic {
    fn process(&self, proxy: &AppFwProxy) -> RunOutcome {
        proxy.log(Level::Debug, "parent ticking");
        std::thread::sleep(Duration::from_millis(20));
        RunOutcome::Ok
    }

    fn post_run_cleanup(&self, proxy: &AppFwProxy) -> RunOutcome {
        proxy.log(Level::Info, "parent cleanup: every child has already left ACTIVE");
        RunOutcome::Ok
    }
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let bus: Arc<dyn MessageBus> = Arc::new(Broker::<8>::new());
    let log: Arc<dyn etfw_core::log::LogSink> = Arc::new(Logger::new((etfw_core::log::FacadeWritePolicy,)));

    let child_a: Arc<dyn ServiceHandle> = Arc::new(Service::<ChildLogic, 0>::new_active(
        2,
        "child-a",
        Arc::new(ChildLogic { name: "child-a" }),
        bus.clone(),
        log.clone(),
        STACK_SIZE,
        10,
    ));
    let child_b: Arc<dyn ServiceHandle> = Arc::new(Service::<ChildLogic, 0>::new_active(
        3,
        "child-b",
        Arc::new(ChildLogic { name: "child-b" }),
        bus.clone(),
        log.clone(),
        STACK_SIZE,
        10,
    ));

    let parent: Service<ParentLogic, 2> =
        Service::new_active(1, "parent", Arc::new(ParentLogic), bus, log, STACK_SIZE, 0);

    // Children must be initialized and started in their own right before
    // they're registered on the parent (spec.md §3: "children are
    // registered before the parent starts").
    child_a.init().ok();
    child_a.start().ok();
    child_b.init().ok();
    child_b.start().ok();
    parent.proxy().register_child(child_a.clone()).ok();
    parent.proxy().register_child(child_b.clone()).ok();

    ServiceHandle::init(&parent).ok();
    ServiceHandle::start(&parent).ok();

    std::thread::sleep(Duration::from_millis(args.run_for_ms));

    println!("stopping parent; children must leave ACTIVE first");
    ServiceHandle::stop(&parent).ok();

    println!("child-a started: {}", child_a.is_started());
    println!("child-b started: {}", child_b.is_started());
    println!("parent state: {:?}", parent.runner_state());
}
