// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Service (§4.8): the guarded `init`/`start`/`stop`/`cleanup` surface, the
//! bounded child registry, and the `AppFwProxy` capability handed to user
//! code.
//!
//! Grounded on `examples/original_source/inc/etfw/svcs/iSvc.hpp` and
//! `src/svcs/iSvc.cpp`: `iSvc`'s `IsInit`/`IsStarted` guard bools and its
//! `init_`/`start_`/`stop_`/`cleanup_` pure-virtual hooks become
//! `ServiceLogic`'s `on_init`/`on_cleanup` plus the `pre_run_init`/
//! `process`/`post_run_cleanup` hooks the runner drives directly — the
//! original's `iSvc` plays both roles (the guarded surface and the
//! runner's hook target) through one `virtual` base; this splits them into
//! two traits so the guard logic (`Service`) doesn't need to know about
//! the runner's internal state machine, and vice versa.

use std::sync::{Arc, Mutex};

use etfw_core::log::{Level, LogSink};
use etfw_core::status::{Code, EtfwStatus, Status};
use etfw_msg::{MessageBus, Pipe};

use crate::runner::{RunOutcome, Runner, RunnerHooks, RunnerState};

/// User-provided service behavior (§4.8's implementation-specific hooks,
/// §4.7's run-loop hooks).
pub trait ServiceLogic: Send + Sync {
    /// One-time resource setup (§4.8's `init_`), run once per `init()`.
    fn on_init(&self, _proxy: &AppFwProxy) -> EtfwStatus {
        EtfwStatus::ok_status()
    }

    /// One-time resource teardown (§4.8's `cleanup_`), run once per
    /// `cleanup()`.
    fn on_cleanup(&self, _proxy: &AppFwProxy) -> EtfwStatus {
        EtfwStatus::ok_status()
    }

    /// Called once when the runner transitions into `ACTIVE` (§4.7).
    fn pre_run_init(&self, _proxy: &AppFwProxy) -> RunOutcome {
        RunOutcome::Ok
    }

    /// Called repeatedly while `ACTIVE` (§4.7). The default exits
    /// immediately, matching the original's `iSvc::process` default of
    /// `RunStatus::DONE`.
    fn process(&self, _proxy: &AppFwProxy) -> RunOutcome {
        RunOutcome::Done
    }

    /// Called once on the way out of `ACTIVE` (§4.7).
    fn post_run_cleanup(&self, _proxy: &AppFwProxy) -> RunOutcome {
        RunOutcome::Ok
    }
}

/// Object-safe view of a service, for the child registry and the executor
/// to hold heterogeneous services behind one `Arc<dyn ServiceHandle>`.
pub trait ServiceHandle: Send + Sync {
    fn id(&self) -> u8;
    fn name(&self) -> &str;
    fn is_init(&self) -> bool;
    fn is_started(&self) -> bool;
    fn init(&self) -> EtfwStatus;
    fn start(&self) -> EtfwStatus;
    fn stop(&self) -> EtfwStatus;
    fn cleanup(&self) -> EtfwStatus;
}

/// A bounded set of child services (§4.8's "bounded registry of child
/// services"), capacity `N` fixed at compile time (`max_child_services`,
/// §6).
struct ChildRegistry<const N: usize> {
    children: Mutex<Vec<Arc<dyn ServiceHandle>>>,
}

impl<const N: usize> ChildRegistry<N> {
    fn new() -> Self {
        Self {
            children: Mutex::new(Vec::new()),
        }
    }
}

/// Object-safe view of a [`ChildRegistry`], independent of its capacity
/// `N` — the same erasure [`etfw_msg::MessageBus`] applies to `Broker`, so
/// `AppFwProxy` doesn't carry `max_child_services` in its own type.
trait ChildSet: Send + Sync {
    fn register(&self, child: Arc<dyn ServiceHandle>) -> EtfwStatus;
    fn stop_all(&self);
    fn snapshot(&self) -> Vec<Arc<dyn ServiceHandle>>;
}

impl<const N: usize> ChildSet for ChildRegistry<N> {
    /// Registration is idempotent (§4.8): re-registering an id already
    /// present succeeds without inserting a duplicate.
    fn register(&self, child: Arc<dyn ServiceHandle>) -> EtfwStatus {
        let mut children = self.children.lock().unwrap();
        if children.iter().any(|c| c.id() == child.id()) {
            return EtfwStatus::ok_status();
        }
        if children.len() >= N {
            return Status::new(Code::RegistryFull);
        }
        children.push(child);
        EtfwStatus::ok_status()
    }

    /// Stops every child in registration order, each call blocking until
    /// that child has fully left `ACTIVE` (§4.7) before moving to the
    /// next — the runner's `stop_children` responsibility.
    fn stop_all(&self) {
        let children = self.children.lock().unwrap().clone();
        for child in children.iter() {
            if child.is_started() {
                child.stop();
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ServiceHandle>> {
        self.children.lock().unwrap().clone()
    }
}

/// The capability handed to user code inside a service (§4.8): narrow on
/// purpose, so `ServiceLogic` implementations depend on this interface and
/// not on the whole `Service`.
pub struct AppFwProxy {
    bus: Arc<dyn MessageBus>,
    log: Arc<dyn LogSink>,
    children: Arc<dyn ChildSet>,
    caller: String,
}

impl AppFwProxy {
    fn new(bus: Arc<dyn MessageBus>, log: Arc<dyn LogSink>, children: Arc<dyn ChildSet>, caller: String) -> Self {
        Self { bus, log, children, caller }
    }

    /// Registers a child service (idempotently, §4.8) without starting it.
    pub fn register_child(&self, child: Arc<dyn ServiceHandle>) -> EtfwStatus {
        self.children.register(child)
    }

    /// Registers the child (idempotently) and starts it (§4.8).
    pub fn start_child(&self, child: Arc<dyn ServiceHandle>) -> EtfwStatus {
        let status = self.children.register(child.clone());
        if status.is_error() {
            return status;
        }
        child.start()
    }

    pub fn subscribe(&self, pipe: Arc<dyn Pipe>) {
        self.bus.register_pipe(pipe);
    }

    pub fn unsubscribe(&self, pipe: &Arc<dyn Pipe>) {
        self.bus.unregister_pipe(pipe);
    }

    pub fn get_message_buf(&self, size: usize) -> Option<etfw_msg::Buffer> {
        self.bus.get_message_buf(size)
    }

    pub fn return_message_buf(&self, buf: etfw_msg::Buffer) {
        self.bus.return_message_buf(buf);
    }

    pub fn send_buf(&self, buf: etfw_msg::Buffer) -> EtfwStatus {
        self.bus.send_buf(buf)
    }

    pub fn log(&self, level: Level, message: &str) {
        self.log.log(level, &self.caller, message);
    }
}

struct HookAdapter<L: ServiceLogic> {
    logic: Arc<L>,
    proxy: Arc<AppFwProxy>,
}

impl<L: ServiceLogic> RunnerHooks for HookAdapter<L> {
    fn pre_run_init(&self) -> RunOutcome {
        self.logic.pre_run_init(&self.proxy)
    }

    fn process(&self) -> RunOutcome {
        self.logic.process(&self.proxy)
    }

    fn post_run_cleanup(&self) -> RunOutcome {
        self.logic.post_run_cleanup(&self.proxy)
    }

    fn stop_children(&self) {
        self.proxy.children.stop_all();
    }
}

/// A named, identified service (§4.8): owns a runner (behind `Arc<dyn
/// Runner>`, so passive and active variants share one `Service` type), a
/// bounded child registry, and the `AppFwProxy` its logic is driven with.
pub struct Service<L: ServiceLogic + 'static, const MAX_CHILDREN: usize> {
    id: u8,
    name: String,
    is_init: Mutex<bool>,
    is_started: Mutex<bool>,
    runner: Arc<dyn Runner>,
    proxy: Arc<AppFwProxy>,
    logic: Arc<L>,
}

impl<L: ServiceLogic + 'static, const MAX_CHILDREN: usize> Service<L, MAX_CHILDREN> {
    /// A passive service: `start`/`stop` run the lifecycle hooks
    /// synchronously on the caller's thread; `process` must be driven
    /// externally via [`Service::drive_once`].
    pub fn new_passive(
        id: u8,
        name: impl Into<String>,
        logic: Arc<L>,
        bus: Arc<dyn MessageBus>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let name = name.into();
        let children: Arc<dyn ChildSet> = Arc::new(ChildRegistry::<MAX_CHILDREN>::new());
        let proxy = Arc::new(AppFwProxy::new(bus, log, children, name.clone()));
        let adapter = Arc::new(HookAdapter {
            logic: logic.clone(),
            proxy: proxy.clone(),
        });
        Self {
            id,
            name,
            is_init: Mutex::new(false),
            is_started: Mutex::new(false),
            runner: Arc::new(crate::runner::PassiveRunner::new(adapter)),
            proxy,
            logic,
        }
    }

    /// An active service: `start` spawns a dedicated OS thread (§4.7) with
    /// the given fixed `stack_size`/`priority`.
    pub fn new_active(
        id: u8,
        name: impl Into<String>,
        logic: Arc<L>,
        bus: Arc<dyn MessageBus>,
        log: Arc<dyn LogSink>,
        stack_size: usize,
        priority: u8,
    ) -> Self {
        let name = name.into();
        let children: Arc<dyn ChildSet> = Arc::new(ChildRegistry::<MAX_CHILDREN>::new());
        let proxy = Arc::new(AppFwProxy::new(bus, log, children, name.clone()));
        let adapter = Arc::new(HookAdapter {
            logic: logic.clone(),
            proxy: proxy.clone(),
        });
        Self {
            id,
            name,
            is_init: Mutex::new(false),
            is_started: Mutex::new(false),
            runner: Arc::new(crate::runner::ActiveRunner::new(adapter, stack_size, priority)),
            proxy,
            logic,
        }
    }

    pub fn proxy(&self) -> &Arc<AppFwProxy> {
        &self.proxy
    }

    pub fn runner_state(&self) -> RunnerState {
        self.runner.state()
    }

    pub fn children(&self) -> Vec<Arc<dyn ServiceHandle>> {
        self.proxy.children.snapshot()
    }

    /// Drives one `process` iteration of a passive service's run loop.
    /// A no-op for active services (their own thread drives `process`).
    pub fn drive_once(&self) {
        self.runner.drive_once();
    }
}

impl<L: ServiceLogic + 'static, const MAX_CHILDREN: usize> ServiceHandle for Service<L, MAX_CHILDREN> {
    fn id(&self) -> u8 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_init(&self) -> bool {
        *self.is_init.lock().unwrap()
    }

    fn is_started(&self) -> bool {
        *self.is_started.lock().unwrap()
    }

    fn init(&self) -> EtfwStatus {
        let mut is_init = self.is_init.lock().unwrap();
        if *is_init {
            return Status::new(Code::AlreadyInit);
        }
        let status = self.logic.on_init(&self.proxy);
        if status.is_error() {
            return status;
        }
        let runner_status = self.runner.init();
        if runner_status.is_error() {
            return runner_status;
        }
        *is_init = true;
        EtfwStatus::ok_status()
    }

    fn start(&self) -> EtfwStatus {
        if !*self.is_init.lock().unwrap() {
            return Status::new(Code::UninitErr);
        }
        let mut is_started = self.is_started.lock().unwrap();
        if *is_started {
            return Status::new(Code::AlreadyStarted);
        }
        let status = self.runner.start();
        if status.ok() {
            *is_started = true;
        }
        status
    }

    fn stop(&self) -> EtfwStatus {
        let mut is_started = self.is_started.lock().unwrap();
        if !*is_started {
            return Status::new(Code::Stopped);
        }
        let status = self.runner.stop();
        *is_started = false;
        status
    }

    fn cleanup(&self) -> EtfwStatus {
        if *self.is_started.lock().unwrap() {
            return Status::new(Code::AlreadyStarted);
        }
        let status = self.logic.on_cleanup(&self.proxy);
        *self.is_init.lock().unwrap() = false;
        status
    }
}
