// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Executor (§4.9): the top-level registry that initializes and starts
//! every registered service, best-effort.
//!
//! Grounded on `examples/original_source/inc/etfw/svcs/Executor.hpp` and
//! `src/svcs/Executor.cpp`'s `iExecutor`/`Executor<MAX_NUM_APPS>`. The
//! original's `etl::list` fixed-capacity container becomes a `Vec` guarded
//! by capacity `N`, matching `ChildRegistry`'s approach in `service.rs`.

use std::sync::{Arc, Mutex};

use etfw_core::log::{Level, LogSink};
use etfw_core::status::{Code, EtfwStatus, Status};

use crate::service::ServiceHandle;

/// Fixed-capacity registry of top-level services (§4.9). `N` is the
/// executor's registration capacity.
pub struct Executor<const N: usize> {
    services: Mutex<Vec<Arc<dyn ServiceHandle>>>,
    log: Arc<dyn LogSink>,
}

impl<const N: usize> Executor<N> {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            services: Mutex::new(Vec::new()),
            log,
        }
    }

    /// `register(service)` (§4.9): inserts once; duplicate ids are
    /// `ID_TAKEN`, a full registry is `REGISTRY_FULL`.
    pub fn register(&self, service: Arc<dyn ServiceHandle>) -> EtfwStatus {
        let mut services = self.services.lock().unwrap();
        if services.iter().any(|s| s.id() == service.id()) {
            return Status::new(Code::IdTaken);
        }
        if services.len() >= N {
            return Status::new(Code::RegistryFull);
        }
        services.push(service);
        EtfwStatus::ok_status()
    }

    /// `start_all()` (§4.9): iterates in registration order, calling
    /// `init` then `start` as needed. Per-service failures are logged and
    /// do not abort the loop.
    pub fn start_all(&self) -> EtfwStatus {
        let services = self.services.lock().unwrap().clone();
        for svc in services.iter() {
            self.start_one(svc);
        }
        EtfwStatus::ok_status()
    }

    /// `start(id)` (§4.9): the same per-service semantics as `start_all`,
    /// targeted at one registered id.
    pub fn start(&self, id: u8) -> EtfwStatus {
        let svc = self.find(id);
        match svc {
            Some(svc) => {
                self.start_one(&svc);
                EtfwStatus::ok_status()
            }
            None => Status::new(Code::UnknownId),
        }
    }

    /// `stop(id)` (§4.9).
    pub fn stop(&self, id: u8) -> EtfwStatus {
        match self.find(id) {
            Some(svc) => svc.stop(),
            None => Status::new(Code::UnknownId),
        }
    }

    /// `stop_all()` (§4.9): iterates in registration order, stopping only
    /// services that are currently started.
    pub fn stop_all(&self) {
        let services = self.services.lock().unwrap().clone();
        for svc in services.iter() {
            if svc.is_started() {
                svc.stop();
            }
        }
    }

    fn find(&self, id: u8) -> Option<Arc<dyn ServiceHandle>> {
        self.services.lock().unwrap().iter().find(|s| s.id() == id).cloned()
    }

    fn start_one(&self, svc: &Arc<dyn ServiceHandle>) {
        if !svc.is_init() {
            let status = svc.init();
            if status.is_error() {
                self.log.log(
                    Level::Error,
                    "executor",
                    &format!("{} failed to initialize: {}", svc.name(), status.message()),
                );
                return;
            }
        }
        if !svc.is_started() {
            let status = svc.start();
            if status.is_error() {
                self.log.log(
                    Level::Error,
                    "executor",
                    &format!("{} failed to start: {}", svc.name(), status.message()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etfw_core::log::{Logger, NullWritePolicy};
    use etfw_core::status::Code;
    use etfw_msg::{Broker, MessageBus};

    use crate::service::{Service, ServiceLogic};

    struct NoOp;
    impl ServiceLogic for NoOp {}

    fn harness() -> (Arc<dyn MessageBus>, Arc<dyn LogSink>) {
        let bus: Arc<dyn MessageBus> = Arc::new(Broker::<4>::new());
        let log: Arc<dyn LogSink> = Arc::new(Logger::new((NullWritePolicy,)));
        (bus, log)
    }

    #[test]
    fn register_rejects_duplicate_ids_and_overflow() {
        let (bus, log) = harness();
        let exec: Executor<1> = Executor::new(log.clone());
        let a: Arc<dyn ServiceHandle> = Arc::new(Service::<NoOp, 1>::new_passive(1, "a", Arc::new(NoOp), bus.clone(), log.clone()));
        let a_dup: Arc<dyn ServiceHandle> = Arc::new(Service::<NoOp, 1>::new_passive(1, "a-dup", Arc::new(NoOp), bus.clone(), log.clone()));
        let b: Arc<dyn ServiceHandle> = Arc::new(Service::<NoOp, 1>::new_passive(2, "b", Arc::new(NoOp), bus, log));

        assert!(exec.register(a).ok());
        assert_eq!(exec.register(a_dup).code(), Code::IdTaken);
        assert_eq!(exec.register(b).code(), Code::RegistryFull);
    }

    #[test]
    fn start_all_initializes_and_starts_every_service_best_effort() {
        let (bus, log) = harness();
        let exec: Executor<4> = Executor::new(log.clone());

        struct FailInit;
        impl ServiceLogic for FailInit {
            fn on_init(&self, _proxy: &crate::service::AppFwProxy) -> EtfwStatus {
                Status::new(Code::OsError)
            }
        }

        let good: Arc<dyn ServiceHandle> =
            Arc::new(Service::<NoOp, 1>::new_passive(1, "good", Arc::new(NoOp), bus.clone(), log.clone()));
        let bad: Arc<dyn ServiceHandle> =
            Arc::new(Service::<FailInit, 1>::new_passive(2, "bad", Arc::new(FailInit), bus, log));

        exec.register(good.clone());
        exec.register(bad.clone());

        exec.start_all();

        assert!(good.is_init());
        assert!(good.is_started());
        assert!(!bad.is_init(), "a failed init leaves the service uninitialized");
        assert!(!bad.is_started());
    }

    #[test]
    fn stop_all_stops_only_started_services() {
        let (bus, log) = harness();
        let exec: Executor<4> = Executor::new(log.clone());
        let svc: Arc<dyn ServiceHandle> =
            Arc::new(Service::<NoOp, 1>::new_passive(1, "svc", Arc::new(NoOp), bus, log));
        exec.register(svc.clone());
        exec.start_all();
        assert!(svc.is_started());

        exec.stop_all();
        assert!(!svc.is_started());

        // Second stop_all is a no-op: nothing is started, so nothing is
        // asked to stop again.
        exec.stop_all();
    }

    #[test]
    fn unknown_id_is_reported_for_targeted_operations() {
        let (_bus, log) = harness();
        let exec: Executor<2> = Executor::new(log);
        assert_eq!(exec.start(99).code(), Code::UnknownId);
        assert_eq!(exec.stop(99).code(), Code::UnknownId);
    }
}
