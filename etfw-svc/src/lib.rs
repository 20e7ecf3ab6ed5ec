// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The service layer (§2.G–I of `SPEC_FULL.md`): the runner state machine,
//! the service/child-registry hierarchy with its `AppFwProxy` capability,
//! and the top-level executor.

pub mod executor;
pub mod runner;
pub mod service;

pub use executor::Executor;
pub use runner::{ActiveRunner, PassiveRunner, RunOutcome, Runner, RunnerHooks, RunnerState};
pub use service::{AppFwProxy, Service, ServiceHandle, ServiceLogic};
