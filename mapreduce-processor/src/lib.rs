// Copyright 2024 The NativeLink Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The worker-node task processor: enqueues, schedules, executes, cancels,
//! and reports the outcome of map/combine/reduce tasks dispatched by a
//! central controller, keeping a bounded number of tasks running
//! concurrently and surviving per-task failures without tearing down the
//! worker.
//!
//! The wire protocol that delivers tasks to the worker, the filesystem
//! actions use to fetch inputs and write outputs, and cross-restart
//! persistence are all out of scope; [`Processor`] is an in-memory,
//! restart-ephemeral, in-process component.

mod action;
mod errors;
mod executor;
mod metrics;
mod processor;
mod scheduler;
mod sink;
mod state;
mod task;

pub use action::{action_fn, ActionFn, ActionRegistry, MapAction, ReduceAction};
pub use processor::Processor;
pub use sink::{noop_sink, sink_fn, SinkFn};
pub use task::{ActionName, Blob, TaskData, TaskId, TaskState, TaskType};
