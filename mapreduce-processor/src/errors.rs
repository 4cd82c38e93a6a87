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

//! Constructors for the executor's error taxonomy. None of these ever
//! cross the processor's public API surface; they only ever flow into the
//! error sink via the task's terminal state, or into a `tracing` event for
//! the internal-invariant cases.

use mapreduce_error::{make_err, make_input_err, Code, Error};

use crate::task::TaskType;

/// The executor was asked to run a task whose type it does not dispatch
/// (anything other than `Map`/`Combine`/`Reduce`).
pub(crate) fn unknown_task_type(task_type: &TaskType) -> Error {
    make_input_err!("Unknown task type: {:?}", task_type)
}

/// The user-supplied action raised/panicked while executing.
pub(crate) fn action_failure(action: &str, cause: impl std::fmt::Display) -> Error {
    make_err!(Code::Aborted, "Action '{}' failed: {}", action, cause)
}

/// An internal invariant was violated (eg. a task reported finished but was
/// not found in `running`). Logged at `ERROR`, never panicked: one bad task
/// must not corrupt the whole worker.
pub(crate) fn internal_invariant(message: impl std::fmt::Display) -> Error {
    make_err!(Code::Internal, "{}", message)
}
