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

use std::fmt;

/// Opaque bytes passed between the controller, the queue, and action code.
/// The processor never inspects the contents.
pub type Blob = Vec<u8>;

/// The name an action is registered under in an [`crate::action::ActionRegistry`].
pub type ActionName = String;

/// Identifies a task. Minted by the controller before `submitTask`; the
/// processor never generates one itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The kind of work a task represents. `Combine` and `Reduce` both dispatch
/// against the reduce-action registry (combine is a pre-reduce using the
/// same action surface); only `Map` dispatches against the map-action
/// registry. `Other` exists so a task type outside the closed set the
/// executor understands can still be represented and routed to
/// `UnknownTaskType` rather than rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskType {
    Map,
    Combine,
    Reduce,
    /// Carries the unrecognized tag verbatim for diagnostics.
    Other(String),
}

/// Derived from which collection currently holds the task; never stored as
/// a second source of truth alongside the collections themselves. The
/// processor updates it on every container transition so a `TaskData`
/// handed to a sink carries an accurate snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Errored,
}

/// The unit of work moved through the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskData {
    pub id: TaskId,
    pub task_type: TaskType,
    pub action: ActionName,
    pub input: Blob,
    pub output: Blob,
    pub state: TaskState,
}

impl TaskData {
    /// Constructs a freshly submitted task. `output` starts empty and
    /// `state` starts `Queued`; both are mutated in place as the task moves
    /// through the processor.
    #[must_use]
    pub fn new(id: TaskId, task_type: TaskType, action: impl Into<ActionName>, input: Blob) -> Self {
        Self {
            id,
            task_type,
            action: action.into(),
            input,
            output: Blob::new(),
            state: TaskState::Queued,
        }
    }
}
