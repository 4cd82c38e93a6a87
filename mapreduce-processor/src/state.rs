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

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use mapreduce_util::task::JoinHandleDropGuard;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

use crate::action::ActionRegistry;
use crate::sink::SinkFn;
use crate::task::{TaskData, TaskId, TaskState};

/// Everything an in-flight executor owns on behalf of the state manager: a
/// token the state manager can flip to ask it to stop, and a drop guard so
/// the task is aborted if the processor itself is torn down uncleanly.
pub(crate) struct RunningTask {
    pub(crate) cancel: CancellationToken,
    pub(crate) _join: JoinHandleDropGuard<()>,
}

/// The active scheduler loop's handle, present iff `start()` has been
/// called and not yet followed by a matching `stop()`.
pub(crate) struct SchedulerHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) join: JoinHandleDropGuard<()>,
}

/// The processor's shared mutable state, held behind a single
/// `async_lock::Mutex` so every field transition is serialized. Holding this
/// lock must never block on I/O or invoke a sink or action; the drain phase
/// releases it before calling sinks, and executors only touch it at their
/// initial dispatch and final outcome-posting suspension points.
pub(crate) struct Inner {
    pub(crate) queue: VecDeque<TaskData>,
    pub(crate) running: HashMap<TaskId, RunningTask>,
    pub(crate) completed: HashMap<TaskId, TaskData>,
    pub(crate) errored: HashMap<TaskId, TaskData>,
    pub(crate) registry: ActionRegistry,
    pub(crate) max_concurrent: usize,
    pub(crate) tick_period: Duration,
    pub(crate) max_action_name_len: Option<usize>,
    pub(crate) completed_sink: SinkFn,
    pub(crate) error_sink: SinkFn,
    pub(crate) scheduler: Option<SchedulerHandle>,
}

/// What happened to a task handed to [`Inner::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitOutcome {
    Enqueued,
    Duplicate,
    ActionNameTooLong,
}

impl Inner {
    /// True if `id` is already known to the processor (queued, running, or
    /// sitting undelivered in a terminal set). Submitting a duplicate of any
    /// of these is a no-op.
    fn is_known(&self, id: TaskId) -> bool {
        self.queue.iter().any(|t| t.id == id)
            || self.running.contains_key(&id)
            || self.completed.contains_key(&id)
            || self.errored.contains_key(&id)
    }

    /// `submitTask`: append to the queue tail unless `id` is already queued
    /// or running, or the action name exceeds the configured limit. Never
    /// fails outright; the caller turns the returned outcome into metrics
    /// and logging.
    pub(crate) fn submit(&mut self, mut task: TaskData) -> SubmitOutcome {
        // Duplicate suppression covers queued/running only; a task sitting
        // in a terminal set undelivered is a different id-occupied state
        // and does not block re-submission of a *new* record with the
        // same id once it has actually left the processor. We still treat
        // it as "known", so check all four collections here.
        if self.is_known(task.id) {
            return SubmitOutcome::Duplicate;
        }
        if let Some(limit) = self.max_action_name_len {
            if task.action.len() > limit {
                return SubmitOutcome::ActionNameTooLong;
            }
        }
        task.state = TaskState::Queued;
        self.queue.push_back(task);
        SubmitOutcome::Enqueued
    }

    /// `stopTask`: removes `id` from the queue and/or running map and
    /// returns the cancellation token to signal, if any. Terminal sets are
    /// untouched (a task already finished is not "stopped", it is simply
    /// waiting on its sink).
    pub(crate) fn stop_task(&mut self, id: TaskId) -> bool {
        let was_queued = {
            let before = self.queue.len();
            self.queue.retain(|t| t.id != id);
            self.queue.len() != before
        };
        let removed_running = self.running.remove(&id);
        if let Some(running) = &removed_running {
            running.cancel.cancel();
        }
        was_queued || removed_running.is_some()
    }

    /// `listTaskIds`: union of queue ids and running ids, unspecified order.
    pub(crate) fn list_task_ids(&self) -> Vec<TaskId> {
        self.queue
            .iter()
            .map(|t| t.id)
            .chain(self.running.keys().copied())
            .collect()
    }

    /// Phase A (admission): pops queue-head tasks while under the
    /// concurrency cap and returns them for the caller to spawn executors
    /// for, already marked `Running` and already reserving their slot in
    /// `running` (the caller fills in the real `RunningTask` once the
    /// executor is spawned: a queued task never has a handle, a running one
    /// always does by the time this function returns control).
    pub(crate) fn admit_ready(&mut self) -> Vec<TaskData> {
        let mut admitted = Vec::new();
        while self.running.len() + admitted.len() < self.max_concurrent {
            let Some(mut task) = self.queue.pop_front() else {
                break;
            };
            task.state = TaskState::Running;
            admitted.push(task);
        }
        admitted
    }

    /// Records that an executor has been spawned for `task`, completing the
    /// admission started by [`Inner::admit_ready`].
    pub(crate) fn mark_running(&mut self, id: TaskId, running: RunningTask) {
        self.running.insert(id, running);
    }

    /// Phase B (drain, step 1): atomically takes the terminal sets, leaving
    /// empty ones behind, so sinks can be invoked with the lock released.
    pub(crate) fn take_terminal_sets(
        &mut self,
    ) -> (HashMap<TaskId, TaskData>, HashMap<TaskId, TaskData>) {
        (std::mem::take(&mut self.completed), std::mem::take(&mut self.errored))
    }

    /// Phase B (drain, step 2): re-inserts a task whose sink returned
    /// "not delivered" back into the terminal set it came from, to be
    /// retried next tick.
    pub(crate) fn retain_undelivered(&mut self, task: TaskData) {
        match task.state {
            TaskState::Completed => {
                self.completed.insert(task.id, task);
            }
            TaskState::Errored => {
                self.errored.insert(task.id, task);
            }
            other => {
                event!(
                    Level::ERROR,
                    task_id = ?task.id,
                    state = ?other,
                    "retain_undelivered called with a task that was not in a terminal state"
                );
            }
        }
    }

    /// Posts an executor's outcome. If `id` is no longer in `running` the
    /// task was already removed by a racing `stopTask`; the outcome
    /// is discarded rather than resurrected into a terminal set.
    pub(crate) fn post_outcome(&mut self, mut task: TaskData, succeeded: bool) -> bool {
        if self.running.remove(&task.id).is_none() {
            return false;
        }
        task.state = if succeeded { TaskState::Completed } else { TaskState::Errored };
        if succeeded {
            self.completed.insert(task.id, task);
        } else {
            self.errored.insert(task.id, task);
        }
        true
    }
}
