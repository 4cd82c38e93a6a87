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

//! The short-lived activity spawned per task. Independent of every
//! other executor and of the scheduler loop: a panic or cancellation here
//! can only ever affect this one task's outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_lock::Mutex;
use futures::FutureExt;
use mapreduce_error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

use crate::action::{ActionFn, ActionRegistry};
use crate::errors;
use crate::metrics::Metrics;
use crate::state::Inner;
use crate::task::{Blob, TaskData, TaskType};

/// What the executor resolved the task's action name to, against the
/// registry snapshot it captured at dispatch time.
enum Dispatch {
    /// The task's type is outside the closed set the executor dispatches.
    UnknownTaskType,
    /// The type was recognized but the action name was not in that half of
    /// the registry. Preserves the legacy "complete unchanged" behavior
    /// pinned as the intended behavior rather than treating it as a failure.
    MissingAction,
    Found(ActionFn),
}

fn resolve(task_type: &TaskType, action_name: &str, registry: &ActionRegistry) -> Dispatch {
    match task_type {
        TaskType::Map => registry
            .get_map_action(action_name)
            .map_or(Dispatch::MissingAction, |a| Dispatch::Found(a.action)),
        TaskType::Combine | TaskType::Reduce => registry
            .get_reduce_action(action_name)
            .map_or(Dispatch::MissingAction, |a| Dispatch::Found(a.action)),
        TaskType::Other(_) => Dispatch::UnknownTaskType,
    }
}

/// Runs exactly one task end to end and posts its outcome. Never panics out
/// of itself: any panic from the user action is caught and turned into an
/// `Errored` outcome for this task alone.
pub(crate) async fn run(
    mut task: TaskData,
    registry: ActionRegistry,
    cancel: CancellationToken,
    inner: Arc<Mutex<Inner>>,
    metrics: Arc<Metrics>,
) {
    // Step 1: yield once so the spawner's `mark_running` call has a chance
    // to land before we start doing anything observable.
    tokio::task::yield_now().await;

    if cancel.is_cancelled() {
        metrics.tasks_cancelled.inc();
        return;
    }

    let result = run_dispatched(&task, &registry, &cancel, &metrics).await;

    let succeeded = match result {
        Ok(output) => {
            task.output = output;
            true
        }
        Err(err) => {
            event!(Level::WARN, task_id = ?task.id, ?err, "task errored");
            false
        }
    };

    let mut guard = inner.lock().await;
    if guard.post_outcome(task, succeeded) {
        drop(guard);
        if succeeded {
            metrics.tasks_completed.inc();
        } else {
            metrics.tasks_errored.inc();
        }
    } else {
        // The task was removed from `running` by a racing `stopTask`
        // between our cancellation check and now; the outcome is
        // discarded per the usual cancellation semantics.
        drop(guard);
        event!(Level::DEBUG, "discarding outcome for task stopped mid-flight");
    }
}

/// Returns `None` (meaning: cancelled, discard) only by way of the select
/// below; everything else resolves to a `Result` to post.
async fn run_dispatched(
    task: &TaskData,
    registry: &ActionRegistry,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> Result<Blob, Error> {
    match resolve(&task.task_type, &task.action, registry) {
        Dispatch::UnknownTaskType => Err(errors::unknown_task_type(&task.task_type)),
        Dispatch::MissingAction => Ok(task.input.clone()),
        Dispatch::Found(action) => {
            let action_future = AssertUnwindSafe(action(1, task.input.clone())).catch_unwind();
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    metrics.tasks_cancelled.inc();
                    // The caller treats any non-post as a discard; returning
                    // an error here is safe because `post_outcome` will find
                    // the task already removed from `running` by `stopTask`
                    // and silently drop it.
                    Err(errors::internal_invariant("task cancelled mid-execution"))
                }
                result = action_future => {
                    match result {
                        Ok(Ok(output)) => Ok(output),
                        Ok(Err(action_err)) => Err(action_err),
                        Err(panic) => Err(errors::action_failure(&task.action, panic_message(&panic))),
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "action panicked with a non-string payload".to_string()
    }
}
