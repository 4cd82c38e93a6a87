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

//! The single long-lived activity that admits queued tasks and drains
//! terminal sets. There is at most one of these per [`crate::Processor`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_lock::Mutex;
use futures::FutureExt;
use mapreduce_util::spawn;
use mapreduce_util::task::JoinHandleDropGuard;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

use crate::executor;
use crate::metrics::Metrics;
use crate::state::{Inner, RunningTask};
use crate::task::{TaskData, TaskId};

/// Phase A: greedily admits as many queued tasks as fit under
/// `max_concurrent`, spawning an executor for each while still holding the
/// lock so the `running` insert and the spawn are atomic from any other
/// operation's point of view.
async fn admit(inner: &Arc<Mutex<Inner>>, metrics: &Arc<Metrics>) {
    let mut guard = inner.lock().await;
    let ready = guard.admit_ready();
    for task in ready {
        let id = task.id;
        let registry = guard.registry.clone();
        let cancel = CancellationToken::new();
        let join: JoinHandleDropGuard<()> = spawn!(
            "mapreduce_task_executor",
            executor::run(task, registry, cancel.clone(), inner.clone(), metrics.clone())
        );
        guard.mark_running(id, RunningTask { cancel, _join: join });
        metrics.tasks_admitted.inc();
    }
}

/// Phase B: drains `completed`/`errored`, invokes the matching sink for
/// each task with the lock released, and re-queues the ones the sink
/// rejected for another attempt next tick.
async fn drain(inner: &Arc<Mutex<Inner>>, metrics: &Arc<Metrics>) {
    let (completed_sink, error_sink, completed, errored) = {
        let mut guard = inner.lock().await;
        let (completed, errored) = guard.take_terminal_sets();
        (guard.completed_sink.clone(), guard.error_sink.clone(), completed, errored)
    };

    let mut undelivered: Vec<TaskData> = Vec::new();
    for (_, task) in completed {
        if !deliver(&completed_sink, task.clone()).await {
            undelivered.push(task);
        }
    }
    for (_, task) in errored {
        if !deliver(&error_sink, task.clone()).await {
            undelivered.push(task);
        }
    }

    if undelivered.is_empty() {
        return;
    }
    let mut guard = inner.lock().await;
    for task in undelivered {
        metrics.tasks_retried_by_sink.inc();
        guard.retain_undelivered(task);
    }
}

async fn deliver(sink: &crate::sink::SinkFn, task: TaskData) -> bool {
    let id: TaskId = task.id;
    match AssertUnwindSafe(sink(task)).catch_unwind().await {
        Ok(delivered) => delivered,
        Err(_panic) => {
            event!(Level::WARN, task_id = ?id, "sink panicked, treating outcome as not delivered");
            false
        }
    }
}

/// The scheduler loop body: Admission, then Drain, then Idle, repeated
/// until `cancel` is signalled. The cooperative flag check happens at the
/// top of every tick so a `stop()` mid-tick lets the current tick finish
/// cleanly before the loop exits.
pub(crate) async fn run(inner: Arc<Mutex<Inner>>, metrics: Arc<Metrics>, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        // Phase A and B must never let a panic inside a sink or an
        // executor's spawn setup escape the loop; catch and log instead.
        if let Err(_panic) = AssertUnwindSafe(admit(&inner, &metrics)).catch_unwind().await {
            metrics.scheduler_panics.inc();
            event!(Level::ERROR, "panic in scheduler admission phase, continuing");
        }
        if let Err(_panic) = AssertUnwindSafe(drain(&inner, &metrics)).catch_unwind().await {
            metrics.scheduler_panics.inc();
            event!(Level::ERROR, "panic in scheduler drain phase, continuing");
        }

        let tick_period = inner.lock().await.tick_period;
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(tick_period) => {}
        }
    }
}
