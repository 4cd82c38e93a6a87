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

use std::collections::HashMap;
use std::sync::Arc;

use async_lock::Mutex;
use mapreduce_config::ProcessorConfig;
use mapreduce_util::metrics::Collector;
use mapreduce_util::metrics::MetricsComponent as _;
use mapreduce_util::spawn;
use mapreduce_util::task::JoinHandleDropGuard;
use tokio_util::sync::CancellationToken;

use crate::action::{ActionRegistry, MapAction, ReduceAction};
use crate::metrics::Metrics;
use crate::scheduler;
use crate::sink::{noop_sink, SinkFn};
use crate::state::{Inner, SchedulerHandle, SubmitOutcome};
use crate::task::{TaskData, TaskId};

/// An explicitly constructed processor owning its own state behind a
/// mutex: there is no hidden singleton, every
/// worker that needs one constructs and holds its own `Processor`.
///
/// Cloning a `Processor` is cheap and shares the same underlying state
/// (`Arc` internally), which is the normal way to hand a handle to code
/// that needs to call `submitTask`/`stopTask` from outside the owner.
#[derive(Clone)]
pub struct Processor {
    inner: Arc<Mutex<Inner>>,
    metrics: Arc<Metrics>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl Processor {
    /// Fresh processor: empty queue and terminal sets, both sinks as
    /// no-ops, scheduler inactive. Configuration comes from `config`
    /// (normalized so a misconfigured `max_concurrent = 0` cannot wedge the
    /// processor at construction time).
    #[must_use]
    pub fn new(config: ProcessorConfig) -> Self {
        let config = config.normalized();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queue: Default::default(),
                running: HashMap::new(),
                completed: HashMap::new(),
                errored: HashMap::new(),
                registry: ActionRegistry::new(),
                max_concurrent: config.max_concurrent,
                tick_period: config.tick_period,
                max_action_name_len: config.max_action_name_len,
                completed_sink: noop_sink(),
                error_sink: noop_sink(),
                scheduler: None,
            })),
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Replaces the map-action registry wholesale. Tasks already dispatched
    /// to an executor keep using the action reference they resolved at
    /// dispatch time; this only affects future admissions.
    pub async fn set_map_actions(&self, actions: Vec<MapAction>) {
        let mut guard = self.inner.lock().await;
        guard.registry.set_map_actions(actions);
        self.metrics.registry_replacements.inc();
    }

    /// Replaces the reduce-action registry wholesale (also used by
    /// `Combine` tasks).
    pub async fn set_reduce_actions(&self, actions: Vec<ReduceAction>) {
        let mut guard = self.inner.lock().await;
        guard.registry.set_reduce_actions(actions);
        self.metrics.registry_replacements.inc();
    }

    #[must_use]
    pub async fn list_map_actions(&self) -> Vec<MapAction> {
        self.inner.lock().await.registry.list_map_actions()
    }

    #[must_use]
    pub async fn list_reduce_actions(&self) -> Vec<ReduceAction> {
        self.inner.lock().await.registry.list_reduce_actions()
    }

    /// Replaces the completion sink. Callable whether or not the scheduler
    /// is currently running.
    pub async fn set_completed_sink(&self, sink: SinkFn) {
        self.inner.lock().await.completed_sink = sink;
    }

    /// Replaces the error sink. Callable whether or not the scheduler is
    /// currently running.
    pub async fn set_error_sink(&self, sink: SinkFn) {
        self.inner.lock().await.error_sink = sink;
    }

    /// Idempotent: if the scheduler loop is already active this is a no-op.
    pub async fn start(&self) {
        let mut guard = self.inner.lock().await;
        if guard.scheduler.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let join: JoinHandleDropGuard<()> = spawn!(
            "mapreduce_scheduler_loop",
            scheduler::run(self.inner.clone(), self.metrics.clone(), cancel.clone())
        );
        guard.scheduler = Some(SchedulerHandle { cancel, join });
    }

    /// Idempotent: if the scheduler loop is already inactive this is a
    /// no-op. Does not cancel running tasks; in-flight executors run to
    /// completion and post their outcomes into the now-static state, which
    /// can be read afterwards with `list_task_ids`/the terminal sets.
    pub async fn stop(&self) {
        let handle = {
            let mut guard = self.inner.lock().await;
            guard.scheduler.take()
        };
        let Some(handle) = handle else { return };
        handle.cancel.cancel();
        // Yield so the loop actually observes the cancellation and returns
        // before we drop (and thus could abort) its handle.
        let _ = handle.join.await;
    }

    /// Alias for [`Processor::stop`].
    pub async fn close(&self) {
        self.stop().await;
    }

    /// Enqueues `task` unless a task with the same id is already known
    /// (queued, running, or waiting undelivered in a terminal set), or its
    /// action name exceeds the configured `max_action_name_len`.
    pub async fn submit_task(&self, task: TaskData) {
        let id = task.id;
        let action_len = task.action.len();
        let mut guard = self.inner.lock().await;
        match guard.submit(task) {
            SubmitOutcome::Enqueued => {
                self.metrics.tasks_submitted.inc();
            }
            SubmitOutcome::Duplicate => {
                self.metrics.tasks_duplicate_submit.inc();
                drop(guard);
                tracing::event!(tracing::Level::DEBUG, task_id = ?id, "submit_task ignored duplicate");
            }
            SubmitOutcome::ActionNameTooLong => {
                self.metrics.tasks_rejected_action_name_too_long.inc();
                drop(guard);
                tracing::event!(
                    tracing::Level::WARN,
                    task_id = ?id,
                    action_len,
                    "submit_task rejected: action name exceeds configured limit"
                );
            }
        }
    }

    /// Removes `id` from the queue and/or running map, and asynchronously
    /// signals its executor (if any) to cancel. The eventual outcome, if
    /// the executor manages to produce one anyway, is discarded.
    pub async fn stop_task(&self, id: TaskId) {
        let mut guard = self.inner.lock().await;
        if guard.stop_task(id) {
            self.metrics.tasks_cancelled.inc();
        }
    }

    /// Snapshots the currently known task ids and calls `stop_task` on
    /// each. Tasks submitted concurrently with this call may or may not be
    /// stopped.
    pub async fn stop_all_tasks(&self) {
        let ids = self.list_task_ids().await;
        for id in ids {
            self.stop_task(id).await;
        }
    }

    /// Union of queue ids and running ids, unordered.
    #[must_use]
    pub async fn list_task_ids(&self) -> Vec<TaskId> {
        self.inner.lock().await.list_task_ids()
    }

    /// Diagnostic rendering; no contract on format.
    #[must_use]
    pub async fn describe(&self) -> String {
        let guard = self.inner.lock().await;
        let mut collector = Collector::new();
        self.metrics.gather_metrics(&mut collector);
        format!(
            "Processor {{ queued: {}, running: {}, completed_undelivered: {}, errored_undelivered: {}, scheduler_active: {} }}\n{}",
            guard.queue.len(),
            guard.running.len(),
            guard.completed.len(),
            guard.errored.len(),
            guard.scheduler.is_some(),
            collector,
        )
    }
}
