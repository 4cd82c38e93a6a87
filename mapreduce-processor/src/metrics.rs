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

use mapreduce_util::metrics::{Collector, Counter, MetricsComponent};

/// Counters for the handful of events worth tracking at this layer.
/// Surfaced through `describe()`; there is no exporter wired up.
#[derive(Debug, Default)]
pub struct Metrics {
    pub tasks_submitted: Counter,
    pub tasks_duplicate_submit: Counter,
    pub tasks_rejected_action_name_too_long: Counter,
    pub tasks_admitted: Counter,
    pub tasks_completed: Counter,
    pub tasks_errored: Counter,
    pub tasks_retried_by_sink: Counter,
    pub tasks_cancelled: Counter,
    pub registry_replacements: Counter,
    pub scheduler_panics: Counter,
}

impl MetricsComponent for Metrics {
    fn gather_metrics(&self, c: &mut Collector) {
        c.publish("tasks_submitted", &self.tasks_submitted);
        c.publish("tasks_duplicate_submit", &self.tasks_duplicate_submit);
        c.publish(
            "tasks_rejected_action_name_too_long",
            &self.tasks_rejected_action_name_too_long,
        );
        c.publish("tasks_admitted", &self.tasks_admitted);
        c.publish("tasks_completed", &self.tasks_completed);
        c.publish("tasks_errored", &self.tasks_errored);
        c.publish("tasks_retried_by_sink", &self.tasks_retried_by_sink);
        c.publish("tasks_cancelled", &self.tasks_cancelled);
        c.publish("registry_replacements", &self.registry_replacements);
        c.publish("scheduler_panics", &self.scheduler_panics);
    }
}
