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

//! On-disk configuration for the worker-node task processor.
//!
//! Loaded once at process start (via `serde_json5`) and handed to
//! `mapreduce_processor::Processor::new`. There is no hot-reload; changing
//! the registry at runtime goes through `setMapActions`/`setReduceActions`,
//! not this config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a single worker's task processor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Maximum number of tasks the scheduler loop will admit into `running`
    /// at once. Must be greater than zero; a value of zero is rejected at
    /// load time and replaced with the default.
    ///
    /// Default: 1
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// How long the scheduler loop sleeps at the end of each tick (Phase C).
    /// Accepts human-readable durations like `"1ms"`, `"250ms"`, `"2s"`.
    ///
    /// Default: 1ms
    #[serde(default = "default_tick_period", with = "humantime_duration")]
    pub tick_period: Duration,

    /// If set, `submitTask` rejects (logs and drops) any task whose
    /// `action` name is longer than this many bytes. Carried here as an
    /// operator safety valve; left unset (`None`) there is no limit.
    #[serde(default)]
    pub max_action_name_len: Option<usize>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            tick_period: default_tick_period(),
            max_action_name_len: None,
        }
    }
}

impl ProcessorConfig {
    /// Normalizes out-of-range values rather than failing config load; a
    /// misconfigured `max_concurrent = 0` should not prevent the worker
    /// from starting, it should just fall back to the documented default.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.max_concurrent == 0 {
            self.max_concurrent = default_max_concurrent();
        }
        self
    }
}

const fn default_max_concurrent() -> usize {
    1
}

const fn default_tick_period() -> Duration {
    Duration::from_millis(1)
}

/// `serde(with = ...)` helper for (de)serializing a [`Duration`] as a
/// `humantime`-formatted string, the same convention the rest of the
/// backend config blocks use for any field measured in wall-clock time.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
