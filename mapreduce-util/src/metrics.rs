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

//! Lightweight, dependency-free counters for components that want
//! metrics-shaped diagnostics without pulling in a full collector/exporter
//! stack. Callers `publish()` counters into a [`Collector`] and render it
//! however they like (`describe()`-style text, a future Prometheus
//! endpoint, etc).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter, safe to increment from any thread
/// without holding the processor's state lock.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, amount: u64) {
        self.0.fetch_add(amount, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Accumulates `(name, value)` pairs for a single `gather_metrics` pass.
#[derive(Debug, Default)]
pub struct Collector {
    entries: Vec<(&'static str, u64)>,
}

impl Collector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, name: &'static str, counter: &Counter) {
        self.entries.push((name, counter.get()));
    }

    #[must_use]
    pub fn entries(&self) -> &[(&'static str, u64)] {
        &self.entries
    }
}

impl fmt::Display for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

/// Anything that can contribute counters to a [`Collector`], without the
/// full registry/labels machinery a larger metrics stack would carry.
pub trait MetricsComponent {
    fn gather_metrics(&self, collector: &mut Collector);
}
