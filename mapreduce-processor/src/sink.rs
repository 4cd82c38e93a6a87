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

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::task::TaskData;

/// `TaskData -> delivered?`. `true` means "delivered, forget"; `false`
/// means "not delivered, retain for retry next tick". A sink that panics is
/// treated by the scheduler loop as if it had returned `false`.
pub type SinkFn = Arc<dyn Fn(TaskData) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Wraps a `Fn(TaskData) -> impl Future<Output = bool>` into a [`SinkFn`].
pub fn sink_fn<F, Fut>(f: F) -> SinkFn
where
    F: Fn(TaskData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |task| Box::pin(f(task)))
}

/// The default sink installed by [`crate::Processor::new`]: accepts every
/// outcome unconditionally so a processor with no sinks configured simply
/// discards outcomes instead of accumulating them forever in a terminal
/// set.
#[must_use]
pub fn noop_sink() -> SinkFn {
    sink_fn(|_task| async { true })
}
