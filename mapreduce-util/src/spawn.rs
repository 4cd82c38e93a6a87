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

/// Spawns a future on the current tokio runtime under a named tracing span,
/// wrapped in a [`crate::task::JoinHandleDropGuard`] so the caller's handle
/// aborting the task on drop is the default rather than something every
/// call site has to remember to do.
///
/// ```ignore
/// let handle = spawn!("scheduler_loop", async move { ... });
/// ```
#[macro_export]
macro_rules! spawn {
    ($name:expr, $fut:expr) => {
        $crate::task::JoinHandleDropGuard::new(tokio::task::spawn(::tracing::Instrument::instrument(
            $fut,
            ::tracing::info_span!($name),
        )))
    };
}
