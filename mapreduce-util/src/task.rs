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
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

/// Wraps a [`JoinHandle`] so the spawned task is aborted when the handle is
/// dropped instead of being detached to run forever. Used for both the
/// scheduler loop handle (`stop()` drops it explicitly) and per-task
/// executor handles (`stopTask` aborts on cancellation).
#[derive(Debug)]
pub struct JoinHandleDropGuard<T> {
    handle: JoinHandle<T>,
}

impl<T> JoinHandleDropGuard<T> {
    pub fn new(handle: JoinHandle<T>) -> Self {
        Self { handle }
    }

    /// Aborts the underlying task. Idempotent; safe to call on an already
    /// finished task.
    pub fn abort(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Drop for JoinHandleDropGuard<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<T> Future for JoinHandleDropGuard<T> {
    type Output = Result<T, tokio::task::JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}
