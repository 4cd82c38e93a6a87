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
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mapreduce_error::Error;

use crate::task::{ActionName, Blob};

/// `(partition-count, input-blob) -> output-blob`, possibly failing. Boxed
/// so the registry can hold a heterogeneous mix of user-supplied closures
/// and `async fn`s behind one type.
pub type ActionFn =
    Arc<dyn Fn(u32, Blob) -> Pin<Box<dyn Future<Output = Result<Blob, Error>> + Send>> + Send + Sync>;

/// Wraps any `Fn(u32, Blob) -> impl Future<Output = Result<Blob, Error>>`
/// into an [`ActionFn`]. Most callers should use this instead of
/// constructing the `Arc<dyn Fn(...) -> Pin<Box<...>>>` by hand.
pub fn action_fn<F, Fut>(f: F) -> ActionFn
where
    F: Fn(u32, Blob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Blob, Error>> + Send + 'static,
{
    Arc::new(move |partitions, input| Box::pin(f(partitions, input)))
}

/// A named action resolvable from the map-action half of the registry.
#[derive(Clone)]
pub struct MapAction {
    pub name: ActionName,
    pub action: ActionFn,
}

/// A named action resolvable from the reduce-action half of the registry.
/// `Combine` tasks resolve here too; combine is a pre-reduce using the same
/// action surface.
#[derive(Clone)]
pub struct ReduceAction {
    pub name: ActionName,
    pub action: ActionFn,
}

/// The two action namespaces a worker knows about. Replacement is total
/// (whole-map swap), not merge, matching how the controller pushes new
/// action bundles: `setMapActions`/`setReduceActions` each atomically
/// replace their half.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    map_actions: HashMap<ActionName, MapAction>,
    reduce_actions: HashMap<ActionName, ReduceAction>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_map_actions(&mut self, actions: Vec<MapAction>) {
        self.map_actions = actions.into_iter().map(|a| (a.name.clone(), a)).collect();
    }

    pub fn set_reduce_actions(&mut self, actions: Vec<ReduceAction>) {
        self.reduce_actions = actions.into_iter().map(|a| (a.name.clone(), a)).collect();
    }

    #[must_use]
    pub fn list_map_actions(&self) -> Vec<MapAction> {
        self.map_actions.values().cloned().collect()
    }

    #[must_use]
    pub fn list_reduce_actions(&self) -> Vec<ReduceAction> {
        self.reduce_actions.values().cloned().collect()
    }

    #[must_use]
    pub fn get_map_action(&self, name: &str) -> Option<MapAction> {
        self.map_actions.get(name).cloned()
    }

    #[must_use]
    pub fn get_reduce_action(&self, name: &str) -> Option<ReduceAction> {
        self.reduce_actions.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn identity_action() -> ActionFn {
        action_fn(|_partitions, input| async move { Ok(input) })
    }

    #[test]
    fn replacement_is_total_not_merge() {
        let mut registry = ActionRegistry::new();
        registry.set_map_actions(vec![MapAction {
            name: "a".to_string(),
            action: identity_action(),
        }]);
        assert!(registry.get_map_action("a").is_some());

        registry.set_map_actions(vec![MapAction {
            name: "b".to_string(),
            action: identity_action(),
        }]);
        assert!(registry.get_map_action("a").is_none());
        assert!(registry.get_map_action("b").is_some());
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let registry = ActionRegistry::new();
        assert!(registry.get_map_action("missing").is_none());
        assert!(registry.get_reduce_action("missing").is_none());
    }

    #[test]
    fn insertion_order_is_irrelevant_lookup_is_by_name() {
        let mut registry = ActionRegistry::new();
        registry.set_reduce_actions(vec![
            ReduceAction { name: "z".to_string(), action: identity_action() },
            ReduceAction { name: "a".to_string(), action: identity_action() },
        ]);
        let mut names: Vec<_> = registry.list_reduce_actions().into_iter().map(|a| a.name).collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "z".to_string()]);
    }
}
