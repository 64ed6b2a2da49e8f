//! Conditional edges: route to the next node based on merged state.
//!
//! A source node may carry a routing function that reads the current state and
//! returns a label; the label is either used as the next node id directly or
//! looked up in an optional path map. Routers must be pure: any aggregate they
//! branch on (e.g. overall confidence) is computed by a dedicated function,
//! not recomputed ad hoc inside the router.

use std::collections::HashMap;
use std::sync::Arc;

use super::GraphState;

/// Router function: current state → routing label.
pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Conditional edge definition: routing function plus optional path map.
///
/// - `path_map` is `None`: the label is the next node id (or END).
/// - `path_map` is `Some(map)`: next id is `map[label]`, falling back to the
///   label itself so direct node ids remain usable as labels.
#[derive(Clone)]
pub struct ConditionalRouter<S> {
    pub(super) path: ConditionalRouterFn<S>,
    pub(super) path_map: Option<HashMap<String, String>>,
}

impl<S: GraphState> ConditionalRouter<S> {
    pub fn new(path: ConditionalRouterFn<S>, path_map: Option<HashMap<String, String>>) -> Self {
        Self { path, path_map }
    }

    /// Resolves the next node id from the current state.
    pub fn resolve_next(&self, state: &S) -> String {
        let label = (self.path)(state);
        self.path_map
            .as_ref()
            .and_then(|m| m.get(&label))
            .cloned()
            .unwrap_or(label)
    }
}

/// How the run loop picks the next node after a given node completes.
#[derive(Clone)]
pub enum NextEntry<S> {
    /// Single fixed successor; the node's own `Next` is still respected.
    Unconditional(String),
    /// Router decides from state; the node's `Next` is ignored.
    Conditional(ConditionalRouter<S>),
}
