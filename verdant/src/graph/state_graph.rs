//! Graph builder: nodes, edges, conditional edges, compile-time validation.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::memory::Checkpointer;

use super::{CompiledStateGraph, ConditionalRouter, ConditionalRouterFn, GraphState, NextEntry, Node};

/// Distinguished predecessor of the entry node.
pub const START: &str = "__start__";
/// Distinguished terminal successor.
pub const END: &str = "__end__";

/// Default engine-level step budget; a backstop for router cycles, set well
/// above the workflow-level counters so it never fires for well-formed state.
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Error from `StateGraph::compile`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompilationError {
    #[error("graph has no nodes")]
    EmptyGraph,
    #[error("no entry edge from START")]
    MissingEntry,
    #[error("edge references unknown node: {0}")]
    UnknownNode(String),
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
}

/// Mutable graph under construction. `compile()` validates and freezes it.
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    node_order: Vec<String>,
    duplicate: Option<String>,
    entry: Option<String>,
    edges: Vec<(String, String)>,
    conditional: HashMap<String, ConditionalRouter<S>>,
    max_steps: usize,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            node_order: Vec::new(),
            duplicate: None,
            entry: None,
            edges: Vec::new(),
            conditional: HashMap::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Overrides the engine-level step budget.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Registers a node. Duplicate ids are reported at compile time.
    pub fn add_node(&mut self, id: impl Into<String>, node: Arc<dyn Node<S>>) -> &mut Self {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            self.duplicate.get_or_insert(id.clone());
        } else {
            self.node_order.push(id.clone());
        }
        self.nodes.insert(id, node);
        self
    }

    /// Adds an unconditional edge. `START → n` sets the entry; `n → END`
    /// terminates after `n` unless the node jumps elsewhere.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let (from, to) = (from.into(), to.into());
        if from == START {
            self.entry = Some(to);
        } else {
            self.edges.push((from, to));
        }
        self
    }

    /// Adds conditional edges from `from`: `router(state)` returns a label
    /// resolved through `path_map` (or used directly as a node id / END).
    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        router: ConditionalRouterFn<S>,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self {
        self.conditional
            .insert(from.into(), ConditionalRouter::new(router, path_map));
        self
    }

    /// Validates and freezes the graph.
    pub fn compile(self) -> Result<CompiledStateGraph<S>, CompilationError> {
        self.compile_inner(None)
    }

    /// Validates and freezes the graph with a checkpointer; runs given a
    /// `thread_id` save state on interrupt and at termination.
    pub fn compile_with_checkpointer(
        self,
        checkpointer: Arc<dyn Checkpointer<S>>,
    ) -> Result<CompiledStateGraph<S>, CompilationError> {
        self.compile_inner(Some(checkpointer))
    }

    fn compile_inner(
        self,
        checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    ) -> Result<CompiledStateGraph<S>, CompilationError> {
        if let Some(id) = self.duplicate {
            return Err(CompilationError::DuplicateNode(id));
        }
        if self.nodes.is_empty() {
            return Err(CompilationError::EmptyGraph);
        }
        let entry = self.entry.ok_or(CompilationError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(CompilationError::UnknownNode(entry));
        }

        let mut next_map: HashMap<String, NextEntry<S>> = HashMap::new();
        for (from, to) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(CompilationError::UnknownNode(from.clone()));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(CompilationError::UnknownNode(to.clone()));
            }
            next_map.insert(from.clone(), NextEntry::Unconditional(to.clone()));
        }
        for (from, router) in self.conditional {
            if !self.nodes.contains_key(&from) {
                return Err(CompilationError::UnknownNode(from));
            }
            // Conditional edges take precedence over a plain edge from the same node.
            next_map.insert(from, NextEntry::Conditional(router));
        }

        Ok(CompiledStateGraph {
            nodes: self.nodes,
            first_node_id: entry,
            node_order: self.node_order,
            next_map,
            checkpointer,
            max_steps: self.max_steps,
        })
    }
}
