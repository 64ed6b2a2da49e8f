//! Structured logging for graph execution events.

/// Log node execution start.
pub fn log_node_start(node_id: &str) {
    tracing::debug!(node_id = node_id, "starting node execution");
}

/// Log node execution completion with its requested next step.
pub fn log_node_complete(node_id: &str, next: &crate::graph::Next) {
    tracing::debug!(node_id = node_id, ?next, "node execution complete");
}

/// Log graph execution start.
pub fn log_graph_start() {
    tracing::info!("starting graph execution");
}

/// Log graph execution completion.
pub fn log_graph_complete() {
    tracing::info!("graph execution complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_functions_do_not_panic() {
        log_node_start("n");
        log_node_complete("n", &crate::graph::Next::End);
        log_graph_start();
        log_graph_complete();
    }
}
