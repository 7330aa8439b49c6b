//! Connectivity statistics and topology export for a [`PowerSystem`].
//!
//! These views are built on demand from the line arena; the partitioning and
//! tree-building algorithms operate on the arena directly.

use crate::{BusId, LineId, PowerSystem};
use anyhow::{anyhow, Result};
use petgraph::algo::connected_components;
use petgraph::graph::NodeIndex;
use petgraph::{Graph, Undirected};

/// Summary statistics for the connectivity graph (density/degree/components).
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Build an undirected petgraph view of the system.
///
/// Only `connected`, non-failed lines become edges; backup lines are included
/// when `include_backup` is set (for e.g. restoration studies).
pub fn connectivity_graph(
    system: &PowerSystem,
    include_backup: bool,
) -> Graph<BusId, LineId, Undirected> {
    let mut graph = Graph::new_undirected();
    let nodes: Vec<NodeIndex> = system
        .bus_ids()
        .map(|id| graph.add_node(id))
        .collect();

    for line in system.lines() {
        let in_service = line.connected || (include_backup && line.is_backup);
        if line.failed || !in_service {
            continue;
        }
        graph.add_edge(
            nodes[line.from_bus.value()],
            nodes[line.to_bus.value()],
            line.id,
        );
    }

    graph
}

/// Number of electrically separate components over in-service lines.
pub fn count_components(system: &PowerSystem) -> usize {
    connected_components(&connectivity_graph(system, false))
}

/// Calculates graph-level statistics such as density, degree distribution,
/// and component counts.
pub fn graph_stats(system: &PowerSystem) -> Result<GraphStats> {
    let graph = connectivity_graph(system, false);
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    let mut degrees = Vec::with_capacity(node_count);
    for node in graph.node_indices() {
        degrees.push(graph.neighbors(node).count());
    }
    let min_degree = *degrees.iter().min().unwrap_or(&0);
    let max_degree = *degrees.iter().max().unwrap_or(&0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().copied().sum::<usize>() as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };

    Ok(GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(&graph),
        min_degree,
        avg_degree,
        max_degree,
        density,
    })
}

/// Export the topology to a DOT string (Graphviz) so external tools can
/// visualize the feeder layout. Backup lines are drawn dashed.
pub fn export_dot(system: &PowerSystem, format: &str) -> Result<String> {
    match format.to_ascii_lowercase().as_str() {
        "graphviz" | "dot" => Ok(render_dot(system)),
        other => Err(anyhow!("unsupported graph export format '{other}'")),
    }
}

fn render_dot(system: &PowerSystem) -> String {
    let mut buffer = String::new();
    buffer.push_str("graph relia_network {\n");
    for bus in system.buses() {
        let label = sanitize_label(&bus.name);
        buffer.push_str(&format!("  n{} [label=\"{}\"];\n", bus.id.value(), label));
    }
    for line in system.lines() {
        let style = if line.is_backup {
            " [style=dashed]"
        } else {
            ""
        };
        buffer.push_str(&format!(
            "  n{} -- n{}{};\n",
            line.from_bus.value(),
            line.to_bus.value(),
            style
        ));
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}
