//! Dependency layering and strongly-connected-component discovery over
//! a compiled graph's propagation adjacency.

use crate::compiler::CompiledGraph;
use crate::error::{RuntimeError, RuntimeErrorKind};

/// Cap on layering iterations; a DAG deeper than this is refused rather
/// than silently left partially evaluated.
pub(crate) const MAX_LEVELS: usize = 100;

/// Partitions nodes into dependency levels: level 0 holds nodes with no
/// incoming edges, level k+1 holds nodes whose every predecessor sits in
/// a level ≤ k. Nodes caught in cycles are never placed and are simply
/// absent from the returned levels.
pub(crate) fn compute_levels(graph: &CompiledGraph) -> Result<Vec<Vec<usize>>, RuntimeError> {
    let n = graph.node_count();
    let mut placed = vec![false; n];
    let mut levels: Vec<Vec<usize>> = Vec::new();

    for _ in 0..MAX_LEVELS {
        let current: Vec<usize> = (0..n)
            .filter(|&idx| {
                !placed[idx]
                    && graph
                        .predecessors(idx)
                        .iter()
                        .all(|edge| placed[edge.node])
            })
            .collect();
        if current.is_empty() {
            break;
        }
        for &idx in &current {
            placed[idx] = true;
        }
        levels.push(current);
    }

    // A node that is still placeable after the cap means the DAG is more
    // than MAX_LEVELS deep; unplaceable nodes (cycles) are fine.
    let overflow = (0..n).any(|idx| {
        !placed[idx]
            && graph
                .predecessors(idx)
                .iter()
                .all(|edge| placed[edge.node])
    });
    if overflow {
        return Err(RuntimeError::new(
            RuntimeErrorKind::ExecutionError,
            format!("dependency layering exceeded {} levels", MAX_LEVELS),
        ));
    }

    Ok(levels)
}

/// Tarjan's strongly-connected-components algorithm. Components are
/// returned dependency-first (sources before the components they feed),
/// with members in input order.
pub(crate) fn strongly_connected_components(graph: &CompiledGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut state = TarjanState {
        graph,
        index: vec![None; n],
        low_link: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };

    for node in 0..n {
        if state.index[node].is_none() {
            state.visit(node);
        }
    }

    // Tarjan pops sinks first; reverse to process dependencies first.
    state.components.reverse();
    for component in &mut state.components {
        component.sort_unstable();
    }
    state.components
}

struct TarjanState<'a> {
    graph: &'a CompiledGraph,
    index: Vec<Option<usize>>,
    low_link: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl TarjanState<'_> {
    fn visit(&mut self, node: usize) {
        self.index[node] = Some(self.next_index);
        self.low_link[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        for edge in self.graph.successors(node) {
            let next = edge.node;
            match self.index[next] {
                None => {
                    self.visit(next);
                    self.low_link[node] = self.low_link[node].min(self.low_link[next]);
                }
                Some(next_index) if self.on_stack[next] => {
                    self.low_link[node] = self.low_link[node].min(next_index);
                }
                _ => {}
            }
        }

        if Some(self.low_link[node]) == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
