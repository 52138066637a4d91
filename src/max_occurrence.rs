//! `MaxOccurrenceExplainer` builds a minimal conflict explanation for
//! `AllDifferent`/`Cardinality` failures by reasoning about the implicit
//! residual graph of a bipartite matching rather than replaying the whole
//! propagator.
//!
//! Callers (`all_different.rs`, `cardinality.rs`) build a bipartite graph
//! over variable indices and "value nodes" (a value with capacity `c` is
//! represented by `c` distinct node ids, so matching one variable to one
//! copy is the same as matching it to one unit of that value's capacity),
//! compute a maximum matching, and hand both to [`explain`]. The result is
//! index-based: callers translate explaining variable indices and value-node
//! ids back into real `VarId`s/domain values and build a shared-complement
//! literal list (every resulting literal carries the identical excluded-value
//! set).
use crate::scc::strongly_connected_components;

pub struct Explanation {
    /// Variable indices (into the caller's `vars` slice) whose current
    /// narrowing participates in the explanation.
    pub explaining_vars: Vec<usize>,
    /// Value-node ids whose unavailability participates in the explanation;
    /// the caller turns each into the value it represents and unions them
    /// into one shared excluded-value set.
    pub explaining_value_nodes: Vec<usize>,
}

/// One (variable index, value-node id) edge: variable `var` can currently be
/// assigned the value that `value_node` represents.
#[derive(Clone, Copy)]
pub struct Edge {
    pub var: usize,
    pub value_node: usize,
}

/// Builds the minimal explanation for why `num_vars` variables, with
/// possible assignments given by `edges`, cannot all be matched (or why
/// `removed_value_nodes` had to be excluded from some variable's domain),
/// given a matching already computed over the same graph.
///
/// `matched_value_of` maps each variable index to the value-node id it is
/// currently matched to, or `None` if unmatched. `unconstrained_nodes` marks
/// value-node ids that represent a value with no declared upper bound
/// (never part of a Hall set, never reported as a cause). `deprioritized_var`,
/// if set, is the variable the matching was computed while holding back —
/// typically the variable whose narrowing is being explained, so its own
/// absence from the matching doesn't hide the real cause.
pub fn explain(
    num_vars: usize,
    num_value_nodes: usize,
    edges: &[Edge],
    matched_value_of: &[Option<usize>],
    unconstrained_nodes: &[bool],
    removed_value_nodes: &[usize],
) -> Explanation {
    let total_nodes = num_vars + num_value_nodes;
    let var_node = |v: usize| v;
    let value_node = |n: usize| num_vars + n;
    let is_value_node = |node: usize| node >= num_vars;

    let mut by_var: Vec<Vec<usize>> = vec![Vec::new(); num_vars];
    let mut by_value: Vec<Vec<usize>> = vec![Vec::new(); num_value_nodes];
    for e in edges {
        by_var[e.var].push(e.value_node);
        by_value[e.value_node].push(e.var);
    }

    let successors = |node: usize| -> Vec<usize> {
        if !is_value_node(node) {
            let v = node;
            match matched_value_of[v] {
                Some(n) => vec![value_node(n)],
                None => Vec::new(),
            }
        } else {
            let n = node - num_vars;
            by_value[n]
                .iter()
                .copied()
                .filter(|&v| matched_value_of[v] != Some(n))
                .map(var_node)
                .collect()
        }
    };

    let scc = strongly_connected_components(total_nodes, successors);

    // A value-node is "free" if it represents a genuinely unused unit of
    // capacity (no variable matched to it) or has no declared capacity at
    // all; every node reachable from a free value-node has slack somewhere
    // downstream and can never be part of a minimal explanation.
    let is_free_value = |n: usize| -> bool {
        unconstrained_nodes[n] || !matched_value_of.iter().any(|&m| m == Some(n))
    };
    let mut reachable_from_free = vec![false; total_nodes];
    {
        let mut stack: Vec<usize> = (0..num_value_nodes).filter(|&n| is_free_value(n)).map(value_node).collect();
        while let Some(node) = stack.pop() {
            if reachable_from_free[node] {
                continue;
            }
            reachable_from_free[node] = true;
            for s in successors(node) {
                if !reachable_from_free[s] {
                    stack.push(s);
                }
            }
        }
    }

    let start_nodes: Vec<usize> = if !removed_value_nodes.is_empty() {
        removed_value_nodes.iter().map(|&n| value_node(n)).collect()
    } else {
        match (0..num_vars).find(|&v| matched_value_of[v].is_none()) {
            Some(v) => vec![var_node(v)],
            None => Vec::new(),
        }
    };
    let start_sccs: Vec<usize> = start_nodes.iter().map(|&n| scc[n]).collect();

    let mut visited = vec![false; total_nodes];
    let mut explaining_vars = Vec::new();
    let mut explaining_value_nodes = Vec::new();
    let mut stack = start_nodes.clone();
    while let Some(node) = stack.pop() {
        if visited[node] {
            continue;
        }
        visited[node] = true;
        if reachable_from_free[node] || start_sccs.contains(&scc[node]) {
            // Free nodes carry no information; nodes in the same SCC as a
            // start node are already "explained" by the matched edge that
            // put them there.
            if !start_nodes.contains(&node) {
                continue;
            }
        }
        if is_value_node(node) {
            explaining_value_nodes.push(node - num_vars);
        } else {
            explaining_vars.push(node);
        }
        for s in successors(node) {
            if !visited[s] {
                stack.push(s);
            }
        }
    }

    Explanation {
        explaining_vars,
        explaining_value_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_vars_two_values_explains_all_three() {
        // vars 0,1,2 can each only take value-nodes 0 or 1 (capacity 1
        // each): classic pigeonhole, no matching saturates all three.
        let edges = vec![
            Edge { var: 0, value_node: 0 },
            Edge { var: 0, value_node: 1 },
            Edge { var: 1, value_node: 0 },
            Edge { var: 1, value_node: 1 },
            Edge { var: 2, value_node: 0 },
            Edge { var: 2, value_node: 1 },
        ];
        let matched = vec![Some(0), Some(1), None];
        let unconstrained = vec![false, false];
        let explanation = explain(3, 2, &edges, &matched, &unconstrained, &[]);
        assert!(explanation.explaining_vars.contains(&2));
        assert!(explanation.explaining_vars.contains(&0));
        assert!(explanation.explaining_vars.contains(&1));
        assert!(explanation.explaining_value_nodes.contains(&0));
        assert!(explanation.explaining_value_nodes.contains(&1));
    }

    #[test]
    fn unconstrained_value_never_explains() {
        let edges = vec![
            Edge { var: 0, value_node: 0 },
            Edge { var: 0, value_node: 1 },
        ];
        let matched = vec![Some(1)];
        let unconstrained = vec![true, false];
        // value-node 0 is unconstrained (infinite capacity): explaining
        // var 0's matched-elsewhere state should never cite it.
        let explanation = explain(1, 2, &edges, &matched, &unconstrained, &[1]);
        assert!(!explanation.explaining_value_nodes.contains(&0));
    }
}
