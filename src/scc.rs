//! Tarjan strongly-connected-components, shared by `Cardinality`'s
//! upper-bound propagator and `MaxOccurrenceExplainer`, both of which reason
//! about an implicit residual graph built from a bipartite matching rather
//! than an explicit adjacency list.
//!
//! Generalized to accept any `successors(node) -> Vec<node>` closure instead
//! of walking a concrete graph type, since the two callers each derive edges
//! differently from their own matching state.

/// Runs Tarjan's algorithm over `num_nodes` nodes whose outgoing edges are
/// produced on demand by `successors`. Returns, for each node, the id of the
/// SCC it belongs to (SCC ids are not otherwise ordered or contiguous in any
/// particular way beyond "equal iff same component").
pub fn strongly_connected_components(
    num_nodes: usize,
    mut successors: impl FnMut(usize) -> Vec<usize>,
) -> Vec<usize> {
    let mut index = vec![usize::MAX; num_nodes];
    let mut lowlink = vec![0usize; num_nodes];
    let mut on_stack = vec![false; num_nodes];
    let mut stack = Vec::new();
    let mut scc_of = vec![usize::MAX; num_nodes];
    let mut next_index = 0usize;
    let mut next_scc = 0usize;

    // Explicit-stack DFS (Tarjan's recursive formulation would overflow on
    // graphs with thousands of nodes in a single chain); each frame tracks
    // the node, its iterator position among its successors, and whether
    // it's the DFS-tree root for its subtree.
    struct Frame {
        node: usize,
        succ: Vec<usize>,
        pos: usize,
    }

    for start in 0..num_nodes {
        if index[start] != usize::MAX {
            continue;
        }
        let mut call_stack = vec![Frame {
            node: start,
            succ: successors(start),
            pos: 0,
        }];
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(frame) = call_stack.last_mut() {
            if frame.pos < frame.succ.len() {
                let w = frame.succ[frame.pos];
                frame.pos += 1;
                if index[w] == usize::MAX {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push(Frame {
                        node: w,
                        succ: successors(w),
                        pos: 0,
                    });
                } else if on_stack[w] {
                    lowlink[frame.node] = lowlink[frame.node].min(index[w]);
                }
            } else {
                let v = frame.node;
                call_stack.pop();
                if let Some(parent) = call_stack.last() {
                    lowlink[parent.node] = lowlink[parent.node].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    loop {
                        let w = stack.pop().expect("SCC root must close its own stack segment");
                        on_stack[w] = false;
                        scc_of[w] = next_scc;
                        if w == v {
                            break;
                        }
                    }
                    next_scc += 1;
                }
            }
        }
    }

    scc_of
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_a_simple_cycle() {
        // 0 -> 1 -> 2 -> 0, plus an isolated 3.
        let edges: Vec<Vec<usize>> = vec![vec![1], vec![2], vec![0], vec![]];
        let scc = strongly_connected_components(4, |n| edges[n].clone());
        assert_eq!(scc[0], scc[1]);
        assert_eq!(scc[1], scc[2]);
        assert_ne!(scc[0], scc[3]);
    }

    #[test]
    fn dag_gets_one_scc_per_node() {
        let edges: Vec<Vec<usize>> = vec![vec![1], vec![2], vec![]];
        let scc = strongly_connected_components(3, |n| edges[n].clone());
        assert_ne!(scc[0], scc[1]);
        assert_ne!(scc[1], scc[2]);
    }
}
