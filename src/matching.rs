//! `BipartiteMatching` — maximum bipartite matching between a set of left
//! vertices (variables) and a set of right vertices (values), where each
//! right vertex may absorb more than one left vertex up to a declared
//! capacity.
//!
//! Adjacency lists per left vertex, a `pair_left` array recording each left
//! vertex's current match, per-right-vertex capacities and matched counts,
//! and `compute_maximal_matching`/`incremental_maximal_matching`, including
//! the ability to deprioritize one left vertex so its match is searched for
//! last (used by `MaxOccurrenceExplainer` to match everything else before
//! the variable being explained). Augmenting paths are found with a plain
//! repeated-DFS search (Kuhn's algorithm generalized to right-side
//! capacities) rather than an explicit BFS-layered Hopcroft-Karp phase: both
//! find a maximum matching, and the domain sizes this crate targets don't
//! need the asymptotic edge BFS layering buys.

const NIL: usize = usize::MAX;

pub struct BipartiteMatching {
    num_left: usize,
    num_right: usize,
    adj_left: Vec<Vec<usize>>,
    right_capacity: Vec<usize>,
    /// For each left vertex, the right vertex it is currently matched to, or
    /// `NIL`.
    pair_left: Vec<usize>,
    /// For each right vertex, the left vertices currently matched to it (at
    /// most `right_capacity[r]` entries).
    matched_lefts: Vec<Vec<usize>>,
}

impl BipartiteMatching {
    pub fn new(num_left: usize, num_right: usize) -> Self {
        BipartiteMatching {
            num_left,
            num_right,
            adj_left: vec![Vec::new(); num_left],
            right_capacity: vec![1; num_right],
            pair_left: vec![NIL; num_left],
            matched_lefts: vec![Vec::new(); num_right],
        }
    }

    pub fn set_right_capacity(&mut self, right: usize, capacity: usize) {
        self.right_capacity[right] = capacity;
    }

    pub fn right_capacity(&self, right: usize) -> usize {
        self.right_capacity[right]
    }

    pub fn add_edge(&mut self, left: usize, right: usize) {
        if !self.adj_left[left].contains(&right) {
            self.adj_left[left].push(right);
        }
    }

    /// Clears `left`'s adjacency list and, if it is currently matched,
    /// unmatches it on the right side too so a later
    /// `incremental_maximal_matching` call doesn't find it still occupying a
    /// right vertex it no longer has any edge to.
    pub fn remove_edges(&mut self, left: usize) {
        self.adj_left[left].clear();
        let r = self.pair_left[left];
        if r != NIL {
            self.pair_left[left] = NIL;
            if let Some(pos) = self.matched_lefts[r].iter().position(|&l| l == left) {
                self.matched_lefts[r].swap_remove(pos);
            }
        }
    }

    pub fn neighbors(&self, left: usize) -> &[usize] {
        &self.adj_left[left]
    }

    pub fn clear_edges(&mut self) {
        for adj in self.adj_left.iter_mut() {
            adj.clear();
        }
        self.pair_left.fill(NIL);
        for m in self.matched_lefts.iter_mut() {
            m.clear();
        }
    }

    pub fn matched_right_of(&self, left: usize) -> Option<usize> {
        let r = self.pair_left[left];
        if r == NIL {
            None
        } else {
            Some(r)
        }
    }

    pub fn matched_lefts_of(&self, right: usize) -> &[usize] {
        &self.matched_lefts[right]
    }

    pub fn num_matched_on_right(&self, right: usize) -> usize {
        self.matched_lefts[right].len()
    }

    pub fn num_left(&self) -> usize {
        self.num_left
    }

    pub fn num_right(&self) -> usize {
        self.num_right
    }

    /// Computes a maximum matching from scratch, optionally holding one left
    /// vertex back so augmenting paths are searched for every other left
    /// vertex first (used so `MaxOccurrenceExplainer` can match everything
    /// else before the variable being explained). Returns the number of
    /// matched left vertices.
    pub fn compute_maximal_matching(&mut self, deprioritize: Option<usize>) -> usize {
        self.pair_left.fill(NIL);
        for m in self.matched_lefts.iter_mut() {
            m.clear();
        }
        self.incremental_maximal_matching(deprioritize)
    }

    /// Like `compute_maximal_matching`, but preserves whatever matching is
    /// already recorded and only searches augmenting paths for left
    /// vertices that are currently unmatched — lets a caller add or remove a
    /// handful of edges (via `add_edge`/`remove_edges`) and re-match without
    /// throwing away a matching that is still mostly valid.
    pub fn incremental_maximal_matching(&mut self, deprioritize: Option<usize>) -> usize {
        let mut order: Vec<usize> = (0..self.num_left).filter(|&l| self.pair_left[l] == NIL).collect();
        if let Some(d) = deprioritize {
            if let Some(pos) = order.iter().position(|&l| l == d) {
                order.remove(pos);
                order.push(d);
            }
        }
        for l in order {
            let mut visited = vec![false; self.num_right];
            self.try_augment(l, &mut visited);
        }
        self.num_left - self.pair_left.iter().filter(|&&r| r == NIL).count()
    }

    /// DFS augmenting-path search rooted at left vertex `l`. Returns true if
    /// `l` ends up matched (either to free capacity, or by displacing one of
    /// a full right vertex's current matches onto a different right
    /// vertex).
    fn try_augment(&mut self, l: usize, visited: &mut [bool]) -> bool {
        for idx in 0..self.adj_left[l].len() {
            let r = self.adj_left[l][idx];
            if visited[r] {
                continue;
            }
            visited[r] = true;
            if self.matched_lefts[r].len() < self.right_capacity[r] {
                self.matched_lefts[r].push(l);
                self.pair_left[l] = r;
                return true;
            }
            for slot in 0..self.matched_lefts[r].len() {
                let displaced = self.matched_lefts[r][slot];
                if self.try_augment(displaced, visited) {
                    self.matched_lefts[r][slot] = l;
                    self.pair_left[l] = r;
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_matching_on_disjoint_stars() {
        let mut m = BipartiteMatching::new(3, 3);
        m.add_edge(0, 0);
        m.add_edge(1, 1);
        m.add_edge(2, 2);
        let matched = m.compute_maximal_matching(None);
        assert_eq!(matched, 3);
        assert_eq!(m.matched_right_of(0), Some(0));
        assert_eq!(m.matched_right_of(1), Some(1));
        assert_eq!(m.matched_right_of(2), Some(2));
    }

    #[test]
    fn capacity_limits_matches_on_shared_right_vertex() {
        let mut m = BipartiteMatching::new(3, 1);
        m.set_right_capacity(0, 2);
        m.add_edge(0, 0);
        m.add_edge(1, 0);
        m.add_edge(2, 0);
        let matched = m.compute_maximal_matching(None);
        assert_eq!(matched, 2);
        assert_eq!(m.num_matched_on_right(0), 2);
    }

    #[test]
    fn augmenting_path_displaces_existing_match() {
        // left 0 can only reach right 0; left 1 can reach both. A naive
        // greedy assignment of left 1 -> right 0 first would strand left 0;
        // the augmenting search must displace left 1 onto right 1 instead.
        let mut m = BipartiteMatching::new(2, 2);
        m.add_edge(0, 0);
        m.add_edge(1, 0);
        m.add_edge(1, 1);
        m.try_augment(1, &mut vec![false; 2]);
        let matched = m.compute_maximal_matching(None);
        assert_eq!(matched, 2);
    }

    #[test]
    fn incremental_matching_preserves_existing_pairs() {
        let mut m = BipartiteMatching::new(2, 2);
        m.add_edge(0, 0);
        m.add_edge(1, 1);
        m.compute_maximal_matching(None);
        let before = m.matched_right_of(0);
        m.add_edge(1, 0);
        m.incremental_maximal_matching(None);
        assert_eq!(m.matched_right_of(0), before);
    }

    #[test]
    fn remove_edges_clears_adjacency_and_pairing() {
        let mut m = BipartiteMatching::new(2, 2);
        m.add_edge(0, 0);
        m.add_edge(1, 1);
        m.compute_maximal_matching(None);
        assert_eq!(m.matched_right_of(0), Some(0));

        m.remove_edges(0);
        assert!(m.neighbors(0).is_empty());
        assert_eq!(m.matched_right_of(0), None);
        assert_eq!(m.num_matched_on_right(0), 0);
        // left 1's pairing is untouched.
        assert_eq!(m.matched_right_of(1), Some(1));

        let matched = m.incremental_maximal_matching(None);
        assert_eq!(matched, 1);
    }
}
