/// Disjoint-set forest with path compression. Union is implicit: the losing
/// root becomes a child of the winning root, no rank bookkeeping.
///
/// Only consumer is the minimum-spanning-tree starting tour.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
        }
    }

    pub fn find(&mut self, element: usize) -> usize {
        let mut root = element;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = element;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }

    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merge the sets containing `winner` and `loser`. Returns false when
    /// they already share a root.
    pub fn union(&mut self, winner: usize, loser: usize) -> bool {
        let winner_root = self.find(winner);
        let loser_root = self.find(loser);
        if winner_root == loser_root {
            return false;
        }

        self.parent[loser_root] = winner_root;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::UnionFind;

    #[test]
    fn unions_and_queries() {
        let mut dsu = UnionFind::new(6);
        assert!(!dsu.same_set(0, 1));
        assert!(dsu.union(0, 1));
        assert!(dsu.union(2, 3));
        assert!(dsu.same_set(0, 1));
        assert!(!dsu.same_set(1, 2));
        assert!(dsu.union(1, 3));
        assert!(dsu.same_set(0, 2));
        assert!(!dsu.union(0, 3));
    }

    #[test]
    fn loser_root_moves_under_winner() {
        let mut dsu = UnionFind::new(4);
        dsu.union(1, 2);
        assert_eq!(dsu.find(2), 1);
        dsu.union(3, 1);
        assert_eq!(dsu.find(1), 3);
        assert_eq!(dsu.find(2), 3);
    }
}
