//! Union-find over dense object indices
//!
//! Path compression plus union by rank. Classes are reported in order of
//! their smallest member so region numbering does not depend on merge order.

/// Union-find with path compression and union by rank
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
    set_count: usize,
}

impl UnionFind {
    /// Create a union-find with n singleton elements
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
            set_count: n,
        }
    }

    #[inline]
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut current = x;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    /// Merge the sets of x and y, returning the new root
    pub fn union(&mut self, x: u32, y: u32) -> u32 {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return root_x;
        }

        let (rx, ry) = (root_x as usize, root_y as usize);
        let root = if self.rank[rx] < self.rank[ry] {
            self.parent[rx] = root_y;
            root_y
        } else if self.rank[rx] > self.rank[ry] {
            self.parent[ry] = root_x;
            root_x
        } else {
            self.parent[ry] = root_x;
            self.rank[rx] += 1;
            root_x
        };

        self.set_count -= 1;
        root
    }

    #[inline]
    pub fn connected(&mut self, x: u32, y: u32) -> bool {
        self.find(x) == self.find(y)
    }

    /// Number of disjoint sets
    #[inline]
    pub fn count(&self) -> usize {
        self.set_count
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// All classes, each sorted, ordered by smallest member
    pub fn classes(&mut self) -> Vec<Vec<u32>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.parent.len()];
        let mut classes: Vec<Vec<u32>> = Vec::with_capacity(self.set_count);
        for i in 0..self.parent.len() as u32 {
            let root = self.find(i) as usize;
            match slot_of_root[root] {
                Some(slot) => classes[slot].push(i),
                None => {
                    slot_of_root[root] = Some(classes.len());
                    classes.push(vec![i]);
                }
            }
        }
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_union_find() {
        let mut uf = UnionFind::new(10);
        assert_eq!(uf.count(), 10);
        assert!(!uf.connected(0, 1));

        uf.union(0, 1);
        uf.union(2, 3);
        assert!(uf.connected(0, 1));
        assert!(!uf.connected(0, 2));
        assert_eq!(uf.count(), 8);

        uf.union(1, 2);
        assert!(uf.connected(0, 3));
        assert_eq!(uf.count(), 7);
    }

    #[test]
    fn test_path_compression() {
        let mut uf = UnionFind::new(100);
        for i in 0..99 {
            uf.union(i, i + 1);
        }
        let root = uf.find(99);
        for i in 0..100 {
            assert_eq!(uf.find(i), root);
        }
    }

    #[test]
    fn test_classes_ordered_by_smallest_member() {
        let mut uf = UnionFind::new(6);
        uf.union(5, 1);
        uf.union(4, 2);
        uf.union(2, 0);

        assert_eq!(uf.classes(), vec![vec![0, 2, 4], vec![1, 5], vec![3]]);
    }
}
