//! Complete-linkage hierarchical clustering over a condensed distance matrix
//!
//! The dendrogram is built with the nearest-neighbour chain algorithm, which is
//! exact for complete linkage and runs in `O(n²)` time and memory. A flat
//! clustering is then obtained by cutting the dendrogram at a distance
//! threshold: two observations share a flat cluster when they are joined by a
//! merge whose height is `<=` the threshold.
//!
//! # Example
//!
//! ```
//! use peakfilter::linkage::{complete_linkage, flat_clusters, CondensedDistances};
//!
//! let points = [1.0, 1.1, 5.0, 5.2];
//! let merges = complete_linkage(CondensedDistances::from_points(&points));
//! assert_eq!(flat_clusters(points.len(), &merges, 0.5), vec![1, 1, 2, 2]);
//! ```

use serde::{Deserialize, Serialize};

/// Upper triangle of a symmetric distance matrix, row by row
#[derive(Clone, Debug, PartialEq)]
pub struct CondensedDistances {
    n: usize,
    data: Vec<f64>,
}

impl CondensedDistances {
    /// Pairwise absolute differences between 1-D observations
    pub fn from_points(points: &[f64]) -> Self {
        let n = points.len();
        let mut data = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                data.push((points[i] - points[j]).abs());
            }
        }
        Self { n, data }
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.n * i - i * (i + 1) / 2 + (j - i - 1)
    }

    /// Distance between observations `i` and `j` (`i != j`)
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.index(i, j)]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.index(i, j);
        self.data[idx] = value;
    }
}

/// One agglomeration step of the dendrogram
///
/// `kept` and `absorbed` are observation indices standing for the two
/// clusters joined at `height`; after the merge `kept` represents the union.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub kept: usize,
    pub absorbed: usize,
    pub height: f64,
}

/// Build the complete-linkage dendrogram of the observations
///
/// Merges are returned in the order they are performed, which is not
/// necessarily by increasing height.
pub fn complete_linkage(mut distances: CondensedDistances) -> Vec<Merge> {
    let n = distances.len();
    let mut active = vec![true; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while merges.len() + 1 < n {
        if chain.is_empty() {
            match active.iter().position(|&a| a) {
                Some(first) => chain.push(first),
                None => break,
            }
        }

        // Grow the chain until two clusters are reciprocal nearest neighbours
        let (x, y, height) = loop {
            let x = chain[chain.len() - 1];
            let previous = chain.len().checked_sub(2).map(|p| chain[p]);

            // On ties the previous chain element wins, otherwise the lowest index
            let mut nearest = previous.map(|p| (p, distances.get(x, p)));
            for k in (0..n).filter(|&k| active[k] && k != x) {
                let d = distances.get(x, k);
                match nearest {
                    Some((_, best)) if best <= d => {}
                    _ => nearest = Some((k, d)),
                }
            }

            match nearest {
                Some((y, d)) if Some(y) == previous => {
                    chain.truncate(chain.len() - 2);
                    break (x, y, d);
                }
                Some((y, _)) => chain.push(y),
                None => return merges,
            }
        };

        let (kept, absorbed) = if x < y { (x, y) } else { (y, x) };
        for k in (0..n).filter(|&k| active[k] && k != kept && k != absorbed) {
            let d = distances.get(k, kept).max(distances.get(k, absorbed));
            distances.set(k, kept, d);
        }
        active[absorbed] = false;
        merges.push(Merge {
            kept,
            absorbed,
            height,
        });
    }

    merges
}

/// Cut the dendrogram at `threshold` and label the observations
///
/// Labels start at 1 and are numbered by first occurrence in observation
/// order.
pub fn flat_clusters(n: usize, merges: &[Merge], threshold: f64) -> Vec<u32> {
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for merge in merges.iter().filter(|m| m.height <= threshold) {
        let a = find(&mut parent, merge.kept);
        let b = find(&mut parent, merge.absorbed);
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }

    let mut label_of_root: Vec<Option<u32>> = vec![None; n];
    let mut next_label = 0;
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let root = find(&mut parent, i);
        let label = *label_of_root[root].get_or_insert_with(|| {
            next_label += 1;
            next_label
        });
        labels.push(label);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condensed_indexing() {
        let d = CondensedDistances::from_points(&[0.0, 1.0, 3.0, 6.0]);
        assert_eq!(d.len(), 4);
        assert_eq!(d.get(0, 1), 1.0);
        assert_eq!(d.get(1, 0), 1.0);
        assert_eq!(d.get(0, 3), 6.0);
        assert_eq!(d.get(2, 3), 3.0);
        assert_eq!(d.get(1, 3), 5.0);
    }

    #[test]
    fn test_complete_linkage_heights() {
        let merges = complete_linkage(CondensedDistances::from_points(&[0.0, 1.0, 3.0, 6.0]));
        assert_eq!(merges.len(), 3);

        let mut heights: Vec<f64> = merges.iter().map(|m| m.height).collect();
        heights.sort_by(f64::total_cmp);
        // {0,1} at 1, {0,1,2} at 3, everything at 6
        assert_eq!(heights, vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_complete_linkage_uses_farthest_member() {
        // Single linkage would chain all three at 0.75; complete linkage
        // joins the last point only at the full span
        let points = [0.0, 0.5, 1.25];
        let merges = complete_linkage(CondensedDistances::from_points(&points));
        assert_eq!(flat_clusters(3, &merges, 0.8), vec![1, 1, 2]);
        assert_eq!(flat_clusters(3, &merges, 1.25), vec![1, 1, 1]);
    }

    #[test]
    fn test_flat_cluster_threshold_is_inclusive() {
        let points = [10.0, 10.5, 20.0];
        let merges = complete_linkage(CondensedDistances::from_points(&points));
        assert_eq!(flat_clusters(3, &merges, 0.5), vec![1, 1, 2]);
        assert_eq!(flat_clusters(3, &merges, 0.49), vec![1, 2, 3]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(complete_linkage(CondensedDistances::from_points(&[])).is_empty());
        assert!(complete_linkage(CondensedDistances::from_points(&[1.0])).is_empty());
        assert_eq!(flat_clusters(1, &[], 1.0), vec![1]);
        assert_eq!(flat_clusters(0, &[], 1.0), Vec::<u32>::new());
    }

    #[test]
    fn test_labels_follow_first_occurrence() {
        let points = [5.0, 1.0, 5.1, 1.1];
        let merges = complete_linkage(CondensedDistances::from_points(&points));
        assert_eq!(flat_clusters(4, &merges, 0.5), vec![1, 2, 1, 2]);
    }
}
