// Grouping policies for one level of the memory tree
// Every strategy returns ceil(n / max_children) groups of 1..=max_children indices


use itertools::Itertools;

use crate::embeddings::mean;

/// Partitions one tree level into parent groups
pub trait ClusteringStrategy: Send + Sync {
    /// Index groups covering `0..embeddings.len()` exactly once.
    ///
    /// Each group holds between 1 and `max_children` indices, in ascending order.
    fn cluster(&self, embeddings: &[&[f32]], max_children: usize) -> Vec<Vec<usize>>;

    fn name(&self) -> &'static str;
}

/// Groups neighbours in document order
#[derive(Debug, Clone, Copy, Default)]
pub struct ContiguousClustering;

impl ClusteringStrategy for ContiguousClustering {
    #[inline]
    fn cluster(&self, embeddings: &[&[f32]], max_children: usize) -> Vec<Vec<usize>> {
        let max_children = max_children.max(1);
        (0..embeddings.len())
            .chunks(max_children)
            .into_iter()
            .map(Iterator::collect)
            .collect()
    }

    #[inline]
    fn name(&self) -> &'static str {
        "contiguous"
    }
}

/// Capacity-constrained k-means over node embeddings.
///
/// Uses `k = ceil(n / max_children)` centroids seeded from evenly spaced
/// nodes. Each round assigns node/centroid pairs greedily by ascending
/// squared distance while centroids have room, then moves every centroid to
/// the mean of its members. Because `(k - 1) * max_children < n`, no group
/// ends up empty. Output is deterministic for identical input.
#[derive(Debug, Clone, Copy)]
pub struct BalancedKMeansClustering {
    max_iterations: usize,
}

impl BalancedKMeansClustering {
    #[inline]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }

    fn assign(
        embeddings: &[&[f32]],
        centroids: &[Vec<f32>],
        max_children: usize,
    ) -> Vec<usize> {
        let pairs = embeddings
            .iter()
            .enumerate()
            .flat_map(|(node, embedding)| {
                centroids
                    .iter()
                    .enumerate()
                    .map(move |(centroid, center)| (squared_distance(embedding, center), node, centroid))
            })
            .sorted_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then_with(|| a.1.cmp(&b.1))
                    .then_with(|| a.2.cmp(&b.2))
            });

        let mut assignment = vec![usize::MAX; embeddings.len()];
        let mut load = vec![0usize; centroids.len()];
        let mut remaining = embeddings.len();

        for (_, node, centroid) in pairs {
            if remaining == 0 {
                break;
            }
            if assignment[node] == usize::MAX && load[centroid] < max_children {
                assignment[node] = centroid;
                load[centroid] += 1;
                remaining -= 1;
            }
        }

        assignment
    }
}

impl Default for BalancedKMeansClustering {
    #[inline]
    fn default() -> Self {
        Self::new(10)
    }
}

impl ClusteringStrategy for BalancedKMeansClustering {
    #[inline]
    fn cluster(&self, embeddings: &[&[f32]], max_children: usize) -> Vec<Vec<usize>> {
        let n = embeddings.len();
        let max_children = max_children.max(1);
        if n <= max_children {
            return ContiguousClustering.cluster(embeddings, max_children);
        }

        let k = n.div_ceil(max_children);
        let mut centroids: Vec<Vec<f32>> = (0..k).map(|i| embeddings[i * n / k].to_vec()).collect();
        let mut assignment = Vec::new();

        for _ in 0..self.max_iterations {
            let next = Self::assign(embeddings, &centroids, max_children);
            if next == assignment {
                break;
            }
            assignment = next;

            for (centroid, center) in centroids.iter_mut().enumerate() {
                let members = assignment
                    .iter()
                    .enumerate()
                    .filter(|(_, assigned)| **assigned == centroid)
                    .map(|(node, _)| embeddings[node]);
                if let Some(updated) = mean(members) {
                    *center = updated;
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (node, centroid) in assignment.into_iter().enumerate() {
            if let Some(group) = groups.get_mut(centroid) {
                group.push(node);
            }
        }

        groups.retain(|group| !group.is_empty());
        groups.sort_by_key(|group| group.first().copied());
        groups
    }

    #[inline]
    fn name(&self) -> &'static str {
        "balanced-kmeans"
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
