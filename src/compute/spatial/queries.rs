//! Read-only queries over [`RTree`]: bounding box, radius and k-nearest.
//!
//! Bounding box and radius queries descend only into nodes whose box
//! intersects the query region. Radius queries prune with the conservative
//! cap box from [`covering_boxes`] and then filter exactly with haversine.
//! k-nearest is a best-first search ordered by a lower bound on the distance
//! from the query point to each node's box.

use super::algorithms::{covering_boxes, haversine_distance, min_distance_to_box};
use super::rtree::{Node, RTree};
use crate::types::{BoundingBox, CityId, Coordinate};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A `(distance, id)` pair ordered by distance, then id.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    distance: f64,
    id: CityId,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

/// Frontier item: a node keyed by the lower bound on its distance.
struct Pending<'a> {
    bound: f64,
    node: &'a Node,
}

impl PartialEq for Pending<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bound.total_cmp(&other.bound) == Ordering::Equal
    }
}

impl Eq for Pending<'_> {}

impl PartialOrd for Pending<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound.total_cmp(&other.bound)
    }
}

impl RTree {
    /// Ids of all points inside `bbox` (edges inclusive), ascending.
    pub fn bounding_box_query(&self, bbox: &BoundingBox) -> Vec<CityId> {
        let mut ids = Vec::new();
        self.collect_in_box(bbox, |id, _| ids.push(id));
        ids.sort_unstable();
        ids
    }

    /// Points within `radius_meters` of `center` with their distances,
    /// ordered by `(distance, id)`.
    pub fn radius_query(&self, center: &Coordinate, radius_meters: f64) -> Vec<(CityId, f64)> {
        let mut hits = Vec::new();

        for region in covering_boxes(center, radius_meters) {
            self.collect_in_box(&region, |id, location| {
                let distance = haversine_distance(center, location);
                if distance <= radius_meters {
                    hits.push(Ranked { distance, id });
                }
            });
        }

        hits.sort_unstable();
        // Split cover boxes share the antimeridian edge.
        hits.dedup_by_key(|r| r.id);
        hits.into_iter().map(|r| (r.id, r.distance)).collect()
    }

    /// The `k` points closest to `center`, ordered by `(distance, id)`.
    /// Returns fewer than `k` when the tree is smaller.
    pub fn nearest(&self, center: &Coordinate, k: usize) -> Vec<(CityId, f64)> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut frontier = BinaryHeap::new();
        frontier.push(Reverse(Pending {
            bound: min_distance_to_box(center, root.bbox()),
            node: root,
        }));

        // Max-heap of the best k so far; the top is the current k-th best.
        let mut best: BinaryHeap<Ranked> =
            BinaryHeap::with_capacity(k.min(self.len()).saturating_add(1));

        while let Some(Reverse(Pending { bound, node })) = frontier.pop() {
            if best.len() == k
                && let Some(worst) = best.peek()
                && bound > worst.distance
            {
                break;
            }

            match node {
                Node::Leaf { entries, .. } => {
                    for entry in entries {
                        let candidate = Ranked {
                            distance: haversine_distance(center, &entry.location),
                            id: entry.id,
                        };
                        if best.len() < k {
                            best.push(candidate);
                        } else if let Some(worst) = best.peek()
                            && candidate < *worst
                        {
                            best.pop();
                            best.push(candidate);
                        }
                    }
                }
                Node::Internal { children, .. } => {
                    for child in children {
                        let bound = min_distance_to_box(center, child.bbox());
                        if best.len() == k
                            && let Some(worst) = best.peek()
                            && bound > worst.distance
                        {
                            continue;
                        }
                        frontier.push(Reverse(Pending { bound, node: child }));
                    }
                }
            }
        }

        best.into_sorted_vec()
            .into_iter()
            .map(|r| (r.id, r.distance))
            .collect()
    }

    fn collect_in_box(&self, bbox: &BoundingBox, mut visit: impl FnMut(CityId, &Coordinate)) {
        let Some(root) = &self.root else {
            return;
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !node.bbox().intersects(bbox) {
                continue;
            }
            match node {
                Node::Leaf { entries, .. } => {
                    for entry in entries {
                        if bbox.contains_point(&entry.location) {
                            visit(entry.id, &entry.location);
                        }
                    }
                }
                Node::Internal { children, .. } => {
                    stack.extend(children.iter().filter(|c| c.bbox().intersects(bbox)));
                }
            }
        }
    }
}
