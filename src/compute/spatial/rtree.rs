//! Owned R-tree over city coordinates.
//!
//! The tree keeps point entries (`id` + [`Coordinate`]) in leaves and
//! longitude/latitude bounding boxes in internal nodes. Every internal node
//! owns its children; there are no parent pointers. All leaves sit at the
//! same depth.
//!
//! ## Construction
//!
//! - [`RTree::bulk_build`] packs entries bottom-up with Sort-Tile-Recursive
//!   ordering: sort by longitude, cut into vertical slices, sort each slice by
//!   latitude and pack runs of at most `max_entries` into leaves, then repeat
//!   on the leaves' centers until a single root remains. Leaf boxes come out
//!   tight and non-overlapping along each slice, which is why ingestion uses
//!   it instead of repeated inserts.
//! - [`RTree::insert`] descends to the child needing least area enlargement
//!   and splits overfull nodes with the quadratic heuristic. Splits propagate
//!   to the root, growing the tree by one level when the root splits.
//! - [`RTree::delete`] removes the leaf entry, dissolves nodes that fall under
//!   `min_entries` on the way back up and reinserts their entries.
//!
//! Queries live in [`super::queries`].

use crate::config::IndexConfig;
use crate::error::{GazetteerError, Result};
use crate::types::{BoundingBox, CityId, Coordinate};
use rustc_hash::FxHashMap;
use std::mem;

/// A point stored in a leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub id: CityId,
    pub location: Coordinate,
}

impl Entry {
    pub fn new(id: CityId, location: Coordinate) -> Self {
        Self { id, location }
    }

    fn bbox(&self) -> BoundingBox {
        BoundingBox::from_point(&self.location)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf {
        bbox: BoundingBox,
        entries: Vec<Entry>,
    },
    Internal {
        bbox: BoundingBox,
        children: Vec<Node>,
    },
}

impl Node {
    fn leaf(entries: Vec<Entry>) -> Self {
        let bbox = union_all(entries.iter().map(Entry::bbox));
        Node::Leaf { bbox, entries }
    }

    fn internal(children: Vec<Node>) -> Self {
        let bbox = union_all(children.iter().map(|c| *c.bbox()));
        Node::Internal { bbox, children }
    }

    pub(crate) fn bbox(&self) -> &BoundingBox {
        match self {
            Node::Leaf { bbox, .. } | Node::Internal { bbox, .. } => bbox,
        }
    }

    fn len(&self) -> usize {
        match self {
            Node::Leaf { entries, .. } => entries.len(),
            Node::Internal { children, .. } => children.len(),
        }
    }

    fn refresh_bbox(&mut self) {
        match self {
            Node::Leaf { bbox, entries } => {
                *bbox = union_all(entries.iter().map(Entry::bbox));
            }
            Node::Internal { bbox, children } => {
                *bbox = union_all(children.iter().map(|c| *c.bbox()));
            }
        }
    }

    fn drain_entries_into(self, out: &mut Vec<Entry>) {
        match self {
            Node::Leaf { entries, .. } => out.extend(entries),
            Node::Internal { children, .. } => {
                for child in children {
                    child.drain_entries_into(out);
                }
            }
        }
    }

    fn count_nodes(&self) -> (usize, usize) {
        match self {
            Node::Leaf { .. } => (1, 1),
            Node::Internal { children, .. } => {
                children.iter().fold((1, 0), |(nodes, leaves), child| {
                    let (n, l) = child.count_nodes();
                    (nodes + n, leaves + l)
                })
            }
        }
    }
}

/// Union of a non-empty set of boxes. An empty set yields a degenerate box at
/// the origin; only transiently empty nodes during delete ever see it.
fn union_all(mut boxes: impl Iterator<Item = BoundingBox>) -> BoundingBox {
    match boxes.next() {
        Some(first) => boxes.fold(first, |acc, b| acc.union(&b)),
        None => BoundingBox::from_bounds(0.0, 0.0, 0.0, 0.0),
    }
}

/// Statistics about the spatial index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpatialIndexStats {
    /// Number of indexed points
    pub entry_count: usize,
    /// Levels, 0 for an empty tree
    pub height: usize,
    /// Internal plus leaf nodes
    pub node_count: usize,
    pub leaf_count: usize,
}

/// R-tree over `(CityId, Coordinate)` points.
///
/// The tree also keeps an id-to-location map so deletes can descend straight
/// to the right leaf and duplicate ids are rejected on insert.
#[derive(Debug, Clone)]
pub struct RTree {
    pub(crate) root: Option<Node>,
    locations: FxHashMap<CityId, Coordinate>,
    height: usize,
    config: IndexConfig,
}

impl RTree {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            root: None,
            locations: FxHashMap::default(),
            height: 0,
            config,
        }
    }

    /// Build a packed tree from `entries` in one pass.
    ///
    /// Fails with `DuplicateId` if an id appears twice; nothing is built then.
    pub fn bulk_build(entries: Vec<Entry>, config: IndexConfig) -> Result<Self> {
        let mut locations =
            FxHashMap::with_capacity_and_hasher(entries.len(), Default::default());
        for entry in &entries {
            if locations.insert(entry.id, entry.location).is_some() {
                return Err(GazetteerError::DuplicateId(entry.id));
            }
        }

        if entries.is_empty() {
            return Ok(Self::new(config));
        }

        let count = entries.len();
        let max = config.max_entries;

        let mut level: Vec<Node> = str_pack(entries, max, |e| {
            (e.location.longitude(), e.location.latitude())
        })
        .into_iter()
        .map(Node::leaf)
        .collect();
        let mut height = 1;

        while level.len() > 1 {
            level = str_pack(level, max, |n| n.bbox().center())
                .into_iter()
                .map(Node::internal)
                .collect();
            height += 1;
        }

        log::debug!(
            "Bulk built R-tree: {} entries, height {}, fan-out {}",
            count,
            height,
            max
        );

        Ok(Self {
            root: level.pop(),
            locations,
            height,
            config,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, id: CityId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Indexed location of `id`, if present.
    pub fn location(&self, id: CityId) -> Option<Coordinate> {
        self.locations.get(&id).copied()
    }

    /// Ids currently indexed, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = CityId> + '_ {
        self.locations.keys().copied()
    }

    /// All entries, in no particular order.
    pub fn entries(&self) -> Vec<Entry> {
        self.locations
            .iter()
            .map(|(&id, &location)| Entry::new(id, location))
            .collect()
    }

    /// Insert a point. Fails with `DuplicateId` if `id` is already indexed.
    pub fn insert(&mut self, id: CityId, location: Coordinate) -> Result<()> {
        if self.locations.contains_key(&id) {
            return Err(GazetteerError::DuplicateId(id));
        }
        self.locations.insert(id, location);
        self.insert_entry(Entry::new(id, location));
        Ok(())
    }

    /// Remove `id` and return the location it was indexed at.
    pub fn delete(&mut self, id: CityId) -> Result<Coordinate> {
        let location = self
            .locations
            .remove(&id)
            .ok_or(GazetteerError::NotFound(id))?;

        let mut orphans = Vec::new();
        let removed = match self.root.as_mut() {
            Some(root) => remove_entry(
                root,
                id,
                &location,
                self.config.min_entries,
                &mut orphans,
            ),
            None => false,
        };
        debug_assert!(removed, "id {} present in map but not in tree", id);

        self.shrink_root();

        if !orphans.is_empty() {
            log::trace!("Condense reinserting {} entries", orphans.len());
        }
        for entry in orphans {
            self.insert_entry(entry);
        }

        Ok(location)
    }

    /// Move `id` to a new location, returning the previous one.
    pub fn relocate(&mut self, id: CityId, location: Coordinate) -> Result<Coordinate> {
        let previous = self.delete(id)?;
        self.locations.insert(id, location);
        self.insert_entry(Entry::new(id, location));
        Ok(previous)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.root = None;
        self.locations.clear();
        self.height = 0;
    }

    pub fn stats(&self) -> SpatialIndexStats {
        let (node_count, leaf_count) = self
            .root
            .as_ref()
            .map(Node::count_nodes)
            .unwrap_or((0, 0));

        SpatialIndexStats {
            entry_count: self.len(),
            height: self.height,
            node_count,
            leaf_count,
        }
    }

    /// Verify structural invariants: tight boxes, uniform leaf depth, fan-out
    /// bound, root shape and agreement between the tree and the id map.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let Some(root) = &self.root else {
            if !self.locations.is_empty() || self.height != 0 {
                return Err(format!(
                    "empty tree with {} mapped ids and height {}",
                    self.locations.len(),
                    self.height
                ));
            }
            return Ok(());
        };

        if let Node::Internal { children, .. } = root
            && children.len() < 2
        {
            return Err(format!("internal root has {} children", children.len()));
        }

        let mut seen = FxHashMap::default();
        self.check_node(root, 1, &mut seen)?;

        if seen.len() != self.locations.len() {
            return Err(format!(
                "tree holds {} entries, map holds {}",
                seen.len(),
                self.locations.len()
            ));
        }
        for (id, location) in &seen {
            if self.locations.get(id) != Some(location) {
                return Err(format!("entry {} disagrees with id map", id));
            }
        }

        Ok(())
    }

    fn check_node(
        &self,
        node: &Node,
        depth: usize,
        seen: &mut FxHashMap<CityId, Coordinate>,
    ) -> std::result::Result<(), String> {
        if node.len() > self.config.max_entries {
            return Err(format!(
                "node at depth {} holds {} > {}",
                depth,
                node.len(),
                self.config.max_entries
            ));
        }
        if node.len() == 0 {
            return Err(format!("empty node at depth {}", depth));
        }

        match node {
            Node::Leaf { bbox, entries } => {
                if depth != self.height {
                    return Err(format!("leaf at depth {} in tree of height {}", depth, self.height));
                }
                let tight = union_all(entries.iter().map(Entry::bbox));
                if tight != *bbox {
                    return Err(format!("leaf box {:?} is not tight ({:?})", bbox, tight));
                }
                for entry in entries {
                    if seen.insert(entry.id, entry.location).is_some() {
                        return Err(format!("id {} stored twice", entry.id));
                    }
                }
            }
            Node::Internal { bbox, children } => {
                let tight = union_all(children.iter().map(|c| *c.bbox()));
                if tight != *bbox {
                    return Err(format!("internal box {:?} is not tight ({:?})", bbox, tight));
                }
                for child in children {
                    self.check_node(child, depth + 1, seen)?;
                }
            }
        }

        Ok(())
    }

    fn insert_entry(&mut self, entry: Entry) {
        let Some(root) = self.root.as_mut() else {
            self.root = Some(Node::leaf(vec![entry]));
            self.height = 1;
            return;
        };

        let split = insert_into(root, entry, &self.config);
        if let Some(sibling) = split
            && let Some(old_root) = self.root.take()
        {
            log::trace!("Root split, height {} -> {}", self.height, self.height + 1);
            self.root = Some(Node::internal(vec![old_root, sibling]));
            self.height += 1;
        }
    }

    /// Collapse single-child internal roots and drop an empty root.
    fn shrink_root(&mut self) {
        while let Some(root) = self.root.take() {
            match root {
                Node::Internal { mut children, .. } if children.len() == 1 => {
                    self.root = children.pop();
                    self.height -= 1;
                }
                Node::Internal { children, .. } if children.is_empty() => {
                    self.height = 0;
                }
                Node::Leaf { entries, .. } if entries.is_empty() => {
                    self.height = 0;
                }
                other => {
                    self.root = Some(other);
                    break;
                }
            }
        }
        if self.root.is_none() {
            self.height = 0;
        }
    }
}

/// Insert `entry` below `node`, returning a new sibling if `node` split.
fn insert_into(node: &mut Node, entry: Entry, config: &IndexConfig) -> Option<Node> {
    match node {
        Node::Leaf { bbox, entries } => {
            entries.push(entry);
            *bbox = bbox.union(&entry.bbox());

            if entries.len() <= config.max_entries {
                return None;
            }

            let (left, right) =
                quadratic_split(mem::take(entries), Entry::bbox, config.min_entries);
            *entries = left;
            node.refresh_bbox();
            log::trace!("Leaf split");
            Some(Node::leaf(right))
        }
        Node::Internal { children, .. } => {
            let target = choose_subtree(children, &entry.bbox());
            if let Some(sibling) = insert_into(&mut children[target], entry, config) {
                children.push(sibling);
            }

            if children.len() <= config.max_entries {
                node.refresh_bbox();
                return None;
            }

            let (left, right) = quadratic_split(
                mem::take(children),
                |c: &Node| *c.bbox(),
                config.min_entries,
            );
            *children = left;
            node.refresh_bbox();
            log::trace!("Internal node split");
            Some(Node::internal(right))
        }
    }
}

/// Child needing least area enlargement to cover `target`; ties go to the
/// smaller resulting box, then to the lowest index.
fn choose_subtree(children: &[Node], target: &BoundingBox) -> usize {
    let mut best = 0;
    let mut best_key = (f64::INFINITY, f64::INFINITY);

    for (idx, child) in children.iter().enumerate() {
        let merged = child.bbox().union(target);
        let key = (merged.area() - child.bbox().area(), merged.area());
        if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
            best = idx;
            best_key = key;
        }
    }

    best
}

/// Remove `id` from the subtree. Children left with fewer than `min_entries`
/// are detached and their entries appended to `orphans`.
fn remove_entry(
    node: &mut Node,
    id: CityId,
    location: &Coordinate,
    min_entries: usize,
    orphans: &mut Vec<Entry>,
) -> bool {
    match node {
        Node::Leaf { entries, .. } => {
            let Some(pos) = entries.iter().position(|e| e.id == id) else {
                return false;
            };
            entries.remove(pos);
            node.refresh_bbox();
            true
        }
        Node::Internal { children, .. } => {
            let hit = children.iter_mut().position(|child| {
                child.bbox().contains_point(location)
                    && remove_entry(child, id, location, min_entries, orphans)
            });

            let Some(idx) = hit else {
                return false;
            };

            if children[idx].len() < min_entries {
                let underfull = children.remove(idx);
                underfull.drain_entries_into(orphans);
            }
            node.refresh_bbox();
            true
        }
    }
}

/// Quadratic split (Guttman): seed the two groups with the pair wasting the
/// most area, then repeatedly place the item with the strongest preference.
/// Each group ends with at least `min_entries` items.
fn quadratic_split<T>(
    items: Vec<T>,
    bounds: impl Fn(&T) -> BoundingBox,
    min_entries: usize,
) -> (Vec<T>, Vec<T>) {
    let boxes: Vec<BoundingBox> = items.iter().map(&bounds).collect();
    let n = boxes.len();

    // Points have zero area, so break waste ties on the union's half-perimeter.
    let mut seeds = (0, 1);
    let mut seed_key = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..n {
        for j in (i + 1)..n {
            let merged = boxes[i].union(&boxes[j]);
            let waste = merged.area() - boxes[i].area() - boxes[j].area();
            let margin = merged.width() + merged.height();
            if waste > seed_key.0 || (waste == seed_key.0 && margin > seed_key.1) {
                seeds = (i, j);
                seed_key = (waste, margin);
            }
        }
    }

    let mut group: Vec<Option<bool>> = vec![None; n];
    group[seeds.0] = Some(false);
    group[seeds.1] = Some(true);

    let mut cover = [boxes[seeds.0], boxes[seeds.1]];
    let mut sizes = [1usize, 1usize];
    let mut remaining = n - 2;

    while remaining > 0 {
        // Hand everything left to a group that would otherwise stay underfull.
        let forced = if sizes[0] + remaining <= min_entries {
            Some(false)
        } else if sizes[1] + remaining <= min_entries {
            Some(true)
        } else {
            None
        };

        if let Some(side) = forced {
            for (idx, slot) in group.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = Some(side);
                    cover[usize::from(side)] = cover[usize::from(side)].union(&boxes[idx]);
                }
            }
            sizes[usize::from(side)] += remaining;
            break;
        }

        // Preference is the enlargement difference, with half-perimeter growth
        // deciding between items that enlarge neither group's area.
        let mut pick = None;
        let mut pick_pref = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (idx, slot) in group.iter().enumerate() {
            if slot.is_some() {
                continue;
            }
            let growth = [
                (cover[0].enlargement(&boxes[idx]), margin_growth(&cover[0], &boxes[idx])),
                (cover[1].enlargement(&boxes[idx]), margin_growth(&cover[1], &boxes[idx])),
            ];
            let pref = (
                (growth[0].0 - growth[1].0).abs(),
                (growth[0].1 - growth[1].1).abs(),
            );
            if pref.0 > pick_pref.0 || (pref.0 == pick_pref.0 && pref.1 > pick_pref.1) {
                pick = Some((idx, growth));
                pick_pref = pref;
            }
        }

        let Some((idx, [(d0, m0), (d1, m1)])) = pick else {
            break;
        };

        let side = if d0 != d1 {
            d1 < d0
        } else if m0 != m1 {
            m1 < m0
        } else if cover[0].area() != cover[1].area() {
            cover[1].area() < cover[0].area()
        } else {
            sizes[1] < sizes[0]
        };

        group[idx] = Some(side);
        cover[usize::from(side)] = cover[usize::from(side)].union(&boxes[idx]);
        sizes[usize::from(side)] += 1;
        remaining -= 1;
    }

    let mut left = Vec::with_capacity(sizes[0]);
    let mut right = Vec::with_capacity(sizes[1]);
    for (item, side) in items.into_iter().zip(group) {
        if side == Some(true) {
            right.push(item);
        } else {
            left.push(item);
        }
    }

    (left, right)
}

fn margin_growth(cover: &BoundingBox, other: &BoundingBox) -> f64 {
    let merged = cover.union(other);
    (merged.width() + merged.height()) - (cover.width() + cover.height())
}

/// Sort-Tile-Recursive grouping of `items` into runs of at most `max`, using
/// `center` as the sort key. Groups within a slice are balanced in size.
fn str_pack<T>(items: Vec<T>, max: usize, center: impl Fn(&T) -> (f64, f64)) -> Vec<Vec<T>> {
    let count = items.len();
    let group_count = count.div_ceil(max);
    let slice_count = (group_count as f64).sqrt().ceil().max(1.0) as usize;
    let per_slice = group_count.div_ceil(slice_count) * max;

    let mut keyed: Vec<((f64, f64), T)> = items.into_iter().map(|t| (center(&t), t)).collect();
    keyed.sort_by(|a, b| a.0.0.total_cmp(&b.0.0).then(a.0.1.total_cmp(&b.0.1)));

    let mut groups = Vec::with_capacity(group_count);
    let mut iter = keyed.into_iter();
    loop {
        let mut slice: Vec<((f64, f64), T)> = iter.by_ref().take(per_slice).collect();
        if slice.is_empty() {
            break;
        }
        slice.sort_by(|a, b| a.0.1.total_cmp(&b.0.1).then(a.0.0.total_cmp(&b.0.0)));

        let runs = slice.len().div_ceil(max);
        let base = slice.len() / runs;
        let extra = slice.len() % runs;
        let mut members = slice.into_iter().map(|(_, t)| t);
        for run in 0..runs {
            let size = base + usize::from(run < extra);
            groups.push(members.by_ref().take(size).collect());
        }
    }

    groups
}
