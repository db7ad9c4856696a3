use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::IRect;

/// An entry in the R-tree spatial index, tagging a rectangle with the id of
/// the shape (or rectangle) it belongs to.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: usize,
    pub rect: IRect,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.rect.x1, self.rect.y1], [self.rect.x2, self.rect.y2])
    }
}

/// Spatial index over rectangles for candidate-pair pruning in spacing,
/// enclosure, and connectivity queries.
pub struct RectIndex {
    tree: RTree<IndexEntry>,
}

impl RectIndex {
    pub fn build(entries: Vec<IndexEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// All entries whose closed envelope intersects `probe`. Envelope
    /// intersection is closed, so entries that merely touch the probe are
    /// returned as well; callers filter with the half-open predicates.
    pub fn query(&self, probe: &IRect) -> impl Iterator<Item = &IndexEntry> {
        let envelope = AABB::from_corners([probe.x1, probe.y1], [probe.x2, probe.y2]);
        self.tree.locate_in_envelope_intersecting(&envelope)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_includes_touching() {
        let entries = vec![
            IndexEntry {
                id: 0,
                rect: IRect::new(0, 0, 10, 10),
            },
            IndexEntry {
                id: 1,
                rect: IRect::new(10, 0, 20, 10),
            },
            IndexEntry {
                id: 2,
                rect: IRect::new(50, 50, 60, 60),
            },
        ];
        let index = RectIndex::build(entries);

        let mut hits: Vec<usize> = index.query(&IRect::new(0, 0, 10, 10)).map(|e| e.id).collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);

        let far: Vec<usize> = index.query(&IRect::new(30, 30, 40, 40)).map(|e| e.id).collect();
        assert!(far.is_empty());
    }
}
