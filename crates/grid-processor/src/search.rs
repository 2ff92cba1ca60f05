//! Neighbour search over points on the unit sphere.

use ordered_float::OrderedFloat;

/// Relative tolerance under which two squared distances count as equal.
const TIE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    xyz: [f64; 3],
    idx: usize,
}

/// k-d tree of unit-sphere positions tagged with their flat grid index.
///
/// Distances are chords, which order points exactly like great-circle
/// distances do.
pub struct PointIndex {
    tree: kd_tree::KdTreeN<IndexedPoint, typenum::U3>,
}

impl PointIndex {
    /// Index `points`, tagging each with its position in the iterator.
    pub fn new(points: impl IntoIterator<Item = [f64; 3]>) -> Self {
        let items: Vec<IndexedPoint> = points
            .into_iter()
            .enumerate()
            .map(|(idx, xyz)| IndexedPoint { xyz, idx })
            .collect();
        let tree = kd_tree::KdTreeN::build_by_key(items, |item, k| OrderedFloat(item.xyz[k]));
        Self { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Index of the closest point. Equidistant points resolve to the lowest
    /// index, so results do not depend on the tree layout.
    pub fn nearest(&self, query: &[f64; 3]) -> Option<usize> {
        let found = self.tree.nearest_by(query, |item, k| item.xyz[k])?;
        let d2 = found.squared_distance;
        let limit = d2 + TIE_TOLERANCE * d2.max(1e-300);
        let half = limit.sqrt();

        // Rare in practice, but regular grids put destinations exactly
        // between source points.
        self.tree
            .within_by(&bounding_box(query, half), |item, k| item.xyz[k])
            .into_iter()
            .filter(|item| squared_distance(&item.xyz, query) <= limit)
            .map(|item| item.idx)
            .min()
            .or(Some(found.item.idx))
    }

    /// Indices of every point within `chord` of `query`, sorted.
    pub fn within_chord(&self, query: &[f64; 3], chord: f64) -> Vec<usize> {
        let limit = chord * chord;
        let mut found: Vec<usize> = self
            .tree
            .within_by(&bounding_box(query, chord), |item, k| item.xyz[k])
            .into_iter()
            .filter(|item| squared_distance(&item.xyz, query) <= limit)
            .map(|item| item.idx)
            .collect();
        found.sort_unstable();
        found
    }
}

fn bounding_box(center: &[f64; 3], half: f64) -> [[f64; 3]; 2] {
    [
        [center[0] - half, center[1] - half, center[2] - half],
        [center[0] + half, center[1] + half, center[2] + half],
    ]
}

#[inline]
fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> PointIndex {
        PointIndex::new((0..5).map(|i| [i as f64, 0.0, 0.0]))
    }

    #[test]
    fn test_nearest() {
        let idx = line();
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.nearest(&[2.2, 0.0, 0.0]), Some(2));
        assert_eq!(idx.nearest(&[9.0, 1.0, 0.0]), Some(4));
    }

    #[test]
    fn test_nearest_tie_takes_lowest_index() {
        let idx = line();
        assert_eq!(idx.nearest(&[1.5, 0.0, 0.0]), Some(1));
        assert_eq!(idx.nearest(&[3.5, 0.0, 0.0]), Some(3));

        // Duplicate coordinates, inserted in reverse index order
        let dup = PointIndex::new(vec![[1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
        assert_eq!(dup.nearest(&[0.1, 0.0, 0.0]), Some(1));
    }

    #[test]
    fn test_within_chord_sorted() {
        let idx = line();
        assert_eq!(idx.within_chord(&[2.0, 0.0, 0.0], 1.0), vec![1, 2, 3]);
        assert_eq!(idx.within_chord(&[2.0, 0.9, 0.0], 1.0), vec![2]);
        assert!(idx.within_chord(&[20.0, 0.0, 0.0], 1.0).is_empty());
    }
}
