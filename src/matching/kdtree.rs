//! Two-dimensional k-d tree for exact nearest-neighbor queries.

use std::cmp::Ordering;

use super::Point;

/// Static k-d tree over a borrowed point slice.
///
/// Stored implicitly: the median of every sub-range of `order` is that
/// subtree's root, split on latitude at even depths and longitude at odd
/// depths.
#[derive(Debug)]
pub struct KdTree<'a> {
    points: &'a [Point],
    order: Vec<usize>,
}

impl<'a> KdTree<'a> {
    /// Builds the tree in `O(n log n)` expected time.
    ///
    /// Coordinates must be finite.
    pub fn build(points: &'a [Point]) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        partition(&mut order, points, 0);
        Self { points, order }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Index of the point closest to `query` under Euclidean distance.
    ///
    /// Among equidistant points the lowest index wins, so results do not
    /// depend on tree layout. Returns `None` for an empty tree.
    pub fn nearest(&self, query: Point) -> Option<usize> {
        let mut best = None;
        self.search(0, self.order.len(), 0, query, &mut best);
        best.map(|(_, idx)| idx)
    }

    fn search(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        query: Point,
        best: &mut Option<(f64, usize)>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let idx = self.order[mid];
        let node = self.points[idx];

        let d = query.distance_squared(node);
        let better = match *best {
            None => true,
            Some((bd, bi)) => d < bd || (d == bd && idx < bi),
        };
        if better {
            *best = Some((d, idx));
        }

        let diff = query.coord(depth % 2) - node.coord(depth % 2);
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.search(near.0, near.1, depth + 1, query, best);
        // equality keeps equidistant candidates on the far side reachable
        let far_reachable = match *best {
            None => true,
            Some((bd, _)) => diff * diff <= bd,
        };
        if far_reachable {
            self.search(far.0, far.1, depth + 1, query, best);
        }
    }
}

fn partition(order: &mut [usize], points: &[Point], depth: usize) {
    if order.len() <= 1 {
        return;
    }
    let axis = depth % 2;
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| by_axis(points, axis, a, b));
    let (left, right) = order.split_at_mut(mid);
    partition(left, points, depth + 1);
    partition(&mut right[1..], points, depth + 1);
}

fn by_axis(points: &[Point], axis: usize, a: usize, b: usize) -> Ordering {
    points[a]
        .coord(axis)
        .total_cmp(&points[b].coord(axis))
        .then(a.cmp(&b))
}
