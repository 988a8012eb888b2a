//! Interior/border partitioning of a grid's index domain.
//!
//! A [`BoundaryStrategy`] decides which index ranges receive the interior
//! stencil and which receive the border condition. The solver only ever talks
//! to the trait, so a different domain shape or boundary treatment plugs in at
//! engine construction without touching the cycle logic.

/// Axis-aligned block of grid indices `[origin, origin + extent)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub origin: [u32; 2],
    pub extent: [u32; 2],
}

impl IndexRange {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            origin: [x, y],
            extent: [width, height],
        }
    }

    /// The whole `width x height` grid.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.extent[0] == 0 || self.extent[1] == 0
    }

    pub fn len(&self) -> usize {
        self.extent[0] as usize * self.extent[1] as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.origin[0]
            && y >= self.origin[1]
            && x - self.origin[0] < self.extent[0]
            && y - self.origin[1] < self.extent[1]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let [x0, y0] = self.origin;
        let [w, h] = self.extent;
        (y0..y0 + h).flat_map(move |y| (x0..x0 + w).map(move |x| (x, y)))
    }
}

/// Where a strategy sends the interior kernel and where the border kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryPartition {
    pub interior: IndexRange,
    pub border: Vec<IndexRange>,
}

impl BoundaryPartition {
    pub fn ranges(&self) -> impl Iterator<Item = &IndexRange> {
        std::iter::once(&self.interior).chain(self.border.iter())
    }

    /// Number of times each point of a `width x height` grid is covered,
    /// row-major. A well-formed partition is all ones.
    pub fn coverage(&self, width: u32, height: u32) -> Vec<u32> {
        let mut counts = vec![0u32; width as usize * height as usize];
        for range in self.ranges() {
            for (x, y) in range.iter() {
                if x < width && y < height {
                    counts[(y * width + x) as usize] += 1;
                }
            }
        }
        counts
    }
}

/// Sink for rectangular kernel launches.
///
/// `K` is whatever identifies a kernel for the queue: compiled pipelines plus
/// bindings on the device, or plain labels in a recording queue.
pub trait RangeQueue<K: ?Sized> {
    fn enqueue(&mut self, kernel: &K, range: IndexRange);
}

pub trait BoundaryStrategy {
    fn name(&self) -> &'static str;

    /// Splits a `width x height` grid into interior and border ranges.
    /// Both dimensions must be at least 2.
    fn partition(&self, width: u32, height: u32) -> BoundaryPartition;

    /// Enqueues `interior` over the interior range and `border` over every
    /// border range, back to back. The ranges are disjoint, so the launches
    /// need no ordering between each other.
    fn dispatch<K: ?Sized, Q: RangeQueue<K>>(
        &self,
        queue: &mut Q,
        interior: &K,
        border: &K,
        width: u32,
        height: u32,
    ) {
        let partition = self.partition(width, height);
        if !partition.interior.is_empty() {
            queue.enqueue(interior, partition.interior);
        }
        for range in partition.border.iter().filter(|r| !r.is_empty()) {
            queue.enqueue(border, *range);
        }
    }
}

/// Rectangular domain: the outermost ring of points is the border.
#[derive(Debug, Clone, Copy, Default)]
pub struct RectangularBoundary;

impl BoundaryStrategy for RectangularBoundary {
    fn name(&self) -> &'static str {
        "rectangular"
    }

    fn partition(&self, width: u32, height: u32) -> BoundaryPartition {
        let inner_w = width.saturating_sub(2);
        let inner_h = height.saturating_sub(2);
        let last_x = width.saturating_sub(1);
        let last_y = height.saturating_sub(1);

        BoundaryPartition {
            interior: IndexRange::new(1, 1, inner_w, inner_h),
            border: vec![
                // top and bottom rows, corners included
                IndexRange::new(0, 0, width, 1),
                IndexRange::new(0, last_y, width, 1),
                // left and right columns between the rows
                IndexRange::new(0, 1, 1, inner_h),
                IndexRange::new(last_x, 1, 1, inner_h),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingQueue {
        launches: Vec<(String, IndexRange)>,
    }

    impl RangeQueue<str> for RecordingQueue {
        fn enqueue(&mut self, kernel: &str, range: IndexRange) {
            self.launches.push((kernel.to_string(), range));
        }
    }

    #[test]
    fn rectangular_partition_covers_every_point_once() {
        let boundary = RectangularBoundary;
        for (w, h) in [(3, 3), (9, 9), (4, 7), (17, 5), (2, 2), (2, 6), (33, 3)] {
            let partition = boundary.partition(w, h);
            let coverage = partition.coverage(w, h);
            assert!(
                coverage.iter().all(|&c| c == 1),
                "{}x{} coverage: {:?}",
                w,
                h,
                coverage
            );
            let total: usize = partition.ranges().map(IndexRange::len).sum();
            assert_eq!(total, (w * h) as usize);
        }
    }

    #[test]
    fn dispatch_issues_interior_then_four_borders() {
        let mut queue = RecordingQueue::default();
        RectangularBoundary.dispatch(&mut queue, "relax", "border", 9, 7);

        let labels: Vec<&str> = queue.launches.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(labels, ["relax", "border", "border", "border", "border"]);
        assert_eq!(queue.launches[0].1, IndexRange::new(1, 1, 7, 5));
        assert_eq!(queue.launches[1].1, IndexRange::new(0, 0, 9, 1));
        assert_eq!(queue.launches[2].1, IndexRange::new(0, 6, 9, 1));
        assert_eq!(queue.launches[3].1, IndexRange::new(0, 1, 1, 5));
        assert_eq!(queue.launches[4].1, IndexRange::new(8, 1, 1, 5));
    }

    #[test]
    fn dispatch_skips_empty_ranges() {
        let mut queue = RecordingQueue::default();
        RectangularBoundary.dispatch(&mut queue, "relax", "border", 2, 2);
        // no interior and no side columns on a 2x2 grid
        assert_eq!(queue.launches.len(), 2);
        assert!(queue.launches.iter().all(|(k, _)| k == "border"));
    }

    #[test]
    fn index_range_contains_and_iter_agree() {
        let range = IndexRange::new(2, 1, 3, 2);
        let points: Vec<_> = range.iter().collect();
        assert_eq!(points.len(), range.len());
        assert!(points.iter().all(|&(x, y)| range.contains(x, y)));
        assert!(!range.contains(1, 1));
        assert!(!range.contains(5, 1));
        assert!(IndexRange::new(0, 0, 0, 4).is_empty());
    }
}
