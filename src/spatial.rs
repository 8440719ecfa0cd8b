//! Uniform-grid broad phase over an occluder set.
//!
//! Buckets only narrow candidate sets; they never decide visibility.
//! Queries return sorted, deduplicated segment indices so downstream
//! iteration order never depends on bucket layout.

use crate::types::OccluderSet;

/// Default bucket edge length in world cells.
pub const DEFAULT_BUCKET_SIZE: f64 = 4.0;

pub struct SpatialIndex {
    bucket_size: f64,
    min_x: f64,
    min_y: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<u32>>,
}

impl SpatialIndex {
    /// Build an index over the set's bounds. An empty set (or a
    /// nonsensical bucket size) produces an index with no buckets,
    /// which every query answers with an empty candidate list.
    pub fn build(set: &OccluderSet, bucket_size: f64) -> Self {
        if set.segments.is_empty() || set.bounds.is_empty() || bucket_size <= 0.0 {
            return Self {
                bucket_size: bucket_size.max(1.0),
                min_x: 0.0,
                min_y: 0.0,
                cols: 0,
                rows: 0,
                buckets: Vec::new(),
            };
        }

        let bounds = set.bounds;
        let cols = (bounds.width() / bucket_size).ceil().max(1.0) as usize;
        let rows = (bounds.height() / bucket_size).ceil().max(1.0) as usize;
        let mut index = Self {
            bucket_size,
            min_x: bounds.min_x,
            min_y: bounds.min_y,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        };

        for (i, seg) in set.segments.iter().enumerate() {
            let lo_x = seg.x1.min(seg.x2);
            let hi_x = seg.x1.max(seg.x2);
            let lo_y = seg.y1.min(seg.y2);
            let hi_y = seg.y1.max(seg.y2);
            let (c0, r0) = index.clamped_cell(lo_x, lo_y);
            let (c1, r1) = index.clamped_cell(hi_x, hi_y);
            for r in r0..=r1 {
                for c in c0..=c1 {
                    index.buckets[r * cols + c].push(i as u32);
                }
            }
        }
        index
    }

    /// Unclamped cell coordinates for a world point.
    fn cell(&self, x: f64, y: f64) -> (i64, i64) {
        (
            ((x - self.min_x) / self.bucket_size).floor() as i64,
            ((y - self.min_y) / self.bucket_size).floor() as i64,
        )
    }

    fn clamped_cell(&self, x: f64, y: f64) -> (usize, usize) {
        let (c, r) = self.cell(x, y);
        (
            c.clamp(0, self.cols as i64 - 1) as usize,
            r.clamp(0, self.rows as i64 - 1) as usize,
        )
    }

    fn push_ring(&self, c: i64, r: i64, out: &mut Vec<u32>) {
        for dr in -1..=1i64 {
            for dc in -1..=1i64 {
                let rc = c + dc;
                let rr = r + dr;
                if rc < 0 || rr < 0 || rc >= self.cols as i64 || rr >= self.rows as i64 {
                    continue;
                }
                out.extend_from_slice(&self.buckets[rr as usize * self.cols + rc as usize]);
            }
        }
    }

    /// Candidate segments along a ray: step in bucket-size increments
    /// out to `max_dist`, taking each step's 3x3 bucket neighbourhood.
    /// The one-ring margin tolerates rays grazing bucket boundaries.
    /// `(dx, dy)` must be a unit direction.
    pub fn ray_candidates(
        &self,
        ox: f64,
        oy: f64,
        dx: f64,
        dy: f64,
        max_dist: f64,
        out: &mut Vec<u32>,
    ) {
        out.clear();
        if self.buckets.is_empty() || max_dist <= 0.0 {
            return;
        }
        let steps = (max_dist / self.bucket_size).ceil() as i64;
        for k in 0..=steps {
            let t = (k as f64 * self.bucket_size).min(max_dist);
            let (c, r) = self.cell(ox + dx * t, oy + dy * t);
            self.push_ring(c, r, out);
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Candidate segments for every bucket overlapping the disc's
    /// bounding box. Used to gather corner-injection endpoints.
    pub fn disc_candidates(&self, cx: f64, cy: f64, radius: f64, out: &mut Vec<u32>) {
        out.clear();
        if self.buckets.is_empty() || radius <= 0.0 {
            return;
        }
        let (c0, r0) = self.cell(cx - radius, cy - radius);
        let (c1, r1) = self.cell(cx + radius, cy + radius);
        if c1 < 0 || r1 < 0 || c0 >= self.cols as i64 || r0 >= self.rows as i64 {
            return;
        }
        let c0 = c0.clamp(0, self.cols as i64 - 1) as usize;
        let r0 = r0.clamp(0, self.rows as i64 - 1) as usize;
        let c1 = c1.clamp(0, self.cols as i64 - 1) as usize;
        let r1 = r1.clamp(0, self.rows as i64 - 1) as usize;
        for r in r0..=r1 {
            for c in c0..=c1 {
                out.extend_from_slice(&self.buckets[r * self.cols + c]);
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}

// -- Tests ---------------------------------------------------------
