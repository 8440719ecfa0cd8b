//! Visibility polygon computation via adaptive ray casting.
//!
//! A coarse uniform fan finds silhouette discontinuities, a bounded
//! refinement budget densifies them, and exact bearing angles (plus a
//! hair to either side) are injected for every occluder corner in
//! range, so shadow boundaries pin to obstruction corners instead of
//! being approximated by interpolation. The angle set is built as a
//! pure value pipeline, then every retained angle is cast once.

use std::f64::consts::TAU;

use crate::spatial::SpatialIndex;
use crate::types::{OccluderSet, Point2D, Segment};

/// Points on the unobstructed fallback circle.
const CIRCLE_POINTS: usize = 32;

/// Cross products below this magnitude count as parallel.
const PARALLEL_EPS: f64 = 1e-8;

/// Hits slightly behind the origin still count as forward.
const RAY_T_MIN: f64 = -1e-6;

/// Parametric slack beyond the segment's endpoints.
const SEG_S_EPS: f64 = 1e-6;

/// Angular nudge cast on either side of an endpoint bearing.
const CORNER_EPS: f64 = 1e-5;

/// Angles closer than this are one ray.
const ANGLE_DEDUP_EPS: f64 = 1e-9;

/// Relative distance jump between neighbouring base rays that flags a
/// silhouette edge, as a fraction of the light radius.
const EDGE_THRESHOLD: f64 = 0.05;

/// Distance along the ray `(ox, oy) + t * (dx, dy)` to the segment,
/// via the parametric cross-product solve. `None` on parallel or
/// out-of-range pairs; degenerate zero-length segments are rejected by
/// the parallel test. The returned distance is clamped to >= 0.
/// `(dx, dy)` must be a unit direction for `t` to be a distance.
pub fn ray_segment_distance(ox: f64, oy: f64, dx: f64, dy: f64, seg: &Segment) -> Option<f64> {
    let sx = seg.x2 - seg.x1;
    let sy = seg.y2 - seg.y1;
    let cross = dx * sy - dy * sx;
    if cross.abs() < PARALLEL_EPS {
        return None;
    }
    let wx = seg.x1 - ox;
    let wy = seg.y1 - oy;
    let t = (wx * sy - wy * sx) / cross;
    let s = (wx * dy - wy * dx) / cross;
    if t >= RAY_T_MIN && (-SEG_S_EPS..=1.0 + SEG_S_EPS).contains(&s) {
        Some(t.max(0.0))
    } else {
        None
    }
}

/// Closest hit along one angle, clipped to `radius`. With an index the
/// candidate list only ever narrows the scan; the intersection math is
/// identical, so indexed and unindexed results agree.
fn cast_distance(
    ox: f64,
    oy: f64,
    angle: f64,
    radius: f64,
    segments: &[Segment],
    index: Option<&SpatialIndex>,
    scratch: &mut Vec<u32>,
) -> f64 {
    let dx = angle.cos();
    let dy = angle.sin();
    let mut min_t = radius;
    match index {
        Some(ix) => {
            ix.ray_candidates(ox, oy, dx, dy, radius, scratch);
            for &si in scratch.iter() {
                if let Some(seg) = segments.get(si as usize) {
                    if let Some(t) = ray_segment_distance(ox, oy, dx, dy, seg) {
                        if t < min_t {
                            min_t = t;
                        }
                    }
                }
            }
        }
        None => {
            for seg in segments {
                if let Some(t) = ray_segment_distance(ox, oy, dx, dy, seg) {
                    if t < min_t {
                        min_t = t;
                    }
                }
            }
        }
    }
    min_t
}

/// Extra angles for flagged base intervals: the refinement budget is
/// split evenly across every interval whose neighbouring base rays
/// disagree by more than 5% of the radius.
fn refinement_angles(
    base_dists: &[f64],
    radius: f64,
    delta: f64,
    budget: usize,
) -> Vec<f64> {
    let n = base_dists.len();
    let mut flagged = Vec::new();
    for i in 0..n {
        let a = base_dists[i];
        let b = base_dists[(i + 1) % n];
        if (a - b).abs() > EDGE_THRESHOLD * radius {
            flagged.push(i);
        }
    }
    let mut extra = Vec::new();
    if flagged.is_empty() || budget == 0 {
        return extra;
    }
    let per_edge = budget / flagged.len();
    if per_edge == 0 {
        return extra;
    }
    for &i in &flagged {
        let start = i as f64 * delta;
        for k in 1..=per_edge {
            extra.push(start + delta * k as f64 / (per_edge + 1) as f64);
        }
    }
    extra
}

/// Exact bearings (and a hair to each side) for every segment endpoint
/// within the radius.
fn corner_angles(ox: f64, oy: f64, radius: f64, seg: &Segment, out: &mut Vec<f64>) {
    let r_sq = radius * radius;
    for (ex, ey) in [(seg.x1, seg.y1), (seg.x2, seg.y2)] {
        let dx = ex - ox;
        let dy = ey - oy;
        if dx * dx + dy * dy > r_sq {
            continue;
        }
        let bearing = dy.atan2(dx);
        out.push(bearing - CORNER_EPS);
        out.push(bearing);
        out.push(bearing + CORNER_EPS);
    }
}

/// Normalize, sort, dedupe, and stride-downsample the angle set to the
/// ray budget (0 leaves the count uncapped). Total ordering keeps the
/// output independent of how the candidate angles were produced.
fn finalize_angles(mut angles: Vec<f64>, budget: usize) -> Vec<f64> {
    for a in angles.iter_mut() {
        *a = a.rem_euclid(TAU);
    }
    // Duplicate angles are bitwise-identical after rem_euclid, so an
    // unstable sort cannot reorder anything observable.
    angles.sort_unstable_by(f64::total_cmp);
    angles.dedup_by(|a, b| (*a - *b).abs() < ANGLE_DEDUP_EPS);
    if budget > 0 && angles.len() > budget {
        let len = angles.len();
        let mut kept = Vec::with_capacity(budget);
        for i in 0..budget {
            kept.push(angles[i * len / budget]);
        }
        angles = kept;
    }
    angles
}

fn unobstructed_circle(origin: Point2D, radius: f64) -> Vec<Point2D> {
    (0..CIRCLE_POINTS)
        .map(|i| {
            let a = i as f64 * TAU / CIRCLE_POINTS as f64;
            Point2D::new(origin.x + a.cos() * radius, origin.y + a.sin() * radius)
        })
        .collect()
}

fn compute_polygon(
    origin: Point2D,
    radius: f64,
    segments: &[Segment],
    index: Option<&SpatialIndex>,
    min_rays: usize,
    max_rays: usize,
) -> Vec<Point2D> {
    if radius <= 0.0 {
        return Vec::new();
    }
    if segments.is_empty() {
        return unobstructed_circle(origin, radius);
    }

    let min_rays = min_rays.max(1);
    let delta = TAU / min_rays as f64;
    let mut scratch = Vec::new();

    // Base fan.
    let mut angles: Vec<f64> = (0..min_rays).map(|i| i as f64 * delta).collect();
    let base_dists: Vec<f64> = angles
        .iter()
        .map(|&a| cast_distance(origin.x, origin.y, a, radius, segments, index, &mut scratch))
        .collect();

    // Refinement across flagged silhouette edges, then cap the fan at
    // the ray budget.
    let budget = max_rays.saturating_sub(min_rays);
    angles.extend(refinement_angles(&base_dists, radius, delta, budget));
    let mut angles = finalize_angles(angles, max_rays.max(min_rays));

    // Exact corner bearings, injected after the budget cap: the
    // downsample must never discard them, or shadow boundaries would
    // detach from obstruction corners. The disc query returns a
    // superset of the segments with an endpoint in range, so both
    // code paths inject the same bearings.
    match index {
        Some(ix) => {
            ix.disc_candidates(origin.x, origin.y, radius, &mut scratch);
            for &si in &scratch {
                if let Some(seg) = segments.get(si as usize) {
                    corner_angles(origin.x, origin.y, radius, seg, &mut angles);
                }
            }
        }
        None => {
            for seg in segments {
                corner_angles(origin.x, origin.y, radius, seg, &mut angles);
            }
        }
    }

    let angles = finalize_angles(angles, 0);

    // Final casts.
    let mut polygon = Vec::with_capacity(angles.len());
    for &angle in &angles {
        let d = cast_distance(origin.x, origin.y, angle, radius, segments, index, &mut scratch);
        polygon.push(Point2D::new(
            origin.x + angle.cos() * d,
            origin.y + angle.sin() * d,
        ));
    }
    polygon
}

/// Visibility polygon for one light against an occluder set: the
/// ordered, implicitly closed boundary of the lit region, monotonic in
/// angle around the origin.
pub fn compute_visibility_polygon(
    origin: Point2D,
    radius: f64,
    set: &OccluderSet,
    min_rays: usize,
    max_rays: usize,
) -> Vec<Point2D> {
    compute_polygon(origin, radius, &set.segments, None, min_rays, max_rays)
}

/// Same computation through the spatial index broad phase. Results are
/// identical to the unindexed path on the same inputs.
pub fn compute_visibility_polygon_indexed(
    origin: Point2D,
    radius: f64,
    set: &OccluderSet,
    index: &SpatialIndex,
    min_rays: usize,
    max_rays: usize,
) -> Vec<Point2D> {
    compute_polygon(origin, radius, &set.segments, Some(index), min_rays, max_rays)
}

// -- Tests ---------------------------------------------------------
