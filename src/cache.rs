//! Caller-owned caches for the shadow-geometry pipeline.
//!
//! Three independent memoizations: per-sprite-variant contours,
//! the per-map-state occluder set, and per-light polygons. Each is an
//! explicit object the embedding render loop owns and injects — never
//! a process-wide singleton — and each exposes `invalidate()`. A miss
//! always performs the full synchronous computation before returning;
//! partially built results are never visible.

use std::collections::HashMap;

use log::{debug, trace};

use crate::contour::extract_contour;
use crate::occluder::{build_occluder_set, instance_signature, AlphaSource};
use crate::spatial::SpatialIndex;
use crate::types::{
    ContourKey, OccluderParams, OccluderSet, PlacedInstance, Point2D, PolygonCacheKey, Segment,
};
use crate::visibility::{compute_visibility_polygon, compute_visibility_polygon_indexed};

// -- Contour cache -------------------------------------------------

/// Memoized contour extraction. Entries live until `invalidate()`
/// (e.g. on asset reload); the extraction is a pure function of the
/// key, so a hit returns exactly what a recomputation would.
#[derive(Default)]
pub struct ContourCache {
    entries: HashMap<ContourKey, Vec<Segment>>,
}

impl ContourCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_extract(&mut self, key: &ContourKey, source: &dyn AlphaSource) -> &[Segment] {
        if !self.entries.contains_key(key) {
            let outline = match source.sample_alpha_grid(
                &key.sprite_id,
                key.rotation_quadrant,
                key.mirror_x,
                key.mirror_y,
            ) {
                Some(grid) => extract_contour(&grid, key.alpha_threshold, key.simplify_epsilon),
                None => Vec::new(),
            };
            trace!(
                "contour cache miss: {} q{} ({} segments)",
                key.sprite_id,
                key.rotation_quadrant,
                outline.len()
            );
            self.entries.insert(key.clone(), outline);
        }
        match self.entries.get(key) {
            Some(outline) => outline,
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}

// -- Occluder cache ------------------------------------------------

/// Holds the current occluder set and the instance signature it was
/// built from. Rebuilds only when the signature changes; the version
/// counter survives invalidation so versions stay monotonic and are
/// never reused.
pub struct OccluderCache {
    current: OccluderSet,
    signature: Option<u64>,
    next_version: u64,
}

impl Default for OccluderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OccluderCache {
    pub fn new() -> Self {
        Self {
            current: OccluderSet::empty(),
            signature: None,
            next_version: 1,
        }
    }

    /// Return the cached set when the occluding instances are
    /// unchanged, otherwise rebuild with the next version number.
    pub fn get_or_build(
        &mut self,
        instances: &[PlacedInstance],
        params: &OccluderParams,
        source: &dyn AlphaSource,
        contours: &mut ContourCache,
    ) -> &OccluderSet {
        let signature = instance_signature(instances);
        if self.signature != Some(signature) {
            self.current =
                build_occluder_set(instances, params, source, contours, self.next_version);
            self.next_version = self.current.version + 1;
            self.signature = Some(signature);
        } else {
            trace!("occluder cache hit at v{}", self.current.version);
        }
        &self.current
    }

    pub fn invalidate(&mut self) {
        debug!("occluder cache invalidated");
        self.signature = None;
    }
}

// -- Polygon cache -------------------------------------------------

/// Per-light visibility polygons, keyed by light pose, radius, and
/// occluder version. A changed occluder version misses naturally, so
/// the cache is reusable across multiple render passes of one light
/// (a white pass and a tinted pass hit the same entry). The cache
/// never evicts on its own: the embedding render loop is expected to
/// `invalidate()` between frames.
#[derive(Default)]
pub struct PolygonCache {
    entries: HashMap<PolygonCacheKey, Vec<Point2D>>,
}

impl PolygonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        origin: Point2D,
        radius: f64,
        set: &OccluderSet,
        min_rays: usize,
        max_rays: usize,
    ) -> &[Point2D] {
        let key = PolygonCacheKey::new(origin, radius, set.version);
        if !self.entries.contains_key(&key) {
            let polygon = compute_visibility_polygon(origin, radius, set, min_rays, max_rays);
            self.entries.insert(key, polygon);
        } else {
            trace!("polygon cache hit for occluder v{}", set.version);
        }
        match self.entries.get(&key) {
            Some(polygon) => polygon,
            None => &[],
        }
    }

    /// Indexed variant; produces entries identical to the unindexed
    /// path because the broad phase never changes results.
    pub fn get_or_compute_indexed(
        &mut self,
        origin: Point2D,
        radius: f64,
        set: &OccluderSet,
        index: &SpatialIndex,
        min_rays: usize,
        max_rays: usize,
    ) -> &[Point2D] {
        let key = PolygonCacheKey::new(origin, radius, set.version);
        if !self.entries.contains_key(&key) {
            let polygon =
                compute_visibility_polygon_indexed(origin, radius, set, index, min_rays, max_rays);
            self.entries.insert(key, polygon);
        }
        match self.entries.get(&key) {
            Some(polygon) => polygon,
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}

// -- Tests ---------------------------------------------------------
