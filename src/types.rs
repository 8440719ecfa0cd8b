//! Data types shared across the shadow-geometry pipeline.
//!
//! Every interchange-facing struct derives Serialize + Deserialize so
//! the embedding application can pass map state in and polygon data out
//! as structured values.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

// -- Geometry ------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A line segment between two endpoints.
///
/// Used in two coordinate frames that must never mix: the contour
/// extractor produces segments in the normalized unit square, the
/// occluder builder maps them into world coordinates, and everything
/// downstream consumes world-frame segments only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Segment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Axis-aligned bounding box. The empty box (inverted extents) is the
/// identity for `expand`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn expand(&mut self, x: f64, y: f64) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }
}

// -- Alpha grids ---------------------------------------------------

/// Transparency mask of one oriented sprite variant, row-major bytes.
/// Supplied by the external rasterizer; rotation and mirroring are
/// already baked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaGrid {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl AlphaGrid {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Sampled alpha at (x, y); anything outside the grid reads as
    /// fully transparent, so shapes touching the edge still close.
    pub fn alpha_at(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        let idx = y as usize * self.width + x as usize;
        self.data.get(idx).copied().unwrap_or(0)
    }

    pub fn solid(&self, x: i64, y: i64, threshold: u8) -> bool {
        self.alpha_at(x, y) > threshold
    }
}

// -- Contour keys --------------------------------------------------

/// Identity of one extracted contour: sprite variant + extraction
/// parameters. Equality and hashing go through the epsilon's bit
/// pattern so the key is usable in a `HashMap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourKey {
    pub sprite_id: String,
    pub rotation_quadrant: u8,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub alpha_threshold: u8,
    pub simplify_epsilon: f64,
}

impl PartialEq for ContourKey {
    fn eq(&self, other: &Self) -> bool {
        self.sprite_id == other.sprite_id
            && self.rotation_quadrant == other.rotation_quadrant
            && self.mirror_x == other.mirror_x
            && self.mirror_y == other.mirror_y
            && self.alpha_threshold == other.alpha_threshold
            && self.simplify_epsilon.to_bits() == other.simplify_epsilon.to_bits()
    }
}

impl Eq for ContourKey {}

impl Hash for ContourKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sprite_id.hash(state);
        self.rotation_quadrant.hash(state);
        self.mirror_x.hash(state);
        self.mirror_y.hash(state);
        self.alpha_threshold.hash(state);
        self.simplify_epsilon.to_bits().hash(state);
    }
}

// -- Placed instances ----------------------------------------------

fn is_false(v: &bool) -> bool {
    !v
}

fn default_scale() -> f64 {
    1.0
}

/// One sprite placed on the map. Whether it blocks light is decided by
/// the embedding application's tagging and arrives here as a flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedInstance {
    pub sprite_id: String,
    /// Top-left map cell of the instance's footprint.
    #[serde(default)]
    pub cell: Point2D,
    /// Explicit center override; when absent the center is derived
    /// from `cell` and the footprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Point2D>,
    #[serde(default)]
    pub rotation_quadrant: u8,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mirror_x: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mirror_y: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Cells per axis in the sprite's base orientation, derived
    /// externally from sprite identity.
    pub footprint_cells: (f64, f64),
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_occluder: bool,
}

impl PlacedInstance {
    /// Effective footprint in world cells: axes swap on 90/270 degree
    /// quadrants, then scale applies.
    pub fn footprint(&self) -> (f64, f64) {
        let (w, h) = self.footprint_cells;
        let (w, h) = if self.rotation_quadrant % 2 == 1 {
            (h, w)
        } else {
            (w, h)
        };
        (w * self.scale, h * self.scale)
    }

    pub fn world_center(&self) -> Point2D {
        match self.center {
            Some(c) => c,
            None => {
                let (fw, fh) = self.footprint();
                Point2D::new(self.cell.x + fw / 2.0, self.cell.y + fh / 2.0)
            }
        }
    }
}

// -- Occluder sets -------------------------------------------------

/// World-frame occluding segments for one build of the map state.
/// `version` increments monotonically across rebuilds and is never
/// reused, so downstream caches can key on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccluderSet {
    pub segments: Vec<Segment>,
    pub version: u64,
    pub bounds: Bounds,
}

impl OccluderSet {
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            version: 0,
            bounds: Bounds::empty(),
        }
    }
}

// -- Builder parameters --------------------------------------------

fn default_alpha_threshold() -> u8 {
    127
}

fn default_simplify_tolerance() -> f64 {
    0.25
}

/// Tuning knobs for contour extraction during occluder builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccluderParams {
    /// Alpha strictly above this counts as solid.
    #[serde(default = "default_alpha_threshold")]
    pub alpha_threshold: u8,
    /// Douglas-Peucker tolerance in world cells. The builder divides
    /// by the instance's larger footprint axis, so visual fidelity is
    /// independent of sprite resolution.
    #[serde(default = "default_simplify_tolerance")]
    pub simplify_tolerance: f64,
}

impl Default for OccluderParams {
    fn default() -> Self {
        Self {
            alpha_threshold: default_alpha_threshold(),
            simplify_tolerance: default_simplify_tolerance(),
        }
    }
}

// -- Polygon cache keys --------------------------------------------

/// Cache key for one light's visibility polygon. Float components are
/// keyed by bit pattern; a stale occluder version can never collide
/// with a fresh one because versions are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolygonCacheKey {
    pub x_bits: u64,
    pub y_bits: u64,
    pub radius_bits: u64,
    pub occluder_version: u64,
}

impl PolygonCacheKey {
    pub fn new(origin: Point2D, radius: f64, occluder_version: u64) -> Self {
        Self {
            x_bits: origin.x.to_bits(),
            y_bits: origin.y.to_bits(),
            radius_bits: radius.to_bits(),
            occluder_version,
        }
    }
}

// -- Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_round_trip() {
        let json = r#"{
            "sprite_id": "boulder",
            "cell": {"x": 4.0, "y": 7.0},
            "rotation_quadrant": 1,
            "footprint_cells": [2.0, 1.0],
            "is_occluder": true
        }"#;

        let inst: PlacedInstance = serde_json::from_str(json).expect("deserialize");
        assert_eq!(inst.sprite_id, "boulder");
        assert_eq!(inst.scale, 1.0);
        assert!(!inst.mirror_x);
        assert!(inst.is_occluder);

        let out = serde_json::to_string(&inst).expect("serialize");
        let _: PlacedInstance = serde_json::from_str(&out).expect("re-deserialize");
    }

    #[test]
    fn footprint_swaps_on_odd_quadrant() {
        let json = r#"{"sprite_id": "s", "footprint_cells": [3.0, 1.0]}"#;
        let mut inst: PlacedInstance = serde_json::from_str(json).expect("deserialize");
        assert_eq!(inst.footprint(), (3.0, 1.0));
        inst.rotation_quadrant = 1;
        assert_eq!(inst.footprint(), (1.0, 3.0));
        inst.rotation_quadrant = 2;
        assert_eq!(inst.footprint(), (3.0, 1.0));
        inst.scale = 2.0;
        assert_eq!(inst.footprint(), (6.0, 2.0));
    }

    #[test]
    fn derived_center_from_cell() {
        let json = r#"{"sprite_id": "s", "cell": {"x": 10.0, "y": 20.0}, "footprint_cells": [2.0, 4.0]}"#;
        let inst: PlacedInstance = serde_json::from_str(json).expect("deserialize");
        let c = inst.world_center();
        assert_eq!((c.x, c.y), (11.0, 22.0));
    }

    #[test]
    fn explicit_center_wins() {
        let json = r#"{"sprite_id": "s", "center": {"x": 1.5, "y": 2.5}, "footprint_cells": [2.0, 2.0]}"#;
        let inst: PlacedInstance = serde_json::from_str(json).expect("deserialize");
        let c = inst.world_center();
        assert_eq!((c.x, c.y), (1.5, 2.5));
    }

    #[test]
    fn contour_key_bitwise_epsilon() {
        let a = ContourKey {
            sprite_id: "s".into(),
            rotation_quadrant: 0,
            mirror_x: false,
            mirror_y: false,
            alpha_threshold: 127,
            simplify_epsilon: 0.1,
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.simplify_epsilon = 0.2;
        assert_ne!(a, b);
    }

    #[test]
    fn bounds_expand_and_empty() {
        let mut b = Bounds::empty();
        assert!(b.is_empty());
        b.expand(3.0, -1.0);
        b.expand(-2.0, 4.0);
        assert!(!b.is_empty());
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (-2.0, -1.0, 3.0, 4.0));
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.height(), 5.0);
    }

    #[test]
    fn alpha_grid_out_of_bounds_is_transparent() {
        let grid = AlphaGrid::new(2, 2, vec![255, 0, 0, 255]);
        assert_eq!(grid.alpha_at(0, 0), 255);
        assert_eq!(grid.alpha_at(-1, 0), 0);
        assert_eq!(grid.alpha_at(0, 2), 0);
        assert!(grid.solid(1, 1, 0));
        assert!(!grid.solid(1, 0, 0));
    }

    #[test]
    fn polygon_cache_key_distinguishes_versions() {
        let origin = Point2D::new(1.0, 2.0);
        let a = PolygonCacheKey::new(origin, 5.0, 3);
        let b = PolygonCacheKey::new(origin, 5.0, 4);
        assert_ne!(a, b);
        assert_eq!(a, PolygonCacheKey::new(origin, 5.0, 3));
    }

    #[test]
    fn occluder_params_defaults() {
        let params: OccluderParams = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(params.alpha_threshold, 127);
        assert!((params.simplify_tolerance - 0.25).abs() < 1e-12);
    }
}
