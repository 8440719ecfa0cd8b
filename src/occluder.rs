//! World-space occluding segments from placed sprite instances.
//!
//! Normalized contours are fetched through the contour cache and
//! mapped into world coordinates per instance footprint and pose,
//! aggregated into a versioned occluder set.

use log::debug;

use crate::cache::ContourCache;
use crate::types::{AlphaGrid, Bounds, ContourKey, OccluderParams, OccluderSet, PlacedInstance, Segment};

/// Rasterizer capability supplied by the embedding application: the
/// transparency mask of one oriented sprite variant, rotation and
/// mirroring already applied. `None` means the variant cannot be
/// rasterized; the instance then simply contributes no geometry.
pub trait AlphaSource {
    fn sample_alpha_grid(
        &self,
        sprite_id: &str,
        rotation_quadrant: u8,
        mirror_x: bool,
        mirror_y: bool,
    ) -> Option<AlphaGrid>;
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(hash: &mut u64, bytes: &[u8]) {
    for &b in bytes {
        *hash ^= b as u64;
        *hash = hash.wrapping_mul(FNV_PRIME);
    }
}

/// Order-independent digest of every occluding instance's identity and
/// pose. Per-instance FNV-1a hashes combine with a commutative
/// wrapping add, so list order cannot affect the signature.
pub fn instance_signature(instances: &[PlacedInstance]) -> u64 {
    let mut signature = 0u64;
    for inst in instances {
        if !inst.is_occluder {
            continue;
        }
        let mut h = FNV_OFFSET;
        fnv1a(&mut h, inst.sprite_id.as_bytes());
        fnv1a(&mut h, &[0xff]); // id terminator
        fnv1a(&mut h, &inst.cell.x.to_bits().to_le_bytes());
        fnv1a(&mut h, &inst.cell.y.to_bits().to_le_bytes());
        match inst.center {
            Some(c) => {
                fnv1a(&mut h, &[1]);
                fnv1a(&mut h, &c.x.to_bits().to_le_bytes());
                fnv1a(&mut h, &c.y.to_bits().to_le_bytes());
            }
            None => fnv1a(&mut h, &[0]),
        }
        fnv1a(
            &mut h,
            &[
                inst.rotation_quadrant,
                inst.mirror_x as u8,
                inst.mirror_y as u8,
            ],
        );
        fnv1a(&mut h, &inst.scale.to_bits().to_le_bytes());
        fnv1a(&mut h, &inst.footprint_cells.0.to_bits().to_le_bytes());
        fnv1a(&mut h, &inst.footprint_cells.1.to_bits().to_le_bytes());
        signature = signature.wrapping_add(h);
    }
    signature
}

/// Build a fresh occluder set at `version` from every instance flagged
/// as an occluder. Instances whose sprite cannot be rasterized, or
/// whose footprint is degenerate, contribute nothing.
pub fn build_occluder_set(
    instances: &[PlacedInstance],
    params: &OccluderParams,
    source: &dyn AlphaSource,
    contours: &mut ContourCache,
    version: u64,
) -> OccluderSet {
    let mut segments = Vec::new();
    let mut bounds = Bounds::empty();
    let mut occluders = 0usize;

    for inst in instances {
        if !inst.is_occluder {
            continue;
        }
        occluders += 1;

        let (fw, fh) = inst.footprint();
        if fw <= 0.0 || fh <= 0.0 {
            continue;
        }
        let center = inst.world_center();

        // Simplification tolerance is relative to on-map size, so the
        // same sprite keeps the same visual fidelity at any footprint.
        let key = ContourKey {
            sprite_id: inst.sprite_id.clone(),
            rotation_quadrant: inst.rotation_quadrant,
            mirror_x: inst.mirror_x,
            mirror_y: inst.mirror_y,
            alpha_threshold: params.alpha_threshold,
            simplify_epsilon: params.simplify_tolerance / fw.max(fh),
        };
        let outline = contours.get_or_extract(&key, source);

        let min_x = center.x - fw / 2.0;
        let min_y = center.y - fh / 2.0;
        for seg in outline {
            let world = Segment::new(
                min_x + seg.x1 * fw,
                min_y + seg.y1 * fh,
                min_x + seg.x2 * fw,
                min_y + seg.y2 * fh,
            );
            bounds.expand(world.x1, world.y1);
            bounds.expand(world.x2, world.y2);
            segments.push(world);
        }
    }

    debug!(
        "built occluder set v{}: {} segments from {} occluding instances",
        version,
        segments.len(),
        occluders
    );

    OccluderSet {
        segments,
        version,
        bounds,
    }
}

// -- Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2D;
    use std::collections::HashMap;

    struct MapSource {
        grids: HashMap<String, AlphaGrid>,
    }

    impl MapSource {
        fn with_solid(id: &str, n: usize) -> Self {
            let mut grids = HashMap::new();
            grids.insert(id.to_string(), AlphaGrid::new(n, n, vec![255; n * n]));
            Self { grids }
        }
    }

    impl AlphaSource for MapSource {
        fn sample_alpha_grid(
            &self,
            sprite_id: &str,
            _rotation_quadrant: u8,
            _mirror_x: bool,
            _mirror_y: bool,
        ) -> Option<AlphaGrid> {
            self.grids.get(sprite_id).cloned()
        }
    }

    fn make_instance(id: &str, x: f64, y: f64, footprint: (f64, f64)) -> PlacedInstance {
        PlacedInstance {
            sprite_id: id.into(),
            cell: Point2D::new(x, y),
            center: None,
            rotation_quadrant: 0,
            mirror_x: false,
            mirror_y: false,
            scale: 1.0,
            footprint_cells: footprint,
            is_occluder: true,
        }
    }

    #[test]
    fn signature_is_order_independent() {
        let a = make_instance("a", 1.0, 2.0, (1.0, 1.0));
        let b = make_instance("b", 5.0, 6.0, (2.0, 1.0));
        let fwd = instance_signature(&[a.clone(), b.clone()]);
        let rev = instance_signature(&[b, a]);
        assert_eq!(fwd, rev);
    }

    #[test]
    fn signature_tracks_position_and_pose() {
        let base = make_instance("a", 1.0, 2.0, (1.0, 1.0));
        let sig = instance_signature(std::slice::from_ref(&base));

        let mut moved = base.clone();
        moved.cell.x = 3.0;
        assert_ne!(sig, instance_signature(std::slice::from_ref(&moved)));

        let mut rotated = base.clone();
        rotated.rotation_quadrant = 2;
        assert_ne!(sig, instance_signature(std::slice::from_ref(&rotated)));

        let mut scaled = base.clone();
        scaled.scale = 2.0;
        assert_ne!(sig, instance_signature(std::slice::from_ref(&scaled)));
    }

    #[test]
    fn signature_ignores_non_occluders() {
        let a = make_instance("a", 1.0, 2.0, (1.0, 1.0));
        let mut decor = make_instance("b", 9.0, 9.0, (1.0, 1.0));
        decor.is_occluder = false;
        assert_eq!(
            instance_signature(std::slice::from_ref(&a)),
            instance_signature(&[a, decor])
        );
    }

    #[test]
    fn build_maps_contour_into_world() {
        let source = MapSource::with_solid("rock", 4);
        let mut contours = ContourCache::default();
        let inst = make_instance("rock", 10.0, 20.0, (2.0, 2.0));
        let set = build_occluder_set(
            &[inst],
            &OccluderParams::default(),
            &source,
            &mut contours,
            1,
        );

        assert_eq!(set.version, 1);
        assert_eq!(set.segments.len(), 4);
        // Footprint spans cells [10, 12) x [20, 22); the outline sits
        // half a sample (0.25 cells at 4 samples over 2 cells) outside.
        assert!((set.bounds.min_x - 9.75).abs() < 1e-9);
        assert!((set.bounds.max_x - 11.75).abs() < 1e-9);
        assert!((set.bounds.min_y - 19.75).abs() < 1e-9);
        assert!((set.bounds.max_y - 21.75).abs() < 1e-9);
    }

    #[test]
    fn odd_quadrant_swaps_world_extent() {
        let source = MapSource::with_solid("door", 4);
        let mut contours = ContourCache::default();
        let mut inst = make_instance("door", 0.0, 0.0, (3.0, 1.0));
        inst.rotation_quadrant = 1;
        let set = build_occluder_set(
            &[inst],
            &OccluderParams::default(),
            &source,
            &mut contours,
            1,
        );
        assert!(set.bounds.width() < set.bounds.height());
        assert!((set.bounds.height() - set.bounds.width() - 2.0).abs() < 0.5);
    }

    #[test]
    fn missing_sprite_contributes_nothing() {
        let source = MapSource {
            grids: HashMap::new(),
        };
        let mut contours = ContourCache::default();
        let inst = make_instance("ghost", 0.0, 0.0, (1.0, 1.0));
        let set = build_occluder_set(
            &[inst],
            &OccluderParams::default(),
            &source,
            &mut contours,
            7,
        );
        assert_eq!(set.version, 7);
        assert!(set.segments.is_empty());
        assert!(set.bounds.is_empty());
    }

    #[test]
    fn non_occluders_are_skipped() {
        let source = MapSource::with_solid("rock", 4);
        let mut contours = ContourCache::default();
        let mut inst = make_instance("rock", 0.0, 0.0, (1.0, 1.0));
        inst.is_occluder = false;
        let set = build_occluder_set(
            &[inst],
            &OccluderParams::default(),
            &source,
            &mut contours,
            1,
        );
        assert!(set.segments.is_empty());
    }

    #[test]
    fn explicit_center_positions_geometry() {
        let source = MapSource::with_solid("rock", 4);
        let mut contours = ContourCache::default();
        let mut inst = make_instance("rock", 0.0, 0.0, (2.0, 2.0));
        inst.center = Some(Point2D::new(100.0, 50.0));
        let set = build_occluder_set(
            &[inst],
            &OccluderParams::default(),
            &source,
            &mut contours,
            1,
        );
        let mid_x = (set.bounds.min_x + set.bounds.max_x) / 2.0;
        let mid_y = (set.bounds.min_y + set.bounds.max_y) / 2.0;
        assert!((mid_x - 100.0).abs() < 0.3);
        assert!((mid_y - 50.0).abs() < 0.3);
    }
}
