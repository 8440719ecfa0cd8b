//! Occluder-aware 2D shadow geometry for tile-based maps.
//!
//! Given alpha-masked sprites placed on a map and a point light, this
//! crate extracts silhouette contours from transparency masks, turns
//! them into world-space occluding segments per placed instance, and
//! computes the polygon of the area the light actually reaches.
//!
//! Data flows one way: alpha grid -> normalized contours -> world
//! segments -> visibility polygon. Rasterizing sprites, deciding what
//! blocks light, compositing the polygon into an image, and all UI
//! state belong to the embedding application; the caches in [`cache`]
//! are owned and injected by that application's render loop.

pub mod cache;
pub mod contour;
pub mod occluder;
pub mod spatial;
pub mod types;
pub mod visibility;

pub use cache::{ContourCache, OccluderCache, PolygonCache};
pub use contour::extract_contour;
pub use occluder::{build_occluder_set, instance_signature, AlphaSource};
pub use spatial::SpatialIndex;
pub use types::{
    AlphaGrid, Bounds, ContourKey, OccluderParams, OccluderSet, PlacedInstance, Point2D,
    PolygonCacheKey, Segment,
};
pub use visibility::{
    compute_visibility_polygon, compute_visibility_polygon_indexed, ray_segment_distance,
};
