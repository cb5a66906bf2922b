/// Geometry coordinate validation and GeoJSON encoding.
///
/// # Module Architecture
///
/// 1. **geometry**: checks a `coordinates` value against its geometry type
///    (`Point`, `LineString`, `Polygon`) and turns it into a typed
///    [`Geometry`](geometry::Geometry). Also hosts the bounding box fold.
///
/// 2. **encoder**: drains a record reader into a single FeatureCollection,
///    all or nothing.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tabutils::geo::geometry::{validate, GeometryKind};
///
/// assert!(validate(GeometryKind::Point, &json!([102, 0.5])).is_ok());
/// assert!(validate(GeometryKind::Point, &json!([[102, 0.5]])).is_err());
/// ```
pub mod encoder;

pub mod geometry;

pub use encoder::{FeatureCollectionDocument, GeoJsonEncoder, GeoJsonEncoderBuilder};
pub use geometry::{validate, BoundingBox, DepthError, Geometry, GeometryKind};
