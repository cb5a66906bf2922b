/// GeoJSON support: features read back as flat records.
///
/// Records produced here feed straight into the
/// [`GeoJsonEncoder`](crate::geo::encoder::GeoJsonEncoder), which rebuilds a
/// FeatureCollection from them.
///
/// # Examples
///
/// ```
/// use tabutils::geo::encoder::GeoJsonEncoderBuilder;
/// use tabutils::item::geojson::geojson_reader::GeoJsonItemReaderBuilder;
///
/// let data: &[u8] = br#"{"type": "FeatureCollection", "features": [
///     {"type": "Feature", "id": "a", "properties": {"name": "start"},
///      "geometry": {"type": "Point", "coordinates": [0.0, 1.0]}},
///     {"type": "Feature", "id": "b", "properties": {"name": "end"},
///      "geometry": {"type": "Point", "coordinates": [2.0, 3.0]}}
/// ]}"#;
///
/// let reader = GeoJsonItemReaderBuilder::new().from_reader(data).unwrap();
/// let document = GeoJsonEncoderBuilder::new().key("id").build().encode(reader).unwrap();
///
/// assert_eq!(document.bbox, Some([0.0, 1.0, 2.0, 3.0]));
/// assert_eq!(document.features[1].id, Some("b".into()));
/// ```
pub mod geojson_reader;

pub use geojson_reader::{GeoJsonItemReader, GeoJsonItemReaderBuilder};
