use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Read,
    path::Path,
    vec,
};

use ::geojson::{feature::Id, Feature, GeoJson};
use log::{debug, warn};
use serde_json::Value;

use crate::{
    core::item::{ItemReader, ItemReaderResult, Record},
    encoding::{decode_reader::map_read_error, EncodingResolver},
    error::TabError,
    geo::geometry::{validate, DepthError, GeometryKind},
};

const RESERVED: [&str; 3] = ["id", "type", "coordinates"];

/// Reads the features of a GeoJSON document as flat records.
///
/// Every record is laid out as `id` (null when the feature has none), the
/// feature properties in document order, then the geometry `type` and its
/// `coordinates`. Geometries are checked with
/// [`validate`](crate::geo::geometry::validate) as they are read, so a bad
/// feature fails with [`TabError::Validation`] carrying its position.
///
/// The whole document is parsed when the reader is built; features are then
/// flattened one per `read`.
///
/// # Examples
///
/// ```
/// use tabutils::core::item::ItemReader;
/// use tabutils::item::geojson::geojson_reader::GeoJsonItemReaderBuilder;
///
/// let data: &[u8] = br#"{"type": "FeatureCollection", "features": [
///     {"type": "Feature", "properties": {"prop0": "value0"},
///      "geometry": {"type": "Point", "coordinates": [102.0, 0.5]}}
/// ]}"#;
///
/// let reader = GeoJsonItemReaderBuilder::new().from_reader(data).unwrap();
/// let record = reader.read().unwrap().unwrap();
///
/// assert!(record["id"].is_null());
/// assert_eq!(record["prop0"], "value0");
/// assert_eq!(record["type"], "Point");
/// assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "prop0", "type", "coordinates"]);
/// ```
pub struct GeoJsonItemReader {
    features: RefCell<Option<vec::IntoIter<Feature>>>,
    index: Cell<usize>,
}

impl GeoJsonItemReader {
    /// Number of features produced so far.
    pub fn count(&self) -> usize {
        self.index.get()
    }

    fn flatten(index: usize, feature: Feature) -> Result<Record, TabError> {
        let invalid = |source: DepthError| TabError::Validation { index, source };

        let geometry = feature
            .geometry
            .ok_or_else(|| TabError::MissingField(format!("geometry of feature {}", index)))?;
        let mut geometry = match serde_json::to_value(&geometry)? {
            Value::Object(members) => members,
            _ => return Err(TabError::MissingField(format!("geometry of feature {}", index))),
        };

        let kind = match geometry.shift_remove("type") {
            Some(Value::String(name)) => name.parse::<GeometryKind>().map_err(invalid)?,
            _ => return Err(TabError::MissingField(format!("type of feature {}", index))),
        };
        let coordinates = geometry.shift_remove("coordinates").unwrap_or(Value::Null);
        validate(kind, &coordinates).map_err(invalid)?;

        let mut record = Record::new();
        let id = match feature.id {
            Some(Id::String(id)) => Value::String(id),
            Some(Id::Number(id)) => Value::Number(id),
            None => Value::Null,
        };
        record.insert("id".to_string(), id);

        for (key, value) in feature.properties.unwrap_or_default() {
            if RESERVED.contains(&key.as_str()) {
                warn!("Feature {}: property {:?} shadows a record field, dropped", index, key);
                continue;
            }
            record.insert(key, value);
        }

        record.insert("type".to_string(), Value::String(kind.name().to_string()));
        record.insert("coordinates".to_string(), coordinates);
        Ok(record)
    }
}

impl ItemReader<Record> for GeoJsonItemReader {
    fn read(&self) -> ItemReaderResult<Record> {
        let mut slot = self.features.borrow_mut();
        let Some(features) = slot.as_mut() else {
            return Ok(None);
        };

        let Some(feature) = features.next() else {
            debug!("GeoJson source exhausted after {} features", self.index.get());
            *slot = None;
            return Ok(None);
        };

        let index = self.index.get();
        match Self::flatten(index, feature) {
            Ok(record) => {
                self.index.set(index + 1);
                Ok(Some(record))
            }
            Err(error) => {
                *slot = None;
                Err(error)
            }
        }
    }

    fn close(&self) {
        self.features.borrow_mut().take();
    }
}

#[derive(Default)]
pub struct GeoJsonItemReaderBuilder {
    encoding: Option<String>,
}

impl GeoJsonItemReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared input encoding, checked against a sample like the csv reader.
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }

    /// Parses a FeatureCollection, a single Feature or a bare Geometry.
    pub fn from_reader<R: Read>(self, rdr: R) -> Result<GeoJsonItemReader, TabError> {
        let mut decoder = EncodingResolver::default().decode(rdr, self.encoding.as_deref())?;
        let mut text = String::new();
        decoder.read_to_string(&mut text).map_err(map_read_error)?;

        let features = match serde_json::from_str::<GeoJson>(&text)? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        };
        debug!("GeoJson document holds {} features", features.len());

        Ok(GeoJsonItemReader {
            features: RefCell::new(Some(features.into_iter())),
            index: Cell::new(0),
        })
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<GeoJsonItemReader, TabError> {
        let file = File::open(path.as_ref())?;
        debug!("Opened {}", path.as_ref().display());
        self.from_reader(file)
    }
}
