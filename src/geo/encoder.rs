use std::io::Write;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::{
    core::item::{ItemReader, Record},
    error::TabError,
};

use super::geometry::{validate, BoundingBox, DepthError, Geometry, GeometryKind};

/// `{"type": "name", "properties": {"name": ...}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crs {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: CrsProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsProperties {
    pub name: String,
}

impl Crs {
    pub fn named(name: &str) -> Self {
        Self {
            kind: "name".to_string(),
            properties: CrsProperties {
                name: name.to_string(),
            },
        }
    }
}

/// One emitted feature.
///
/// `id` is serialized whenever an id key was configured, as `null` when the
/// record had no value for it.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureDocument {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: geojson::Geometry,
    pub properties: Record,
}

/// A complete FeatureCollection, built in one pass over a record reader.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollectionDocument {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    pub features: Vec<FeatureDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
}

impl FeatureCollectionDocument {
    /// Serializes the collection as compact JSON.
    pub fn to_json(&self) -> Result<String, TabError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, TabError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_writer<W: Write>(&self, wtr: W) -> Result<(), TabError> {
        Ok(serde_json::to_writer(wtr, self)?)
    }
}

/// Folds records into a GeoJSON FeatureCollection.
///
/// Each record must carry a geometry `type` and its `coordinates` (a JSON
/// array, or a string holding one). The field named by `key` becomes the
/// feature id. `type`, `coordinates`, `id` and the key field are removed;
/// every other field becomes a property, in order.
///
/// The reader is consumed: encoding drains it completely and either returns
/// the whole document or fails with [`TabError::Validation`] naming the
/// first bad record. No partial document is ever produced.
///
/// # Examples
///
/// ```
/// use tabutils::geo::encoder::GeoJsonEncoderBuilder;
/// use tabutils::item::csv::csv_reader::CsvItemReaderBuilder;
///
/// let data: &[u8] = b"name,type,coordinates\nhq,Point,\"[-0.1, 51.5]\"\n";
/// let reader = CsvItemReaderBuilder::new().from_reader(data).unwrap();
///
/// let document = GeoJsonEncoderBuilder::new()
///     .crs("EPSG:4326")
///     .build()
///     .encode(reader)
///     .unwrap();
///
/// assert_eq!(document.features.len(), 1);
/// assert_eq!(document.bbox, Some([-0.1, 51.5, -0.1, 51.5]));
/// assert_eq!(document.features[0].properties["name"], "hq");
/// ```
pub struct GeoJsonEncoder {
    key: Option<String>,
    crs: Option<String>,
}

impl GeoJsonEncoder {
    pub fn encode<R: ItemReader<Record>>(
        &self,
        reader: R,
    ) -> Result<FeatureCollectionDocument, TabError> {
        let mut features = Vec::new();
        let mut bbox: Option<BoundingBox> = None;

        while let Some(record) = reader.read()? {
            let index = features.len();
            let (feature, geometry) = self.feature(index, record)?;
            BoundingBox::accumulate(&mut bbox, &geometry);
            features.push(feature);
        }

        debug!("Encoded {} features, bbox {:?}", features.len(), bbox);

        Ok(FeatureCollectionDocument {
            kind: "FeatureCollection",
            bbox: bbox.map(BoundingBox::to_array),
            features,
            crs: self.crs.as_deref().map(Crs::named),
        })
    }

    fn feature(
        &self,
        index: usize,
        mut record: Record,
    ) -> Result<(FeatureDocument, Geometry), TabError> {
        let invalid = |source: DepthError| TabError::Validation { index, source };

        let kind = match record.shift_remove("type") {
            Some(Value::String(name)) => name.parse::<GeometryKind>().map_err(invalid)?,
            Some(other) => return Err(invalid(DepthError::UnsupportedType(other.to_string()))),
            None => return Err(TabError::MissingField(format!("type of record {}", index))),
        };

        let coordinates = match record.shift_remove("coordinates") {
            Some(Value::String(text)) => serde_json::from_str(&text).map_err(|error| {
                invalid(DepthError::Malformed {
                    kind,
                    reason: error.to_string(),
                })
            })?,
            Some(value) => value,
            None => {
                return Err(TabError::MissingField(format!(
                    "coordinates of record {}",
                    index
                )))
            }
        };

        let geometry = validate(kind, &coordinates).map_err(invalid)?;

        let id = self
            .key
            .as_deref()
            .map(|key| record.shift_remove(key).unwrap_or(Value::Null));
        record.shift_remove("id");

        let feature = FeatureDocument {
            kind: "Feature",
            id,
            geometry: geojson::Geometry::from(&geometry),
            properties: record,
        };
        Ok((feature, geometry))
    }
}

#[derive(Default)]
pub struct GeoJsonEncoderBuilder {
    key: Option<String>,
    crs: Option<String>,
}

impl GeoJsonEncoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field promoted to the feature id.
    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Named coordinate reference system attached to the collection.
    pub fn crs(mut self, crs: &str) -> Self {
        self.crs = Some(crs.to_string());
        self
    }

    pub fn build(self) -> GeoJsonEncoder {
        GeoJsonEncoder {
            key: self.key,
            crs: self.crs,
        }
    }
}
