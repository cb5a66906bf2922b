use std::{fmt, str::FromStr};

use serde_json::Value;
use thiserror::Error;

/// An `[x, y]` coordinate pair.
pub type Position = [f64; 2];

/// The geometry types records may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    /// List levels between the `coordinates` member and a bare pair.
    pub fn depth(self) -> usize {
        match self {
            GeometryKind::Point => 0,
            GeometryKind::LineString => 1,
            GeometryKind::Polygon => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryKind {
    type Err = DepthError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "Point" => Ok(GeometryKind::Point),
            "LineString" => Ok(GeometryKind::LineString),
            "Polygon" => Ok(GeometryKind::Polygon),
            other => Err(DepthError::UnsupportedType(other.to_string())),
        }
    }
}

/// Coordinates that do not match their geometry type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DepthError {
    #[error("unsupported geometry type {0:?}")]
    UnsupportedType(String),

    #[error("{kind} coordinates are malformed: {reason}")]
    Malformed { kind: GeometryKind, reason: String },

    #[error("{kind} coordinates must be nested {expected} level(s) deep, found {found}")]
    Depth {
        kind: GeometryKind,
        expected: usize,
        found: usize,
    },

    #[error("{kind} needs at least {minimum} points, found {found}")]
    TooFewPoints {
        kind: GeometryKind,
        minimum: usize,
        found: usize,
    },
}

/// A validated geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// Every coordinate pair, rings flattened.
    pub fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            Geometry::Point(point) => Box::new(std::iter::once(point)),
            Geometry::LineString(points) => Box::new(points.iter()),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
        }
    }

    /// The `coordinates` member as plain JSON.
    pub fn coordinates(&self) -> Value {
        match self {
            Geometry::Point(point) => Value::from(point.to_vec()),
            Geometry::LineString(points) => line_value(points),
            Geometry::Polygon(rings) => {
                Value::Array(rings.iter().map(|ring| line_value(ring)).collect())
            }
        }
    }
}

fn line_value(points: &[Position]) -> Value {
    Value::Array(points.iter().map(|p| Value::from(p.to_vec())).collect())
}

impl From<&Geometry> for geojson::Geometry {
    fn from(geometry: &Geometry) -> Self {
        let value = match geometry {
            Geometry::Point(point) => geojson::Value::Point(point.to_vec()),
            Geometry::LineString(points) => {
                geojson::Value::LineString(points.iter().map(|p| p.to_vec()).collect())
            }
            Geometry::Polygon(rings) => geojson::Value::Polygon(
                rings
                    .iter()
                    .map(|ring| ring.iter().map(|p| p.to_vec()).collect())
                    .collect(),
            ),
        };
        geojson::Geometry::new(value)
    }
}

/// Checks `coordinates` against `kind` and converts them.
///
/// The nesting depth must be exactly [`GeometryKind::depth`], uniform across
/// the structure, and every leaf an `[x, y]` pair of numbers. A LineString
/// needs 2 points; a Polygon needs a ring and every ring 3 points. Rings are
/// not required to be closed.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tabutils::geo::geometry::{validate, DepthError, Geometry, GeometryKind};
///
/// let line = validate(GeometryKind::LineString, &json!([[102, 0], [103, 1]])).unwrap();
/// assert_eq!(line, Geometry::LineString(vec![[102.0, 0.0], [103.0, 1.0]]));
///
/// let error = validate(GeometryKind::Polygon, &json!([[100, 0], [101, 0], [101, 1]]));
/// assert!(matches!(error, Err(DepthError::Depth { expected: 2, found: 1, .. })));
/// ```
pub fn validate(kind: GeometryKind, coordinates: &Value) -> Result<Geometry, DepthError> {
    let found = depth(coordinates).map_err(|reason| DepthError::Malformed {
        kind,
        reason: reason.to_string(),
    })?;

    let expected = kind.depth();
    if found != expected {
        return Err(DepthError::Depth {
            kind,
            expected,
            found,
        });
    }

    match kind {
        GeometryKind::Point => Ok(Geometry::Point(position(coordinates))),
        GeometryKind::LineString => {
            let points = positions(coordinates);
            at_least(kind, 2, points.len())?;
            Ok(Geometry::LineString(points))
        }
        GeometryKind::Polygon => {
            let rings: Vec<Vec<Position>> = elements(coordinates).iter().map(positions).collect();
            for ring in &rings {
                at_least(kind, 3, ring.len())?;
            }
            Ok(Geometry::Polygon(rings))
        }
    }
}

fn at_least(kind: GeometryKind, minimum: usize, found: usize) -> Result<(), DepthError> {
    if found < minimum {
        return Err(DepthError::TooFewPoints {
            kind,
            minimum,
            found,
        });
    }
    Ok(())
}

/// List levels wrapping the terminal pairs of `value`.
fn depth(value: &Value) -> Result<usize, &'static str> {
    let Value::Array(items) = value else {
        return Err("expected a list of coordinates");
    };

    if items.iter().all(Value::is_number) && !items.is_empty() {
        return if items.len() == 2 {
            Ok(0)
        } else {
            Err("a position must hold exactly two numbers")
        };
    }

    let mut inner: Option<usize> = None;
    for item in items {
        let item_depth = depth(item)?;
        match inner {
            Some(previous) if previous != item_depth => return Err("uneven nesting"),
            _ => inner = Some(item_depth),
        }
    }

    inner
        .map(|inner| inner + 1)
        .ok_or("empty coordinate list")
}

fn elements(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

fn position(value: &Value) -> Position {
    let items = elements(value);
    let coordinate = |index: usize| items.get(index).and_then(Value::as_f64).unwrap_or_default();
    [coordinate(0), coordinate(1)]
}

fn positions(value: &Value) -> Vec<Position> {
    elements(value).iter().map(position).collect()
}

/// Running `[minX, minY, maxX, maxY]` over coordinate pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn of(position: &Position) -> Self {
        Self {
            min_x: position[0],
            min_y: position[1],
            max_x: position[0],
            max_y: position[1],
        }
    }

    pub fn extend(&mut self, position: &Position) {
        self.min_x = self.min_x.min(position[0]);
        self.min_y = self.min_y.min(position[1]);
        self.max_x = self.max_x.max(position[0]);
        self.max_y = self.max_y.max(position[1]);
    }

    /// Folds every pair of `geometry` into `bbox`.
    pub fn accumulate(bbox: &mut Option<BoundingBox>, geometry: &Geometry) {
        for position in geometry.positions() {
            let next = match *bbox {
                Some(mut current) => {
                    current.extend(position);
                    current
                }
                None => BoundingBox::of(position),
            };
            *bbox = Some(next);
        }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}
