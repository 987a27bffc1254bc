//! Geometry reconstruction for ways and relations.
//!
//! Ways follow a shape rule on their resolved node points. Relations become a
//! flat collection of their resolvable member geometries in member order;
//! roles are not interpreted.

use geo::{Coord, Geometry, GeometryCollection, LineString, Point, Polygon};

/// Build the geometry of a way from its resolved node points.
///
/// - more than three points with a matching first and last point: polygon;
/// - two or more points otherwise: line string in input order;
/// - one point: point;
/// - none: no geometry.
///
/// # Examples
///
/// ```
/// use geo::{Coord, Geometry};
/// use geotable_core::geometry::way_geometry;
///
/// let ring = [
///     Coord { x: 0.0, y: 0.0 },
///     Coord { x: 1.0, y: 0.0 },
///     Coord { x: 1.0, y: 1.0 },
///     Coord { x: 0.0, y: 0.0 },
/// ];
/// assert!(matches!(way_geometry(&ring), Some(Geometry::Polygon(_))));
/// assert!(way_geometry(&[]).is_none());
/// ```
#[must_use]
pub fn way_geometry(points: &[Coord<f64>]) -> Option<Geometry<f64>> {
    match points {
        [] => None,
        [single] => Some(Geometry::Point(Point::from(*single))),
        [first, .., last] if points.len() > 3 && first == last => Some(Geometry::Polygon(
            Polygon::new(LineString::from(points.to_vec()), Vec::new()),
        )),
        _ => Some(Geometry::LineString(LineString::from(points.to_vec()))),
    }
}

/// Extract the coordinate of a point geometry.
#[must_use]
pub const fn point_coord(geometry: &Geometry<f64>) -> Option<Coord<f64>> {
    match geometry {
        Geometry::Point(point) => Some(point.0),
        _ => None,
    }
}

/// Combine member geometries into one flat collection.
///
/// Collections among the members (nested relations) are spliced into the
/// result. Returns `None` when no member geometry is available.
pub fn aggregate<I>(members: I) -> Option<Geometry<f64>>
where
    I: IntoIterator<Item = Geometry<f64>>,
{
    let mut parts = Vec::new();
    for member in members {
        match member {
            Geometry::GeometryCollection(GeometryCollection(nested)) => parts.extend(nested),
            other => parts.push(other),
        }
    }
    (!parts.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(parts)))
}
