//! CRS transforms between the geographic frame and UTM zones.

use geo::{Coord, LineString, Polygon};
use geoplan_core::error::{GeoplanError, Result};
use proj::Proj;

/// EPSG code of the UTM zone covering a geographic point:
/// `zone = floor((lon + 180) / 6) + 1`, 32600+zone in the northern
/// hemisphere, 32700+zone in the southern.
pub fn utm_epsg_for(lon: f64, lat: f64) -> u32 {
    let zone = ((lon + 180.0) / 6.0).floor() as u32 + 1;
    if lat >= 0.0 {
        32600 + zone
    } else {
        32700 + zone
    }
}

/// Build a one-way projector between two EPSG codes.
pub fn projector(from_epsg: u32, to_epsg: u32) -> Result<Proj> {
    let from = format!("EPSG:{}", from_epsg);
    let to = format!("EPSG:{}", to_epsg);
    Proj::new_known_crs(&from, &to, None).map_err(|e| GeoplanError::Projection {
        from,
        to,
        reason: e.to_string(),
    })
}

fn convert_coord(proj: &Proj, coord: &Coord<f64>) -> Result<Coord<f64>> {
    let (x, y) = proj
        .convert((coord.x, coord.y))
        .map_err(|e| GeoplanError::Projection {
            from: "source".to_string(),
            to: "target".to_string(),
            reason: e.to_string(),
        })?;
    Ok(Coord { x, y })
}

fn convert_ring(proj: &Proj, ring: &LineString<f64>) -> Result<LineString<f64>> {
    let coords: Result<Vec<Coord<f64>>> =
        ring.coords().map(|c| convert_coord(proj, c)).collect();
    Ok(LineString::new(coords?))
}

/// Reproject a polygon, walking the exterior and every interior ring.
pub fn reproject_polygon(proj: &Proj, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
    let exterior = convert_ring(proj, polygon.exterior())?;
    let interiors: Result<Vec<LineString<f64>>> = polygon
        .interiors()
        .iter()
        .map(|ring| convert_ring(proj, ring))
        .collect();
    Ok(Polygon::new(exterior, interiors?))
}

/// Reproject the geometry kinds that occur in obstacle data.
pub fn reproject_geometry(
    proj: &Proj,
    geometry: &geo::Geometry<f64>,
) -> Result<geo::Geometry<f64>> {
    use geo::Geometry;

    Ok(match geometry {
        Geometry::Point(p) => {
            let c = convert_coord(proj, &p.0)?;
            Geometry::Point(geo::Point(c))
        }
        Geometry::LineString(ls) => Geometry::LineString(convert_ring(proj, ls)?),
        Geometry::Polygon(poly) => Geometry::Polygon(reproject_polygon(proj, poly)?),
        Geometry::MultiLineString(mls) => {
            let lines: Result<Vec<LineString<f64>>> =
                mls.0.iter().map(|ls| convert_ring(proj, ls)).collect();
            Geometry::MultiLineString(geo::MultiLineString(lines?))
        }
        Geometry::MultiPolygon(mp) => {
            let polygons: Result<Vec<Polygon<f64>>> =
                mp.0.iter().map(|p| reproject_polygon(proj, p)).collect();
            Geometry::MultiPolygon(geo::MultiPolygon(polygons?))
        }
        other => {
            return Err(GeoplanError::Projection {
                from: "source".to_string(),
                to: "target".to_string(),
                reason: format!("unsupported geometry kind {}", geometry_kind(other)),
            })
        }
    })
}

fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utm_zone_selection() {
        // Nanjing area: zone 50 north.
        assert_eq!(utm_epsg_for(118.75, 32.0), 32650);
        // Greenwich: zone 31 north.
        assert_eq!(utm_epsg_for(0.0, 51.5), 32631);
        // Southern hemisphere flips to the 327xx band.
        assert_eq!(utm_epsg_for(115.26, -8.5), 32750);
        // Western edge of zone 1.
        assert_eq!(utm_epsg_for(-180.0, 10.0), 32601);
    }

    #[test]
    fn test_round_trip_through_utm() {
        let forward = projector(4326, 32650).unwrap();
        let inverse = projector(32650, 4326).unwrap();

        let polygon = geo::Polygon::new(
            geo::LineString::from(vec![
                (118.7, 31.9),
                (118.8, 31.9),
                (118.8, 32.0),
                (118.7, 32.0),
                (118.7, 31.9),
            ]),
            vec![],
        );

        let projected = reproject_polygon(&forward, &polygon).unwrap();
        let back = reproject_polygon(&inverse, &projected).unwrap();

        for (orig, round) in polygon.exterior().coords().zip(back.exterior().coords()) {
            assert!((orig.x - round.x).abs() < 1e-6);
            assert!((orig.y - round.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_projected_units_are_meters() {
        let forward = projector(4326, 32650).unwrap();
        // Roughly 0.01 degrees of latitude is ~1113 m.
        let a = convert_coord(&forward, &geo::Coord { x: 118.75, y: 32.0 }).unwrap();
        let b = convert_coord(&forward, &geo::Coord { x: 118.75, y: 32.01 }).unwrap();
        let dy = (b.y - a.y).abs();
        assert!((dy - 1110.0).abs() < 10.0, "dy was {}", dy);
    }
}
