//! Buffered-union construction for obstacle exclusion zones.
//!
//! `geo` carries no buffer operation, so buffers are built as a capsule
//! sweep: a discretized disc at every vertex plus a quad along every
//! segment, all unioned with `BooleanOps`. Inputs must already be in a
//! metric CRS; the radius is in the same units as the coordinates.

use geo::{BooleanOps, Coord, Geometry, LineString, MultiPolygon, Polygon};

/// Segments per full circle when discretizing disc caps.
const ARC_SEGMENTS: usize = 32;

fn disc(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    let mut coords = Vec::with_capacity(ARC_SEGMENTS + 1);
    for i in 0..ARC_SEGMENTS {
        let theta = std::f64::consts::TAU * (i as f64) / (ARC_SEGMENTS as f64);
        coords.push((
            center.x + radius * theta.cos(),
            center.y + radius * theta.sin(),
        ));
    }
    coords.push(coords[0]);
    Polygon::new(LineString::from(coords), vec![])
}

/// Rectangle spanning a segment at the given half-width; `None` for
/// zero-length segments (the vertex discs already cover those).
fn segment_quad(a: Coord<f64>, b: Coord<f64>, radius: f64) -> Option<Polygon<f64>> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f64::EPSILON {
        return None;
    }
    let nx = -dy / len * radius;
    let ny = dx / len * radius;
    Some(Polygon::new(
        LineString::from(vec![
            (a.x + nx, a.y + ny),
            (b.x + nx, b.y + ny),
            (b.x - nx, b.y - ny),
            (a.x - nx, a.y - ny),
            (a.x + nx, a.y + ny),
        ]),
        vec![],
    ))
}

/// Balanced pairwise union; avoids the O(n²) cost of folding left-to-right
/// across many small parts.
pub fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    match parts.len() {
        0 => MultiPolygon(vec![]),
        1 => parts.remove(0),
        _ => {
            let right = parts.split_off(parts.len() / 2);
            union_all(parts).union(&union_all(right))
        }
    }
}

/// Buffer a line by sweeping discs and segment quads along it.
pub fn buffer_line(line: &LineString<f64>, radius: f64) -> MultiPolygon<f64> {
    let mut parts: Vec<MultiPolygon<f64>> = line
        .coords()
        .map(|c| MultiPolygon(vec![disc(*c, radius)]))
        .collect();
    parts.extend(
        line.lines()
            .filter_map(|seg| segment_quad(seg.start, seg.end, radius))
            .map(|quad| MultiPolygon(vec![quad])),
    );
    union_all(parts)
}

/// Buffer a polygon: the polygon itself unioned with the swept exterior
/// and interior rings, so holes shrink by the radius as well.
pub fn buffer_polygon(polygon: &Polygon<f64>, radius: f64) -> MultiPolygon<f64> {
    let mut parts = vec![MultiPolygon(vec![polygon.clone()])];
    parts.push(buffer_line(polygon.exterior(), radius));
    for ring in polygon.interiors() {
        parts.push(buffer_line(ring, radius));
    }
    union_all(parts)
}

/// Buffer any obstacle geometry. Geometry kinds that do not occur in
/// obstacle data buffer to nothing.
pub fn buffer_geometry(geometry: &Geometry<f64>, radius: f64) -> MultiPolygon<f64> {
    match geometry {
        Geometry::Point(p) => MultiPolygon(vec![disc(p.0, radius)]),
        Geometry::LineString(line) => buffer_line(line, radius),
        Geometry::Polygon(polygon) => buffer_polygon(polygon, radius),
        Geometry::MultiLineString(lines) => {
            union_all(lines.iter().map(|l| buffer_line(l, radius)).collect())
        }
        Geometry::MultiPolygon(polygons) => {
            union_all(polygons.iter().map(|p| buffer_polygon(p, radius)).collect())
        }
        _ => MultiPolygon(vec![]),
    }
}
