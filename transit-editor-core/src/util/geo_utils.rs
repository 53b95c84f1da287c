use geo::{BoundingRect, Distance, Haversine, LineString, MultiPoint, Point};
use rstar::AABB;

/// meters per degree of latitude, used for coarse envelope construction
const METERS_PER_DEGREE: f64 = 111_320.0;

/// great-circle distance in meters between two lon/lat points.
pub fn haversine_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// cumulative distance in meters at each coordinate of a linestring. the first
/// entry is always 0 and the last entry is the length of the line.
///
/// # Arguments
///
/// * `line` - shape in lon/lat coordinates
///
/// # Returns
///
/// * one distance per coordinate in `line`
pub fn get_coord_distances(line: &LineString<f64>) -> Vec<f64> {
    let mut distances = Vec::with_capacity(line.0.len());
    let mut total = 0.0;
    let mut previous: Option<Point<f64>> = None;
    for coord in line.coords() {
        let point = Point::from(*coord);
        if let Some(prev) = previous {
            total += haversine_meters(prev, point);
        }
        distances.push(total);
        previous = Some(point);
    }
    distances
}

/// cumulative straight-line distance between consecutive points.
pub fn straight_line_distances(points: &[Point<f64>]) -> Vec<f64> {
    let line = LineString::from(points.to_vec());
    get_coord_distances(&line)
}

/// result of snapping a point onto a linestring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineProjection {
    /// index of the segment (coordinate i to i + 1) the point snapped onto
    pub segment: usize,
    /// distance along the line in meters to the snapped point
    pub distance_along: f64,
    /// distance in meters from the point to the snapped point
    pub offset: f64,
}

/// snaps a point onto the nearest segment of `line` at or after `min_segment`.
/// segment math happens in degrees, distances are reported in meters.
///
/// # Arguments
///
/// * `line` - shape in lon/lat coordinates
/// * `coord_distances` - result of [`get_coord_distances`] for `line`
/// * `point` - point to snap
/// * `min_segment` - first segment considered, so that successive stops move forward
///
/// # Returns
///
/// * the projection, or None if the line has fewer than two coordinates or
///   `min_segment` is past the end of the line
pub fn project_onto_line(
    line: &LineString<f64>,
    coord_distances: &[f64],
    point: Point<f64>,
    min_segment: usize,
) -> Option<LineProjection> {
    let mut best: Option<(usize, Point<f64>, f64)> = None;
    for (segment, pair) in line.0.windows(2).enumerate().skip(min_segment) {
        let (a, b) = (pair[0], pair[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((point.x() - a.x) * dx + (point.y() - a.y) * dy) / len_sq).clamp(0.0, 1.0)
        };
        let snapped = Point::new(a.x + t * dx, a.y + t * dy);
        let offset = haversine_meters(point, snapped);
        match best {
            Some((_, _, best_offset)) if best_offset <= offset => {}
            _ => best = Some((segment, snapped, offset)),
        }
    }
    best.and_then(|(segment, snapped, offset)| {
        let start = *coord_distances.get(segment)?;
        let segment_start = Point::from(*line.0.get(segment)?);
        Some(LineProjection {
            segment,
            distance_along: start + haversine_meters(segment_start, snapped),
            offset,
        })
    })
}

/// center of the bounding box around a set of points.
pub fn bounding_box_center(points: &[Point<f64>]) -> Option<Point<f64>> {
    let multi = MultiPoint::from(points.to_vec());
    multi.bounding_rect().map(|rect| Point::from(rect.center()))
}

/// coarse lon/lat envelope extending `meters` in each direction from `point`.
pub fn envelope_around(point: Point<f64>, meters: f64) -> AABB<[f64; 2]> {
    let dlat = meters / METERS_PER_DEGREE;
    let cos_lat = point.y().to_radians().cos().abs().max(1e-6);
    let dlon = meters / (METERS_PER_DEGREE * cos_lat);
    AABB::from_corners(
        [point.x() - dlon, point.y() - dlat],
        [point.x() + dlon, point.y() + dlat],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn test_coord_distances_are_cumulative() {
        let line = line_string![
            (x: -105.0, y: 40.0),
            (x: -105.0, y: 40.01),
            (x: -105.0, y: 40.02),
        ];
        let distances = get_coord_distances(&line);
        assert_eq!(distances.len(), 3);
        assert_eq!(distances[0], 0.0);
        // roughly 1.1km per 0.01 degree of latitude
        assert!((distances[1] - 1112.0).abs() < 5.0, "{}", distances[1]);
        assert!((distances[2] - 2.0 * distances[1]).abs() < 1e-6);
    }

    #[test]
    fn test_project_onto_line() {
        let line = line_string![
            (x: -105.0, y: 40.0),
            (x: -105.0, y: 40.01),
            (x: -105.0, y: 40.02),
        ];
        let distances = get_coord_distances(&line);
        let projection = project_onto_line(&line, &distances, Point::new(-105.0001, 40.015), 0)
            .expect("should project");
        assert_eq!(projection.segment, 1);
        assert!((projection.distance_along - 1.5 * distances[1]).abs() < 1.0);
        assert!(projection.offset < 10.0);
    }

    #[test]
    fn test_project_respects_min_segment() {
        let line = line_string![
            (x: 0.0, y: 0.0),
            (x: 0.01, y: 0.0),
            (x: 0.0, y: 0.0),
        ];
        let distances = get_coord_distances(&line);
        let p = Point::new(0.002, 0.0);
        let first = project_onto_line(&line, &distances, p, 0).unwrap();
        let second = project_onto_line(&line, &distances, p, 1).unwrap();
        assert_eq!(first.segment, 0);
        assert_eq!(second.segment, 1);
        assert!(second.distance_along > first.distance_along);
    }

    #[test]
    fn test_bounding_box_center() {
        let center = bounding_box_center(&[Point::new(0.0, 0.0), Point::new(2.0, 4.0)]).unwrap();
        assert_eq!(center, Point::new(1.0, 2.0));
        assert!(bounding_box_center(&[]).is_none());
    }
}
