//! Great-circle helpers for the proximity feed.
//!
//! `bounding_boxes` gives the index prefilter, `haversine_m` the exact
//! distance used to refine and order candidates.

use crate::models::GeoPoint;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }
}

pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(b.latitude - a.latitude);
    let dlon = to_rad(b.longitude - a.longitude);
    let h = (dlat / 2.0).sin().powi(2)
        + to_rad(a.latitude).cos() * to_rad(b.latitude).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Boxes covering every point within `radius_m` of `center`.
///
/// Returns two boxes when the circle crosses the antimeridian, and a single
/// full-longitude band when it reaches a pole.
pub fn bounding_boxes(center: GeoPoint, radius_m: f64) -> Vec<BoundingBox> {
    let angular = radius_m / EARTH_RADIUS_M;
    let lat_delta = angular.to_degrees();
    let min_lat = center.latitude - lat_delta;
    let max_lat = center.latitude + lat_delta;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return vec![BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        }];
    }

    let ratio = angular.sin() / center.latitude.to_radians().cos();
    if ratio >= 1.0 {
        return vec![BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        }];
    }
    let lon_delta = ratio.asin().to_degrees();
    let min_lon = center.longitude - lon_delta;
    let max_lon = center.longitude + lon_delta;

    if min_lon < -180.0 {
        vec![
            BoundingBox {
                min_lat,
                max_lat,
                min_lon: min_lon + 360.0,
                max_lon: 180.0,
            },
            BoundingBox {
                min_lat,
                max_lat,
                min_lon: -180.0,
                max_lon,
            },
        ]
    } else if max_lon > 180.0 {
        vec![
            BoundingBox {
                min_lat,
                max_lat,
                min_lon,
                max_lon: 180.0,
            },
            BoundingBox {
                min_lat,
                max_lat,
                min_lon: -180.0,
                max_lon: max_lon - 360.0,
            },
        ]
    } else {
        vec![BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }]
    }
}

/// Point reached by travelling `distance_m` from `origin` along `bearing_deg`.
pub fn destination(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let angular = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    let mut lon = lon2.to_degrees();
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    GeoPoint::new(lon, lat2.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMSTERDAM: GeoPoint = GeoPoint {
        longitude: 4.9041,
        latitude: 52.3676,
    };

    #[test]
    fn test_haversine_known_distance() {
        let utrecht = GeoPoint::new(5.1214, 52.0907);
        let d = haversine_m(AMSTERDAM, utrecht);
        assert!((d - 34_500.0).abs() < 1_000.0, "got {d}");
        assert_eq!(haversine_m(AMSTERDAM, AMSTERDAM), 0.0);
    }

    #[test]
    fn test_destination_matches_haversine() {
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let p = destination(AMSTERDAM, bearing, 10_000.0);
            assert!((haversine_m(AMSTERDAM, p) - 10_000.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_box_covers_circle_edge() {
        let boxes = bounding_boxes(AMSTERDAM, 50_000.0);
        assert_eq!(boxes.len(), 1);
        for bearing in (0..360).step_by(15) {
            let edge = destination(AMSTERDAM, bearing as f64, 49_999.0);
            assert!(boxes[0].contains(edge), "bearing {bearing} not covered");
        }
        let outside = destination(AMSTERDAM, 0.0, 60_000.0);
        assert!(!boxes[0].contains(outside));
    }

    #[test]
    fn test_box_splits_at_antimeridian() {
        let fiji = GeoPoint::new(179.9, -17.7);
        let boxes = bounding_boxes(fiji, 50_000.0);
        assert_eq!(boxes.len(), 2);

        let across = destination(fiji, 90.0, 30_000.0);
        assert!(across.longitude < 0.0);
        assert!(boxes.iter().any(|b| b.contains(across)));
        assert!(boxes.iter().any(|b| b.contains(fiji)));
    }

    #[test]
    fn test_box_near_pole_spans_all_longitudes() {
        let boxes = bounding_boxes(GeoPoint::new(10.0, 89.8), 50_000.0);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].min_lon, -180.0);
        assert_eq!(boxes[0].max_lon, 180.0);
        assert_eq!(boxes[0].max_lat, 90.0);
    }
}
