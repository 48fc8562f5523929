//! Great-circle distance and geolocation reduction.

use std::collections::BTreeMap;

use olist_shared::Geolocation;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two points given in degrees.
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );
    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Representative coordinates of one postal prefix. Either may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoPoint {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl GeoPoint {
    /// `(lng, lat)` when both coordinates are known.
    pub fn lng_lat(&self) -> Option<(f64, f64)> {
        Some((self.lng?, self.lat?))
    }
}

/// Reduce geolocation rows to one point per postal prefix.
///
/// Latitude and longitude are taken independently: each is the first
/// non-missing value for the prefix in file order. Rows without a prefix
/// are ignored.
pub fn reduce_geolocation(rows: &[Geolocation]) -> BTreeMap<i64, GeoPoint> {
    let mut points: BTreeMap<i64, GeoPoint> = BTreeMap::new();
    for row in rows {
        let Some(prefix) = row.geolocation_zip_code_prefix else {
            continue;
        };
        let point = points.entry(prefix).or_default();
        point.lat = point.lat.or(row.geolocation_lat.filter(|v| !v.is_nan()));
        point.lng = point.lng.or(row.geolocation_lng.filter(|v| !v.is_nan()));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(prefix: i64, lat: Option<f64>, lng: Option<f64>) -> Geolocation {
        Geolocation {
            geolocation_zip_code_prefix: Some(prefix),
            geolocation_lat: lat,
            geolocation_lng: lng,
        }
    }

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_distance(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn equator_to_pole_is_quarter_circle() {
        let d = haversine_distance(0.0, 0.0, 0.0, 90.0);
        assert!((d - 10007.543).abs() < 0.01, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine_distance(-46.639292, -23.545621, -43.176309, -22.905817);
        let b = haversine_distance(-43.176309, -22.905817, -46.639292, -23.545621);
        assert!((a - b).abs() < 1e-9);
        // Sao Paulo to Rio de Janeiro is roughly 360 km.
        assert!((340.0..380.0).contains(&a), "got {a}");
    }

    #[test]
    fn reduction_keeps_first_known_coordinates() {
        let rows = vec![
            geo(20031, None, Some(-43.17)),
            geo(1037, Some(-23.54), Some(-46.63)),
            geo(20031, Some(-22.90), Some(-43.18)),
            geo(1037, Some(-23.99), Some(-46.99)),
        ];
        let points = reduce_geolocation(&rows);
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[&1037],
            GeoPoint {
                lat: Some(-23.54),
                lng: Some(-46.63)
            }
        );
        assert_eq!(
            points[&20031],
            GeoPoint {
                lat: Some(-22.90),
                lng: Some(-43.17)
            }
        );
    }

    #[test]
    fn rows_without_prefix_are_ignored() {
        let mut orphan = geo(0, Some(2.0), Some(2.0));
        orphan.geolocation_zip_code_prefix = None;
        let points = reduce_geolocation(&[orphan, geo(1037, Some(-23.54), Some(-46.63))]);
        assert_eq!(points.len(), 1);
        assert!(points.contains_key(&1037));
        assert!(!points.contains_key(&0));
    }

    #[test]
    fn incomplete_point_has_no_lng_lat() {
        let point = GeoPoint {
            lat: Some(1.0),
            lng: None,
        };
        assert_eq!(point.lng_lat(), None);
    }
}
