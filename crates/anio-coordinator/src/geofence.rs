//! Geofence membership via great-circle distance

use anio_api::Geofence;

/// Earth's radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters (Haversine)
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Check whether a position lies within a geofence's radius
pub fn is_inside_geofence(latitude: f64, longitude: f64, fence: &Geofence) -> bool {
    let distance = haversine_distance_m(latitude, longitude, fence.latitude, fence.longitude);
    distance <= f64::from(fence.radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(latitude: f64, longitude: f64, radius: u32) -> Geofence {
        serde_json::from_value(serde_json::json!({
            "id": "fence1",
            "name": "Home",
            "lat": latitude,
            "lng": longitude,
            "radius": radius,
        }))
        .unwrap()
    }

    #[test]
    fn test_identical_coordinates_inside_any_positive_radius() {
        let fence = fence(52.52, 13.405, 1);
        assert!(is_inside_geofence(52.52, 13.405, &fence));
    }

    #[test]
    fn test_ten_km_away_outside_small_radius() {
        // ~0.09° of latitude is roughly 10 km
        let fence = fence(52.52, 13.405, 100);
        assert!(!is_inside_geofence(52.61, 13.405, &fence));
    }

    #[test]
    fn test_fifty_meters_away_inside_hundred_meter_radius() {
        // ~0.00045° of latitude is roughly 50 m
        let fence = fence(52.52, 13.405, 100);
        assert!(is_inside_geofence(52.52045, 13.405, &fence));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Berlin to Potsdam city centers, roughly 26-27 km apart
        let distance = haversine_distance_m(52.5200, 13.4050, 52.3906, 13.0645);
        assert!((26_000.0..28_500.0).contains(&distance));
    }
}
