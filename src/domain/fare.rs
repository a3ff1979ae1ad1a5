use serde::Serialize;

/// Distance bands with a flat price. Each bound closes its own band.
const FLAT_TIERS: [(FareTier, f64, i64); 4] = [
    (FareTier::UpTo3Km, 3.0, 15),
    (FareTier::UpTo7Km, 7.0, 25),
    (FareTier::UpTo12Km, 12.0, 40),
    (FareTier::UpTo20Km, 20.0, 60),
];

const LONG_DISTANCE_FROM_KM: f64 = 20.0;
const LONG_DISTANCE_BASE: i64 = 60;
const LONG_DISTANCE_STEP_KM: f64 = 5.0;
const LONG_DISTANCE_STEP_FARE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FareTier {
    UpTo3Km,
    UpTo7Km,
    UpTo12Km,
    UpTo20Km,
    LongDistance,
}

/// The band a distance falls into, or `None` when no distance was entered.
pub fn fare_tier(distance_km: f64) -> Option<FareTier> {
    if !is_priceable(distance_km) {
        return None;
    }
    let tier = FLAT_TIERS
        .iter()
        .find(|(_, upper, _)| distance_km <= *upper)
        .map(|(tier, _, _)| *tier)
        .unwrap_or(FareTier::LongDistance);
    Some(tier)
}

/// Converts a travelled distance into a fare.
///
/// Zero, negative and non-finite distances have no price; the completion
/// dialog treats that as "nothing entered yet".
pub fn compute_fare(distance_km: f64) -> Option<i64> {
    if !is_priceable(distance_km) {
        return None;
    }
    if let Some((_, _, fare)) = FLAT_TIERS
        .iter()
        .find(|(_, upper, _)| distance_km <= *upper)
    {
        return Some(*fare);
    }

    let steps = ((distance_km - LONG_DISTANCE_FROM_KM) / LONG_DISTANCE_STEP_KM).ceil() as i64;
    Some(LONG_DISTANCE_BASE.saturating_add(steps.saturating_mul(LONG_DISTANCE_STEP_FARE)))
}

fn is_priceable(distance_km: f64) -> bool {
    distance_km.is_finite() && distance_km > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_tiers_include_their_upper_bound() {
        assert_eq!(compute_fare(0.1), Some(15));
        assert_eq!(compute_fare(3.0), Some(15));
        assert_eq!(compute_fare(7.0), Some(25));
        assert_eq!(compute_fare(12.0), Some(40));
        assert_eq!(compute_fare(20.0), Some(60));
    }

    #[test]
    fn just_above_a_bound_moves_up_a_tier() {
        assert_eq!(compute_fare(3.01), Some(25));
        assert_eq!(compute_fare(7.01), Some(40));
        assert_eq!(compute_fare(12.01), Some(60));
        assert_eq!(compute_fare(20.01), Some(70));
    }

    #[test]
    fn long_distance_adds_ten_per_started_five_km() {
        assert_eq!(compute_fare(25.0), Some(70));
        assert_eq!(compute_fare(25.5), Some(80));
        assert_eq!(compute_fare(45.0), Some(110));
        assert_eq!(compute_fare(1000.0), Some(60 + 196 * 10));
    }

    #[test]
    fn no_price_without_a_positive_distance() {
        assert_eq!(compute_fare(0.0), None);
        assert_eq!(compute_fare(-0.0), None);
        assert_eq!(compute_fare(-4.0), None);
        assert_eq!(compute_fare(f64::NAN), None);
        assert_eq!(compute_fare(f64::INFINITY), None);
        assert_eq!(fare_tier(0.0), None);
    }

    #[test]
    fn fare_never_decreases_with_distance() {
        let mut previous = 0;
        let mut distance = 0.05;
        while distance < 80.0 {
            let fare = compute_fare(distance).expect("positive distance has a fare");
            assert!(
                fare >= previous,
                "fare dropped from {previous} to {fare} at {distance} km"
            );
            previous = fare;
            distance += 0.05;
        }
    }

    #[test]
    fn tiers_line_up_with_fares() {
        assert_eq!(fare_tier(2.0), Some(FareTier::UpTo3Km));
        assert_eq!(fare_tier(7.0), Some(FareTier::UpTo7Km));
        assert_eq!(fare_tier(11.0), Some(FareTier::UpTo12Km));
        assert_eq!(fare_tier(20.0), Some(FareTier::UpTo20Km));
        assert_eq!(fare_tier(20.5), Some(FareTier::LongDistance));
    }
}
