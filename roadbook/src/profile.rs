//! Route profile aggregation.

use serde::Serialize;

use crate::error::{Result, RoadbookError};

/// Walking pace used by [`RouteProfile::estimated_time_hours`], in effort
/// kilometres per hour.
pub const EFFORT_KM_PER_HOUR: f64 = 3.5;

/// Distance and elevation summary of a walking route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteProfile {
    /// Route length in kilometres.
    pub distance_km: f64,
    /// Sum of all climbs in metres.
    pub total_ascent: f64,
    /// Sum of all drops in metres, zero or negative.
    pub total_descent: f64,
    /// Highest sampled elevation in metres.
    pub highest_point: f64,
    /// Lowest sampled elevation in metres.
    pub lowest_point: f64,
}

impl RouteProfile {
    /// Distance weighted by climbing: `distance_km * total_ascent / 100`.
    pub fn effort(&self) -> f64 {
        self.distance_km * (self.total_ascent / 100.0)
    }

    /// Walking time in hours at [`EFFORT_KM_PER_HOUR`].
    pub fn estimated_time_hours(&self) -> f64 {
        self.effort() / EFFORT_KM_PER_HOUR
    }
}

/// Cumulative `(ascent, descent)` over consecutive samples.
///
/// Descent is accumulated as a negative total. Fewer than two samples give
/// `(0.0, 0.0)`.
///
/// ```
/// use roadbook::profile::elevation_profile;
///
/// assert_eq!(elevation_profile(&[10.0, 15.0, 12.0]), (5.0, -3.0));
/// ```
pub fn elevation_profile(samples: &[f64]) -> (f64, f64) {
    samples
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(ascent, descent), delta| {
            if delta < 0.0 {
                (ascent, descent + delta)
            } else {
                (ascent + delta, descent)
            }
        })
}

/// Summarise a route of `distance_m` metres with the given elevations.
///
/// # Errors
///
/// Returns [`RoadbookError::EmptyElevationSeries`] if `samples` is empty.
pub fn build_profile(distance_m: f64, samples: &[f64]) -> Result<RouteProfile> {
    if samples.is_empty() {
        return Err(RoadbookError::EmptyElevationSeries);
    }

    let (total_ascent, total_descent) = elevation_profile(samples);
    let highest_point = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest_point = samples.iter().copied().fold(f64::INFINITY, f64::min);

    Ok(RouteProfile {
        distance_km: distance_m / 1000.0,
        total_ascent,
        total_descent,
        highest_point,
        lowest_point,
    })
}
