use retro_core::Vec3;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the tangent-plane approximation, in m.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Geodetic coordinates: latitude and longitude in degrees, altitude in m.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    /// Latitude, in deg.
    pub latitude: f64,
    /// Longitude, in deg.
    pub longitude: f64,
    /// Altitude above the reference level, in m.
    pub altitude: f64,
}

impl Geodetic {
    /// Returns the coordinates as a `[latitude, longitude, altitude]` triple.
    pub fn to_array(&self) -> [f64; 3] {
        [self.latitude, self.longitude, self.altitude]
    }
}

/// Local tangent frame anchored at a geodetic origin.
///
/// `x` points east, `y` north and `z` up. Conversions use an equirectangular
/// projection on a spherical Earth, accurate to well below a metre over the
/// few tens of km spanned by a detector site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFrame {
    /// Latitude of the frame origin, in deg.
    pub latitude: f64,
    /// Longitude of the frame origin, in deg.
    pub longitude: f64,
}

impl LocalFrame {
    /// Creates a frame anchored at the given origin.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Converts local coordinates to geodetic ones.
    pub fn to_geodetic(&self, position: &Vec3) -> Geodetic {
        let coslat = self.latitude.to_radians().cos().max(f64::EPSILON);
        Geodetic {
            latitude: self.latitude + (position[1] / EARTH_RADIUS).to_degrees(),
            longitude: self.longitude + (position[0] / (EARTH_RADIUS * coslat)).to_degrees(),
            altitude: position[2],
        }
    }

    /// Converts geodetic coordinates to local ones.
    pub fn from_geodetic(&self, geodetic: &Geodetic) -> Vec3 {
        let coslat = self.latitude.to_radians().cos().max(f64::EPSILON);
        [
            (geodetic.longitude - self.longitude).to_radians() * EARTH_RADIUS * coslat,
            (geodetic.latitude - self.latitude).to_radians() * EARTH_RADIUS,
            geodetic.altitude,
        ]
    }
}

/// Unit direction for a local zenith angle and an azimuth counted from the
/// `x` axis towards `y`, both in degrees.
pub(crate) fn angular_to_direction(zenith: f64, azimuth: f64) -> Vec3 {
    let (st, ct) = zenith.to_radians().sin_cos();
    let (sp, cp) = azimuth.to_radians().sin_cos();
    [st * cp, st * sp, ct]
}

/// Inverse of [`angular_to_direction`], returning `(zenith, azimuth)` in deg
/// with the azimuth in `(-180, 180]`.
pub(crate) fn direction_to_angular(direction: &Vec3) -> (f64, f64) {
    let n = retro_core::vector::norm(direction).max(f64::MIN_POSITIVE);
    let zenith = (direction[2] / n).clamp(-1.0, 1.0).acos().to_degrees();
    let azimuth = direction[1].atan2(direction[0]).to_degrees();
    (zenith, azimuth)
}
