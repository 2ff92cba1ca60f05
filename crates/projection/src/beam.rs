//! Radar beam geometry on a 4/3 effective Earth (Doviak & Zrnic, eq. 2.28).
//!
//! Relates the distance along the beam, the distance along the ground, the
//! beam height and the elevation angle. Distances and heights are in km,
//! angles in degrees.

use std::f64::consts::PI;

const TO_RAD: f64 = PI / 180.0;
const TO_DEG: f64 = 180.0 / PI;

/// Authalic Earth radius used for beam propagation.
pub const AUTHALIC_RADIUS_KM: f64 = 6371.0072;

/// Standard-refraction beam model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamModel {
    /// Earth radius before the 4/3 correction
    pub earth_radius_km: f64,
    /// Antenna height above ground
    pub antenna_height_km: f64,
}

impl Default for BeamModel {
    fn default() -> Self {
        Self {
            earth_radius_km: AUTHALIC_RADIUS_KM,
            antenna_height_km: 0.0,
        }
    }
}

impl BeamModel {
    pub fn with_antenna_height(antenna_height_km: f64) -> Self {
        Self {
            antenna_height_km,
            ..Default::default()
        }
    }

    /// Radius of the 4/3 equivalent Earth.
    #[inline]
    pub fn effective_radius_km(&self) -> f64 {
        self.earth_radius_km * 4.0 / 3.0
    }

    #[inline]
    fn antenna_radius_km(&self) -> f64 {
        self.effective_radius_km() + self.antenna_height_km
    }

    /// Beam height from the distance along the beam.
    pub fn height_from_beam(&self, dist_beam_km: f64, elev_deg: f64) -> f64 {
        let ra = self.antenna_radius_km();
        let elev = elev_deg * TO_RAD;
        (dist_beam_km.powi(2) + ra.powi(2) + 2.0 * dist_beam_km * ra * elev.sin()).sqrt()
            - self.effective_radius_km()
    }

    /// Beam height from the distance along the ground.
    pub fn height_from_ground(&self, dist_earth_km: f64, elev_deg: f64) -> f64 {
        let re = self.effective_radius_km();
        let elev = elev_deg * TO_RAD;
        elev.cos() / (elev + dist_earth_km / re).cos() * self.antenna_radius_km() - re
    }

    /// Rate of change of beam height with ground distance.
    pub fn height_slope(&self, dist_earth_km: f64, elev_deg: f64) -> f64 {
        let re = self.effective_radius_km();
        let elev = elev_deg * TO_RAD;
        let angle = elev + dist_earth_km / re;
        elev.cos() * self.antenna_radius_km() * angle.sin() / (re * angle.cos().powi(2))
    }

    /// Distance along the beam from the distance along the ground.
    pub fn beam_from_ground(&self, dist_earth_km: f64, elev_deg: f64) -> f64 {
        let elev = elev_deg * TO_RAD;
        let t = (dist_earth_km / self.effective_radius_km()).tan();
        t * self.antenna_radius_km() / (elev.cos() - elev.sin() * t)
    }

    /// Distance along the ground from the distance along the beam.
    pub fn ground_from_beam(&self, dist_beam_km: f64, elev_deg: f64) -> f64 {
        let elev = elev_deg * TO_RAD;
        let re = self.effective_radius_km();
        (dist_beam_km * elev.cos() / (dist_beam_km * elev.sin() + self.antenna_radius_km())).atan() * re
    }

    /// Elevation angle reaching `height_km` at a ground distance.
    pub fn elevation(&self, dist_earth_km: f64, height_km: f64) -> f64 {
        let re = self.effective_radius_km();
        let s = dist_earth_km / re;
        let tan_elev = -(self.antenna_radius_km() / (height_km + re) - s.cos()) / s.sin();
        tan_elev.atan() * TO_DEG
    }
}
