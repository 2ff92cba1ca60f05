//! Great-circle extrapolation.

use crate::sphere::GeoPoint;
use nalgebra::{Rotation3, Unit};

/// How far past the second point to extrapolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtendDistance {
    /// The full `p1 -> p2` distance.
    #[default]
    Full,
    /// Half of the `p1 -> p2` distance, used for cell edges.
    Half,
}

/// Point beyond `p2` on the great circle running from `p1` through `p2`.
///
/// The result lies at the `p1 -> p2` angular distance (or half of it) past
/// `p2`. Coincident or antipodal points do not define a great circle; `p2`
/// is returned unchanged for them.
pub fn lat_lon_extend(p1: GeoPoint, p2: GeoPoint, distance: ExtendDistance) -> GeoPoint {
    let a = p1.to_xyz();
    let b = p2.to_xyz();
    let axis = a.cross(&b);
    let sin_theta = axis.norm();
    if sin_theta < 1e-12 {
        return p2;
    }
    let mut theta = sin_theta.atan2(a.dot(&b));
    if distance == ExtendDistance::Half {
        theta /= 2.0;
    }
    let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(axis), theta);
    GeoPoint::from_xyz(&(rotation * b))
}
