//! Small geometry helpers.

use super::point::WorldPoint;

/// Normalize angle to [-pi, pi].
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle;
    while a > std::f32::consts::PI {
        a -= 2.0 * std::f32::consts::PI;
    }
    while a < -std::f32::consts::PI {
        a += 2.0 * std::f32::consts::PI;
    }
    a
}

/// Discrete (Menger) curvature through three consecutive waypoints.
///
/// kappa = 4 * Area(triangle) / (a * b * c), zero for collinear or
/// coincident points. For points sampled from a circle of radius R this
/// evaluates to exactly 1/R.
pub fn menger_curvature(p1: &WorldPoint, p2: &WorldPoint, p3: &WorldPoint) -> f32 {
    let a = p1.distance(p2);
    let b = p2.distance(p3);
    let c = p1.distance(p3);

    let product = a * b * c;
    if product < 1e-12 {
        return 0.0;
    }

    // Heron's formula
    let s = (a + b + c) / 2.0;
    let area_sq = s * (s - a) * (s - b) * (s - c);
    if area_sq <= 0.0 {
        return 0.0;
    }

    4.0 * area_sq.sqrt() / product
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
        assert_relative_eq!(normalize_angle(2.0 * PI), 0.0, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(-3.0 * PI), PI, epsilon = 1e-5);
    }

    #[test]
    fn test_curvature_straight_line() {
        let k = menger_curvature(
            &WorldPoint::new(0.0, 0.0),
            &WorldPoint::new(1.0, 0.0),
            &WorldPoint::new(2.0, 0.0),
        );
        assert!(k.abs() < 1e-6);
    }

    #[test]
    fn test_curvature_on_circle() {
        // Three points on the unit circle -> curvature 1
        let p = |t: f32| WorldPoint::new(t.cos(), t.sin());
        let k = menger_curvature(&p(0.0), &p(0.5), &p(1.0));
        assert_relative_eq!(k, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_curvature_degenerate() {
        let p = WorldPoint::new(1.0, 1.0);
        assert_eq!(menger_curvature(&p, &p, &p), 0.0);
    }
}
