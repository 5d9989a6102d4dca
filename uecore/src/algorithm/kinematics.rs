use std::f64::consts::PI;

/// Largest accepted |z| of the event vertex, in cm.
pub const MAX_ABS_VERTEX_Z: f64 = 1000.0;

/// Folds an azimuthal difference back into `(-pi, pi]` with a single shift of `2 pi`.
///
/// Inputs are differences of two angles already inside `(-pi, pi]`, so one shift suffices.
#[inline]
pub fn wrap_delta_phi(dphi: f64) -> f64 {
    if dphi > PI {
        dphi - 2.0 * PI
    } else if dphi <= -PI {
        dphi + 2.0 * PI
    } else {
        dphi
    }
}

/// Folds any azimuthal angle into `(-pi, pi]`.
#[inline]
pub fn wrap_phi(phi: f64) -> f64 {
    let wrapped = (phi + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Distance in `(eta, phi)` space, with azimuthal wraparound.
///
/// # Example
///
/// ```rust
/// # use uecore::algorithm::kinematics::delta_r;
/// let dr = delta_r(0.3, 0.0, 0.0, 0.4);
/// assert!((dr - 0.5).abs() < 1e-12);
/// ```
#[inline]
pub fn delta_r(eta_a: f64, phi_a: f64, eta_b: f64, phi_b: f64) -> f64 {
    let deta = eta_a - eta_b;
    let dphi = wrap_delta_phi(phi_a - phi_b);
    (deta * deta + dphi * dphi).sqrt()
}

/// Shifts tower positions from the nominal detector center to the event vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexCorrection {
    pub z_vertex: f64,
}

impl VertexCorrection {
    pub fn new(z_vertex: f64) -> Self {
        VertexCorrection { z_vertex }
    }

    /// Returns the correction for a usable vertex, `None` if the vertex is NaN or out of range.
    pub fn from_vertex(z_vertex: Option<f64>) -> Option<Self> {
        match z_vertex {
            Some(z) if z.is_finite() && z.abs() <= MAX_ABS_VERTEX_Z => Some(VertexCorrection::new(z)),
            _ => None,
        }
    }

    /// Pseudorapidity of a tower seen from the vertex instead of the detector center.
    ///
    /// # Arguments
    ///
    /// * `eta_raw` - Geometric pseudorapidity of the tower center.
    /// * `r` - Radius of the tower center.
    ///
    /// # Returns
    ///
    /// * `asinh((r * sinh(eta_raw) - z_vertex) / r)`
    ///
    /// # Example
    ///
    /// ```rust
    /// # use uecore::algorithm::kinematics::VertexCorrection;
    /// let centered = VertexCorrection::new(0.0);
    /// assert!((centered.corrected_eta(0.8, 127.5) - 0.8).abs() < 1e-12);
    ///
    /// let shifted = VertexCorrection::new(10.0);
    /// assert!(shifted.corrected_eta(0.0, 100.0) < 0.0);
    /// ```
    #[inline]
    pub fn corrected_eta(&self, eta_raw: f64, r: f64) -> f64 {
        let z = r * eta_raw.sinh() - self.z_vertex;
        (z / r).asinh()
    }

    /// Transverse momentum of `energy` deposited at `eta`; NaN collapses to zero.
    #[inline]
    pub fn transverse_momentum(energy: f64, eta: f64) -> f64 {
        let pt = energy / eta.cosh();
        if pt.is_nan() {
            0.0
        } else {
            pt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraparound_across_pi() {
        let dphi = wrap_delta_phi((PI - 0.01) - (-PI + 0.01));
        assert!((dphi.abs() - 0.02).abs() < 1e-9);

        let dphi = wrap_delta_phi((-PI + 0.01) - (PI - 0.01));
        assert!((dphi.abs() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_phi_range() {
        assert!((wrap_phi(-PI) - PI).abs() < 1e-12);
        assert!((wrap_phi(1.5 * PI) + 0.5 * PI).abs() < 1e-12);
        assert!((wrap_phi(0.3) - 0.3).abs() < 1e-12);
        assert!((wrap_phi(-7.0 * PI + 0.2) - (-PI + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_delta_r_wraps() {
        let dr = delta_r(0.0, PI - 0.1, 0.0, -PI + 0.1);
        assert!((dr - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vertex_leaves_eta_unchanged() {
        let correction = VertexCorrection::new(0.0);
        for eta in [-1.05, -0.3, 0.0, 0.42, 1.1] {
            assert!((correction.corrected_eta(eta, 93.5) - eta).abs() < 1e-12);
        }
    }

    #[test]
    fn test_positive_vertex_lowers_eta() {
        let correction = VertexCorrection::new(20.0);
        let eta = correction.corrected_eta(0.0, 100.0);
        assert!((eta - (-0.2f64).asinh()).abs() < 1e-12);
    }

    #[test]
    fn test_vertex_sanity() {
        assert!(VertexCorrection::from_vertex(Some(12.0)).is_some());
        assert!(VertexCorrection::from_vertex(Some(-999.0)).is_some());
        assert!(VertexCorrection::from_vertex(Some(1500.0)).is_none());
        assert!(VertexCorrection::from_vertex(Some(-1500.0)).is_none());
        assert!(VertexCorrection::from_vertex(Some(f64::NAN)).is_none());
        assert!(VertexCorrection::from_vertex(None).is_none());
    }

    #[test]
    fn test_nan_pt_is_zero() {
        assert_eq!(VertexCorrection::transverse_momentum(f64::NAN, 0.2), 0.0);
        assert!((VertexCorrection::transverse_momentum(2.0, 0.0) - 2.0).abs() < 1e-12);
    }
}
