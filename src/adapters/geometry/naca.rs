//! NACA 4-series geometry generator.

use crate::domain::models::{DesignParameters, GeometryDescriptor, ParameterSpace};
use crate::domain::ports::GeometryGenerator;

/// Thinner sections than this relative to their camber cannot be built.
const MIN_THICKNESS_TO_CAMBER: f64 = 1.5;

/// Maps parameters onto a NACA 4-digit section.
///
/// Validity comes from the manufacturing envelope; anything outside it is
/// still described but marked invalid so the gateway never dispatches it.
#[derive(Debug, Clone)]
pub struct NacaGeometryGenerator {
    limits: ParameterSpace,
}

impl Default for NacaGeometryGenerator {
    fn default() -> Self {
        Self::new(ParameterSpace::default())
    }
}

impl NacaGeometryGenerator {
    pub const fn new(limits: ParameterSpace) -> Self {
        Self { limits }
    }

    /// `NACA{m}{p}{tt}_a{alpha}` plus a fingerprint of the exact values,
    /// since the 4-digit code alone is coarser than the search resolution.
    pub fn identity(parameters: &DesignParameters) -> String {
        let digit = |value: f64, scale: f64| (value * scale + 1e-9).floor() as i64;
        let m = digit(parameters.max_camber(), 100.0);
        let p = digit(parameters.camber_position(), 10.0);
        let tt = digit(parameters.thickness(), 100.0);
        format!(
            "NACA{m}{p}{tt:02}_a{:.1}-{:08x}",
            parameters.angle_of_attack(),
            fingerprint(parameters)
        )
    }

    fn check(&self, parameters: &DesignParameters) -> (bool, Vec<String>) {
        let mut valid = true;
        let mut warnings = Vec::new();
        let limits = &self.limits;

        let t = parameters.thickness();
        if !limits.thickness.contains(t) {
            warnings.push(format!(
                "thickness {t:.3} outside [{}, {}]",
                limits.thickness.min, limits.thickness.max
            ));
            valid = false;
        } else if t > 0.15 {
            warnings.push("high thickness may cause flow separation".to_string());
        }

        let m = parameters.max_camber();
        if !limits.max_camber.contains(m) {
            warnings.push(format!(
                "max camber {m:.3} outside [{}, {}]",
                limits.max_camber.min, limits.max_camber.max
            ));
            valid = false;
        } else if m > 0.06 {
            warnings.push("high camber increases drag".to_string());
        }

        let p = parameters.camber_position();
        if !limits.camber_position.contains(p) {
            warnings.push(format!(
                "camber position {p:.2} outside [{}, {}]",
                limits.camber_position.min, limits.camber_position.max
            ));
            valid = false;
        } else if p < 0.3 {
            warnings.push("forward camber may cause leading-edge separation".to_string());
        }

        let alpha = parameters.angle_of_attack();
        if !limits.angle_of_attack.contains(alpha) {
            warnings.push(format!(
                "angle of attack {alpha:.1} outside [{}, {}]",
                limits.angle_of_attack.min, limits.angle_of_attack.max
            ));
            valid = false;
        } else if alpha > 8.0 {
            warnings.push("angle of attack near stall".to_string());
        }

        if m > 0.0 && t / m < MIN_THICKNESS_TO_CAMBER {
            warnings.push(format!(
                "thickness-to-camber ratio {:.2} below {MIN_THICKNESS_TO_CAMBER}",
                t / m
            ));
            valid = false;
        }

        (valid, warnings)
    }
}

/// 0.5 to 1.0; thin sections, heavy camber and extreme camber positions mesh
/// worse.
fn mesh_quality(parameters: &DesignParameters) -> f64 {
    let mut quality = 0.90;
    if parameters.thickness() < 0.10 {
        quality -= (0.10 - parameters.thickness()) * 2.0;
    }
    if parameters.max_camber() > 0.05 {
        quality -= (parameters.max_camber() - 0.05) * 1.5;
    }
    quality -= (parameters.camber_position() - 0.40).abs() * 0.2;
    quality.clamp(0.5, 1.0)
}

/// FNV-1a over the values at 1e-4 resolution.
fn fingerprint(parameters: &DesignParameters) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for value in parameters.as_array() {
        let scaled = (value * 10_000.0).round() as i64;
        for byte in scaled.to_le_bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
    }
    hash
}

impl GeometryGenerator for NacaGeometryGenerator {
    fn generate(&self, parameters: &DesignParameters) -> GeometryDescriptor {
        let (valid, warnings) = self.check(parameters);
        GeometryDescriptor::new(
            Self::identity(parameters),
            *parameters,
            valid,
            warnings,
            mesh_quality(parameters),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ParameterBound;

    fn params(values: [f64; 4]) -> DesignParameters {
        DesignParameters::new(&ParameterSpace::default(), values).unwrap()
    }

    #[test]
    fn test_identity_keeps_naca_code() {
        let id = NacaGeometryGenerator::identity(&params([0.12, 0.04, 0.4, 2.0]));
        assert!(id.starts_with("NACA4412_a2.0-"), "{id}");
        assert_eq!(id.len(), "NACA4412_a2.0-".len() + 8);
    }

    #[test]
    fn test_identity_distinguishes_nearby_designs() {
        let a = NacaGeometryGenerator::identity(&params([0.121, 0.04, 0.4, 2.0]));
        let b = NacaGeometryGenerator::identity(&params([0.123, 0.04, 0.4, 2.0]));
        assert_ne!(a, b);
        assert_eq!(&a[..13], &b[..13]);
    }

    #[test]
    fn test_generation_is_pure() {
        let generator = NacaGeometryGenerator::default();
        let p = params([0.12, 0.02, 0.4, 2.0]);
        assert_eq!(generator.generate(&p), generator.generate(&p));
    }

    #[test]
    fn test_nominal_section_is_valid_without_warnings() {
        let geometry = NacaGeometryGenerator::default().generate(&params([0.12, 0.02, 0.4, 2.0]));
        assert!(geometry.is_valid());
        assert!(geometry.warnings().is_empty());
        assert!((geometry.mesh_quality() - 0.90).abs() < 1e-12);
    }

    #[test]
    fn test_thin_heavily_cambered_section_is_invalid() {
        let geometry = NacaGeometryGenerator::default().generate(&params([0.08, 0.07, 0.4, 2.0]));
        assert!(!geometry.is_valid());
        assert!(geometry.warnings().iter().any(|w| w.contains("thickness-to-camber")));
    }

    #[test]
    fn test_narrow_limits_reject_in_space_values() {
        let mut limits = ParameterSpace::default();
        limits.angle_of_attack = ParameterBound::new(0.0, 5.0);
        let geometry = NacaGeometryGenerator::new(limits).generate(&params([0.12, 0.02, 0.4, 9.0]));
        assert!(!geometry.is_valid());
    }

    #[test]
    fn test_advisory_warnings_keep_validity() {
        let geometry = NacaGeometryGenerator::default().generate(&params([0.17, 0.02, 0.25, 9.0]));
        assert!(geometry.is_valid());
        assert_eq!(geometry.warnings().len(), 3);
        assert!(geometry.mesh_quality() < 0.90);
    }
}
