//! Design parameters and the bounded space they live in.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Number of continuous design variables.
pub const PARAMETER_COUNT: usize = 4;

/// The fixed set of design variables, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Maximum thickness as a fraction of chord.
    Thickness,
    /// Maximum camber as a fraction of chord.
    MaxCamber,
    /// Chordwise position of maximum camber.
    CamberPosition,
    /// Angle of attack in degrees.
    AngleOfAttack,
}

impl Parameter {
    pub const ALL: [Self; PARAMETER_COUNT] = [
        Self::Thickness,
        Self::MaxCamber,
        Self::CamberPosition,
        Self::AngleOfAttack,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thickness => "thickness",
            Self::MaxCamber => "max_camber",
            Self::CamberPosition => "camber_position",
            Self::AngleOfAttack => "angle_of_attack",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Thickness => 0,
            Self::MaxCamber => 1,
            Self::CamberPosition => 2,
            Self::AngleOfAttack => 3,
        }
    }
}

/// Inclusive `[min, max]` range for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBound {
    pub min: f64,
    pub max: f64,
}

impl ParameterBound {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, parameter: Parameter) -> DomainResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(DomainError::InvalidConfiguration(format!(
                "bound for {} must be finite",
                parameter.as_str()
            )));
        }
        if self.min > self.max {
            return Err(DomainError::InvalidConfiguration(format!(
                "bound for {}: min {} > max {}",
                parameter.as_str(),
                self.min,
                self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Map a value into `[0, 1]`. Degenerate bounds map to `0.5`.
    pub fn normalize(&self, value: f64) -> f64 {
        let width = self.width();
        if width <= 0.0 {
            return 0.5;
        }
        (value - self.min) / width
    }

    pub fn denormalize(&self, unit: f64) -> f64 {
        self.clamp(self.min + unit.clamp(0.0, 1.0) * self.width())
    }
}

/// Declared bounds for every design variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub thickness: ParameterBound,
    pub max_camber: ParameterBound,
    pub camber_position: ParameterBound,
    pub angle_of_attack: ParameterBound,
}

impl Default for ParameterSpace {
    /// NACA 4-series envelope: thickness 8–20 %, camber 0–8 %, camber
    /// position 0.2–0.6 chord, angle of attack −2° to 10°.
    fn default() -> Self {
        Self {
            thickness: ParameterBound::new(0.08, 0.20),
            max_camber: ParameterBound::new(0.0, 0.08),
            camber_position: ParameterBound::new(0.2, 0.6),
            angle_of_attack: ParameterBound::new(-2.0, 10.0),
        }
    }
}

impl ParameterSpace {
    pub const fn bound(&self, parameter: Parameter) -> &ParameterBound {
        match parameter {
            Parameter::Thickness => &self.thickness,
            Parameter::MaxCamber => &self.max_camber,
            Parameter::CamberPosition => &self.camber_position,
            Parameter::AngleOfAttack => &self.angle_of_attack,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        Parameter::ALL
            .iter()
            .try_for_each(|&p| self.bound(p).validate(p))
    }

    pub fn contains(&self, params: &DesignParameters) -> bool {
        let values = params.as_array();
        Parameter::ALL
            .iter()
            .all(|&p| self.bound(p).contains(values[p.index()]))
    }

    pub fn normalize(&self, params: &DesignParameters) -> [f64; PARAMETER_COUNT] {
        let values = params.as_array();
        let mut unit = [0.0; PARAMETER_COUNT];
        for p in Parameter::ALL {
            unit[p.index()] = self.bound(p).normalize(values[p.index()]);
        }
        unit
    }

    /// Map a point of the unit hypercube back into the space, rounding each
    /// value to `decimals` places. The result is always in bounds.
    pub fn denormalize(&self, unit: [f64; PARAMETER_COUNT], decimals: u32) -> DesignParameters {
        let mut values = [0.0; PARAMETER_COUNT];
        for p in Parameter::ALL {
            let bound = self.bound(p);
            values[p.index()] = bound.clamp(round_to(bound.denormalize(unit[p.index()]), decimals));
        }
        DesignParameters::from_array_unchecked(values)
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10_f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// A candidate airfoil design.
///
/// Only constructible through [`DesignParameters::new`], which rejects
/// out-of-range values instead of clamping them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignParameters {
    thickness: f64,
    max_camber: f64,
    camber_position: f64,
    angle_of_attack: f64,
}

impl DesignParameters {
    pub fn new(space: &ParameterSpace, values: [f64; PARAMETER_COUNT]) -> DomainResult<Self> {
        for p in Parameter::ALL {
            let bound = space.bound(p);
            let value = values[p.index()];
            if !bound.contains(value) {
                return Err(DomainError::ParameterOutOfRange {
                    parameter: p.as_str(),
                    value,
                    min: bound.min,
                    max: bound.max,
                });
            }
        }
        Ok(Self::from_array_unchecked(values))
    }

    pub(crate) const fn from_array_unchecked(values: [f64; PARAMETER_COUNT]) -> Self {
        Self {
            thickness: values[0],
            max_camber: values[1],
            camber_position: values[2],
            angle_of_attack: values[3],
        }
    }

    pub const fn thickness(&self) -> f64 {
        self.thickness
    }

    pub const fn max_camber(&self) -> f64 {
        self.max_camber
    }

    pub const fn camber_position(&self) -> f64 {
        self.camber_position
    }

    pub const fn angle_of_attack(&self) -> f64 {
        self.angle_of_attack
    }

    pub const fn get(&self, parameter: Parameter) -> f64 {
        self.as_array()[parameter.index()]
    }

    pub const fn as_array(&self) -> [f64; PARAMETER_COUNT] {
        [
            self.thickness,
            self.max_camber,
            self.camber_position,
            self.angle_of_attack,
        ]
    }
}

impl std::fmt::Display for DesignParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "t={:.4} m={:.4} p={:.4} alpha={:.2}",
            self.thickness, self.max_camber, self.camber_position, self.angle_of_attack
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_out_of_range() {
        let space = ParameterSpace::default();
        let err = DesignParameters::new(&space, [0.25, 0.04, 0.4, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            DomainError::ParameterOutOfRange {
                parameter: "thickness",
                ..
            }
        ));
    }

    #[test]
    fn test_new_rejects_nan() {
        let space = ParameterSpace::default();
        assert!(DesignParameters::new(&space, [0.12, f64::NAN, 0.4, 2.0]).is_err());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let space = ParameterSpace::default();
        let params = DesignParameters::new(&space, [0.08, 0.0, 0.6, 10.0]).unwrap();
        assert!(space.contains(&params));
    }

    #[test]
    fn test_validate_rejects_inverted_bound() {
        let space = ParameterSpace {
            thickness: ParameterBound::new(0.2, 0.1),
            ..Default::default()
        };
        assert!(matches!(
            space.validate(),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_normalize_denormalize() {
        let space = ParameterSpace::default();
        let params = DesignParameters::new(&space, [0.14, 0.04, 0.4, 4.0]).unwrap();
        let unit = space.normalize(&params);
        assert!((unit[0] - 0.5).abs() < 1e-12);
        assert!((unit[3] - 0.5).abs() < 1e-12);

        let back = space.denormalize(unit, 4);
        assert_eq!(back, params);
    }

    #[test]
    fn test_denormalize_clamps_outside_unit_cube() {
        let space = ParameterSpace::default();
        let params = space.denormalize([-0.5, 1.5, 0.0, 1.0], 4);
        assert!(space.contains(&params));
        assert!((params.thickness() - 0.08).abs() < 1e-12);
        assert!((params.max_camber() - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_bound_normalizes_to_center() {
        let bound = ParameterBound::new(0.3, 0.3);
        assert!((bound.normalize(0.3) - 0.5).abs() < f64::EPSILON);
        assert!((bound.denormalize(0.9) - 0.3).abs() < f64::EPSILON);
    }
}
