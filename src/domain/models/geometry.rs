//! Geometry descriptors produced from design parameters.

use serde::{Deserialize, Serialize};

use super::design::DesignParameters;

/// Immutable description of an airfoil derived from [`DesignParameters`].
///
/// The `id` is a pure function of the parameters, so two descriptors with the
/// same id describe the same shape and can be de-duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescriptor {
    id: String,
    parameters: DesignParameters,
    valid: bool,
    warnings: Vec<String>,
    mesh_quality: f64,
}

impl GeometryDescriptor {
    pub fn new(
        id: impl Into<String>,
        parameters: DesignParameters,
        valid: bool,
        warnings: Vec<String>,
        mesh_quality: f64,
    ) -> Self {
        Self {
            id: id.into(),
            parameters,
            valid,
            warnings,
            mesh_quality,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn parameters(&self) -> &DesignParameters {
        &self.parameters
    }

    /// False when the shape is self-intersecting or not manufacturable.
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub const fn mesh_quality(&self) -> f64 {
        self.mesh_quality
    }
}
