//! Geometry generation port.

use crate::domain::models::{DesignParameters, GeometryDescriptor};

/// Turns design parameters into a geometry descriptor.
///
/// Implementations must be pure: equal parameters always yield an equal
/// descriptor with the same identity string.
pub trait GeometryGenerator: Send + Sync {
    fn generate(&self, parameters: &DesignParameters) -> GeometryDescriptor;
}
