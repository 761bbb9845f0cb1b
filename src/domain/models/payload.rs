//! Tagged request/response schema for driving single operations from an
//! external orchestrator (one JSON object in, one JSON object out).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::design::{DesignParameters, ParameterSpace};
use super::geometry::GeometryDescriptor;
use super::outcome::EvaluationOutcome;
use crate::domain::errors::DomainResult;

/// Untrusted parameter values as they arrive on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterInput {
    pub thickness: f64,
    pub max_camber: f64,
    pub camber_position: f64,
    pub angle_of_attack: f64,
}

impl ParameterInput {
    /// Boundary validation: out-of-range values are rejected, not clamped.
    pub fn into_parameters(self, space: &ParameterSpace) -> DomainResult<DesignParameters> {
        DesignParameters::new(
            space,
            [
                self.thickness,
                self.max_camber,
                self.camber_position,
                self.angle_of_attack,
            ],
        )
    }
}

impl From<DesignParameters> for ParameterInput {
    fn from(params: DesignParameters) -> Self {
        Self {
            thickness: params.thickness(),
            max_camber: params.max_camber(),
            camber_position: params.camber_position(),
            angle_of_attack: params.angle_of_attack(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ToolRequest {
    Generate {
        parameters: ParameterInput,
    },
    Evaluate {
        parameters: ParameterInput,
        #[serde(default)]
        reynolds: Option<f64>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    ProposeNext {
        /// Propose from this run's history; an empty history when absent.
        #[serde(default)]
        run_id: Option<Uuid>,
        batch_size: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl ToolRequest {
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Evaluate { .. } => "evaluate",
            Self::ProposeNext { .. } => "propose_next",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ToolResponse {
    Generate {
        geometry: GeometryDescriptor,
    },
    Evaluate {
        geometry_id: String,
        outcome: EvaluationOutcome,
        feasible: bool,
    },
    ProposeNext {
        candidates: Vec<ParameterInput>,
        explore_count: usize,
        exploit_count: usize,
        trust_radius: Option<f64>,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl ToolResponse {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
