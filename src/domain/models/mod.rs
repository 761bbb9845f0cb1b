pub mod config;
pub mod constraint;
pub mod convergence;
pub mod design;
pub mod geometry;
pub mod history;
pub mod outcome;
pub mod payload;
pub mod run;

pub use config::{
    Config, DatabaseConfig, EvaluatorConfig, ExplorationConfig, LoggingConfig, RetryConfig,
    RunConfig, SolverBackend, MAX_BATCH_SIZE,
};
pub use constraint::{is_feasible, total_violation, Comparison, Constraint, OutcomeField};
pub use convergence::{
    ConvergenceCriteria, EvaluationBudget, ImprovementMeasure, StopDecision, StopReason,
};
pub use design::{DesignParameters, Parameter, ParameterBound, ParameterSpace, PARAMETER_COUNT};
pub use geometry::GeometryDescriptor;
pub use history::{BatchProgress, HistoryRecord, HistorySnapshot, SearchState};
pub use outcome::{AeroCoefficients, EvaluationOutcome, FailureReason};
pub use payload::{ParameterInput, ToolRequest, ToolResponse};
pub use run::{
    session_label, IterationSummary, LoopState, OptimizationRun, RunOutcome, RunStatus,
};
