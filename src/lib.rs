//! foilopt - constrained airfoil shape optimization
//!
//! Searches NACA 4-series design parameters for minimum drag subject to
//! constraints, evaluating batches of candidates against a CFD solver and
//! recording every outcome in an append-only history.
//!
//! # Architecture
//!
//! Hexagonal layout:
//!
//! - **Domain Layer** (`domain`): models, errors, and port traits
//! - **Service Layer** (`services`): evaluator gateway, candidate generator,
//!   convergence monitor, retry policy, reports
//! - **Application Layer** (`application`): the optimization loop
//! - **Adapters** (`adapters`): SQLite and in-memory stores, solvers, geometry
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use foilopt::adapters::{geometry::NacaGeometryGenerator, memory::InMemoryHistoryStore};
//! use foilopt::adapters::solvers::SurrogateSolver;
//! use foilopt::application::OptimizationLoop;
//! use foilopt::domain::models::RunConfig;
//! use foilopt::services::{EvaluatorGateway, RetryPolicy};
//!
//! let config = RunConfig::default();
//! let gateway = EvaluatorGateway::new(Arc::new(SurrogateSolver::new(42, 0.0)), RetryPolicy::default(), config.reynolds);
//! let store = Arc::new(InMemoryHistoryStore::new(uuid::Uuid::new_v4()));
//! let optimizer = OptimizationLoop::new(config, Arc::new(NacaGeometryGenerator::default()), Arc::new(gateway), store)?;
//! let outcome = optimizer.run().await?;
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::{LoopEvent, OptimizationLoop, ShutdownHandle};
pub use domain::errors::{DomainError, DomainResult, FailureKind};
pub use domain::models::{
    Config, Constraint, DesignParameters, EvaluationOutcome, HistoryRecord, HistorySnapshot,
    LoopState, ParameterSpace, RunConfig,
};
pub use domain::ports::{CfdSolver, GeometryGenerator, HistoryStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CandidateGenerator, ConvergenceMonitor, EvaluatorGateway};
