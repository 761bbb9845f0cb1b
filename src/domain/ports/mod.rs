//! Port trait definitions (Hexagonal Architecture)
//!
//! Interfaces the search core consumes; adapters live under `crate::adapters`:
//! - GeometryGenerator: pure parameters → geometry mapping
//! - CfdSolver: the expensive, possibly failing evaluation
//! - HistoryStore: run-scoped append-only ledger
//! - RunRepository: run metadata and batch summaries
//! - Clock: timestamp source

pub mod cfd_solver;
pub mod clock;
pub mod geometry_generator;
pub mod history_store;
pub mod run_repository;

pub use cfd_solver::{CfdSolver, SolveRequest, SolverError, SolverResponse};
pub use clock::{Clock, SystemClock};
pub use geometry_generator::GeometryGenerator;
pub use history_store::HistoryStore;
pub use run_repository::{RunFilter, RunRepository};
