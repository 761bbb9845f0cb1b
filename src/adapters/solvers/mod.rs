//! `CfdSolver` backends.

pub mod http;
pub mod surrogate;

pub use http::HttpCfdSolver;
pub use surrogate::SurrogateSolver;
