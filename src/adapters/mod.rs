//! Adapters for storage, geometry, and solver backends.

pub mod geometry;
pub mod memory;
pub mod solvers;
pub mod sqlite;
