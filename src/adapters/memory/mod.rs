//! In-process adapters used by `--dry-run` and tests.

pub mod history_store;

pub use history_store::InMemoryHistoryStore;
