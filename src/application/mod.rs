pub mod optimization_loop;

pub use optimization_loop::{LoopEvent, OptimizationLoop, ShutdownHandle};
