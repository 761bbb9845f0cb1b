pub mod candidate_generator;
pub mod convergence_monitor;
pub mod evaluator_gateway;
pub mod report;
pub mod retry;
pub mod tool_dispatcher;

pub use candidate_generator::{BatchPlan, CandidateGenerator};
pub use convergence_monitor::ConvergenceMonitor;
pub use evaluator_gateway::EvaluatorGateway;
pub use report::{BestDesign, RunReport};
pub use retry::{RetryOutcome, RetryPolicy};
pub use tool_dispatcher::ToolDispatcher;
