use serde::{Deserialize, Serialize};

use super::constraint::Constraint;
use super::convergence::{ConvergenceCriteria, EvaluationBudget};
use super::design::ParameterSpace;
use crate::domain::errors::{DomainError, DomainResult};

/// Main configuration structure for foilopt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Search definition for new runs
    #[serde(default)]
    pub search: RunConfig,

    /// CFD evaluator configuration
    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Everything that defines one optimization run. Snapshotted into the run
/// record at start so a resumed run keeps its original settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    #[serde(default)]
    pub parameter_space: ParameterSpace,

    #[serde(default = "default_constraints")]
    pub constraints: Vec<Constraint>,

    /// Candidates generated and evaluated together per loop iteration
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum evaluations, failures included
    #[serde(default = "default_budget")]
    pub budget: usize,

    #[serde(default)]
    pub convergence: ConvergenceCriteria,

    #[serde(default)]
    pub exploration: ExplorationConfig,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Upper bound on concurrent solver dispatches
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_reynolds")]
    pub reynolds: f64,

    /// Per-attempt evaluation timeout in milliseconds
    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,
}

fn default_constraints() -> Vec<Constraint> {
    vec![Constraint::min_lift(0.30)]
}

/// Largest batch a run or a single proposal may ask for.
pub const MAX_BATCH_SIZE: usize = 1024;

const fn default_batch_size() -> usize {
    4
}

const fn default_budget() -> usize {
    40
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_in_flight() -> usize {
    4
}

const fn default_reynolds() -> f64 {
    500_000.0
}

const fn default_evaluation_timeout_ms() -> u64 {
    120_000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parameter_space: ParameterSpace::default(),
            constraints: default_constraints(),
            batch_size: default_batch_size(),
            budget: default_budget(),
            convergence: ConvergenceCriteria::default(),
            exploration: ExplorationConfig::default(),
            seed: default_seed(),
            max_in_flight: default_max_in_flight(),
            reynolds: default_reynolds(),
            evaluation_timeout_ms: default_evaluation_timeout_ms(),
        }
    }
}

impl RunConfig {
    pub const fn budget(&self) -> EvaluationBudget {
        EvaluationBudget::new(self.budget)
    }

    /// Fail fast on anything that would make the run meaningless.
    pub fn validate(&self) -> DomainResult<()> {
        self.parameter_space.validate()?;
        for constraint in &self.constraints {
            constraint.validate()?;
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(DomainError::InvalidConfiguration(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.budget == 0 {
            return Err(DomainError::InvalidConfiguration(
                "budget must be at least 1".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(DomainError::InvalidConfiguration(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if !self.reynolds.is_finite() || self.reynolds <= 0.0 {
            return Err(DomainError::InvalidConfiguration(format!(
                "reynolds must be positive, got {}",
                self.reynolds
            )));
        }
        if self.evaluation_timeout_ms == 0 {
            return Err(DomainError::InvalidConfiguration(
                "evaluation_timeout_ms must be positive".to_string(),
            ));
        }
        self.convergence.validate()?;
        self.exploration.validate()
    }
}

/// Explore/exploit policy knobs for the candidate generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExplorationConfig {
    /// Ceiling on the share of a batch spent near the anchor
    #[serde(default = "default_max_exploit_fraction")]
    pub max_exploit_fraction: f64,

    /// History length at which the exploit weight reaches ~63% of its ceiling
    #[serde(default = "default_exploit_ramp")]
    pub exploit_ramp: f64,

    /// Candidates per batch always reserved for exploration
    #[serde(default = "default_min_explore")]
    pub min_explore: usize,

    /// Neighborhood radius in normalized units for the first batch
    #[serde(default = "default_initial_radius")]
    pub initial_radius: f64,

    #[serde(default = "default_min_radius")]
    pub min_radius: f64,

    /// Per-batch radius multiplier
    #[serde(default = "default_shrink")]
    pub shrink: f64,

    /// Pool size multiplier for maximin exploration
    #[serde(default = "default_oversample")]
    pub oversample: usize,

    /// Decimal places candidate values are rounded to
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Attempts to find an unseen point before accepting a duplicate
    #[serde(default = "default_max_resample")]
    pub max_resample: usize,
}

const fn default_max_exploit_fraction() -> f64 {
    0.75
}

const fn default_exploit_ramp() -> f64 {
    16.0
}

const fn default_min_explore() -> usize {
    1
}

const fn default_initial_radius() -> f64 {
    0.15
}

const fn default_min_radius() -> f64 {
    0.02
}

const fn default_shrink() -> f64 {
    0.85
}

const fn default_oversample() -> usize {
    8
}

const fn default_decimals() -> u32 {
    4
}

const fn default_max_resample() -> usize {
    32
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            max_exploit_fraction: default_max_exploit_fraction(),
            exploit_ramp: default_exploit_ramp(),
            min_explore: default_min_explore(),
            initial_radius: default_initial_radius(),
            min_radius: default_min_radius(),
            shrink: default_shrink(),
            oversample: default_oversample(),
            decimals: default_decimals(),
            max_resample: default_max_resample(),
        }
    }
}

impl ExplorationConfig {
    pub fn validate(&self) -> DomainResult<()> {
        let invalid = |msg: String| -> DomainResult<()> { Err(DomainError::InvalidConfiguration(msg)) };
        if !(0.0..=1.0).contains(&self.max_exploit_fraction) {
            return invalid(format!(
                "max_exploit_fraction must be in [0, 1], got {}",
                self.max_exploit_fraction
            ));
        }
        if !self.exploit_ramp.is_finite() || self.exploit_ramp <= 0.0 {
            return invalid(format!(
                "exploit_ramp must be positive, got {}",
                self.exploit_ramp
            ));
        }
        if !(self.min_radius > 0.0 && self.min_radius <= self.initial_radius) {
            return invalid(format!(
                "radii must satisfy 0 < min_radius ({}) <= initial_radius ({})",
                self.min_radius, self.initial_radius
            ));
        }
        if self.initial_radius > 1.0 {
            return invalid(format!(
                "initial_radius is in normalized units and must be <= 1, got {}",
                self.initial_radius
            ));
        }
        if !(self.shrink > 0.0 && self.shrink <= 1.0) {
            return invalid(format!("shrink must be in (0, 1], got {}", self.shrink));
        }
        if self.oversample == 0 || self.oversample > 64 {
            return invalid(format!("oversample must be between 1 and 64, got {}", self.oversample));
        }
        if self.decimals > 12 {
            return invalid(format!("decimals must be <= 12, got {}", self.decimals));
        }
        Ok(())
    }
}

/// Which solver backs the evaluator gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    Surrogate,
    Http,
}

/// CFD evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluatorConfig {
    #[serde(default = "default_backend")]
    pub backend: SolverBackend,

    /// Base URL of the remote solver service (http backend only)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Outbound request rate limit for the http backend
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Relative noise applied by the surrogate solver
    #[serde(default = "default_surrogate_noise")]
    pub surrogate_noise: f64,

    /// Retry policy for transient evaluation failures
    #[serde(default)]
    pub retry: RetryConfig,
}

const fn default_backend() -> SolverBackend {
    SolverBackend::Surrogate
}

const fn default_requests_per_second() -> u32 {
    10
}

const fn default_surrogate_noise() -> f64 {
    0.005
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: None,
            requests_per_second: default_requests_per_second(),
            surrogate_noise: default_surrogate_noise(),
            retry: RetryConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Retry policy for history appends while the store is unavailable
    #[serde(default = "default_append_retry")]
    pub append_retry: RetryConfig,
}

fn default_database_path() -> String {
    ".foilopt/foilopt.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_append_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 5,
        initial_backoff_ms: 100,
        max_backoff_ms: 5_000,
        jitter: 0.2,
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            append_retry: default_append_retry(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Randomization factor applied to each delay, in [0, 1)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

const fn default_jitter() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}
