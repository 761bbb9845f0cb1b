//! Layered configuration loading from project files and environment.

use std::fs;

use foilopt::domain::models::SolverBackend;
use foilopt::infrastructure::config::ConfigLoader;

fn project_with(config_yaml: &str, local_yaml: Option<&str>) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join(".foilopt");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.yaml"), config_yaml).unwrap();
    if let Some(local) = local_yaml {
        fs::write(config_dir.join("local.yaml"), local).unwrap();
    }
    dir
}

#[test]
fn test_project_file_overrides_defaults() {
    let dir = project_with(
        "search:\n  budget: 80\n  batch_size: 8\n  constraints:\n    - name: lift\n      field: lift\n      comparison: at_least\n      bound: 0.4\n",
        None,
    );
    temp_env::with_vars_unset(["FOILOPT_SEARCH__BUDGET", "FOILOPT_SEARCH__SEED"], || {
        let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.search.budget, 80);
        assert_eq!(config.search.batch_size, 8);
        assert_eq!(config.search.constraints.len(), 1);
        assert_eq!(config.search.constraints[0].bound, 0.4);
        assert_eq!(config.evaluator.backend, SolverBackend::Surrogate);
    });
}

#[test]
fn test_local_file_and_env_layering() {
    let dir = project_with("search:\n  budget: 80\n", Some("search:\n  budget: 60\n  seed: 5\n"));
    temp_env::with_vars([("FOILOPT_SEARCH__SEED", Some("11"))], || {
        let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.search.budget, 60);
        assert_eq!(config.search.seed, 11);
    });
}

#[test]
fn test_invalid_search_is_rejected() {
    let dir = project_with("search:\n  batch_size: 0\n", None);
    temp_env::with_vars_unset(["FOILOPT_SEARCH__BATCH_SIZE"], || {
        assert!(ConfigLoader::load_from_dir(dir.path()).is_err());
    });
}

#[test]
fn test_http_backend_requires_endpoint() {
    let dir = project_with("evaluator:\n  backend: http\n", None);
    temp_env::with_vars_unset(["FOILOPT_EVALUATOR__ENDPOINT"], || {
        let err = ConfigLoader::load_from_dir(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("endpoint"));
    });
}
