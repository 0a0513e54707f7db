use async_trait::async_trait;
use chatstack::config::Config;
use chatstack::error::{Error, Result};
use chatstack::pipeline::{ModelSource, run_check, run_update};
use std::path::Path;
use tempfile::{TempDir, tempdir};

struct FixtureSource(Vec<String>);

#[async_trait]
impl ModelSource for FixtureSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

struct FailingSource;

#[async_trait]
impl ModelSource for FailingSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        Err(Error::http("connection refused"))
    }
}

fn fixture_source() -> FixtureSource {
    FixtureSource(
        ["---Prov---", "prov/gpt-a", "prov/gpt-c"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

const CHAT_CONFIG: &str = "\
version: 1.2.1
cache: true
endpoints:
  custom:
    - name: OpenRouter
      models:
        default:
          - prov/gpt-a
          - prov/gpt-b
";

fn setup(chat_config: Option<&str>) -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.paths.chat_config = dir.path().join("librechat.yaml");
    config.paths.models_file = dir.path().join("openrouter.txt");
    if let Some(content) = chat_config {
        std::fs::write(&config.paths.chat_config, content).unwrap();
    }
    (dir, config)
}

fn backups_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains(".backup.") || n.ends_with(".check-backup"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn update_merges_and_leaves_artifacts() {
    let (dir, config) = setup(Some(CHAT_CONFIG));
    let report = run_update(&config, &fixture_source()).await.unwrap();

    assert_eq!(report.models_fetched, 2);
    assert_eq!(report.plan.replacements(), 1); // gpt-b resolved to a stand-in
    assert_eq!(report.plan.updates(), 0);

    let updated = std::fs::read_to_string(&config.paths.chat_config).unwrap();
    assert!(updated.contains("prov/gpt-a"));
    assert!(!updated.contains("prov/gpt-b"));
    assert!(updated.contains("cache: true"));

    // success leaves the fetched list and the backup behind
    assert!(config.paths.models_file.is_file());
    assert_eq!(backups_in(dir.path()).len(), 1);
    assert_eq!(
        std::fs::read_to_string(report.backup).unwrap(),
        CHAT_CONFIG
    );
}

#[tokio::test]
async fn update_fails_fast_without_chat_config() {
    let (dir, config) = setup(None);
    let err = run_update(&config, &fixture_source()).await.unwrap_err();

    assert!(matches!(err, Error::Precondition(_)));
    assert!(!config.paths.models_file.exists());
    assert!(backups_in(dir.path()).is_empty());
}

#[tokio::test]
async fn update_rejects_empty_fetch_before_touching_config() {
    let (_dir, config) = setup(Some(CHAT_CONFIG));
    let err = run_update(&config, &FixtureSource(Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OutputContract(_)));
    assert_eq!(
        std::fs::read_to_string(&config.paths.chat_config).unwrap(),
        CHAT_CONFIG
    );
}

#[tokio::test]
async fn update_rolls_back_when_merge_fails() {
    // present but unparseable: passes the precondition, fails at load
    let broken = "- not\n- a mapping\n";
    let (dir, config) = setup(Some(broken));

    let err = run_update(&config, &fixture_source()).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));

    // restored byte-for-byte from the backup taken at the start of the run
    assert_eq!(
        std::fs::read_to_string(&config.paths.chat_config).unwrap(),
        broken
    );
    assert_eq!(backups_in(dir.path()).len(), 1);
}

#[tokio::test]
async fn repeated_updates_accumulate_distinct_backups() {
    let (dir, config) = setup(Some(CHAT_CONFIG));
    for _ in 0..3 {
        run_update(&config, &fixture_source()).await.unwrap();
    }
    // three runs, three uniquely named backups, even within the same second
    assert_eq!(backups_in(dir.path()).len(), 3);
}

#[tokio::test]
async fn check_leaves_directory_byte_identical() {
    let (dir, config) = setup(Some(CHAT_CONFIG));

    let report = run_check(&config, &fixture_source()).await.unwrap();
    assert_eq!(report.plan.replacements(), 1);

    assert_eq!(
        std::fs::read_to_string(&config.paths.chat_config).unwrap(),
        CHAT_CONFIG
    );
    assert!(!config.paths.models_file.exists());
    assert!(backups_in(dir.path()).is_empty());

    // idempotent: a second run sees the same state and the same plan
    let again = run_check(&config, &fixture_source()).await.unwrap();
    assert_eq!(again.plan.replacements(), 1);
    assert_eq!(
        std::fs::read_to_string(&config.paths.chat_config).unwrap(),
        CHAT_CONFIG
    );
}

#[tokio::test]
async fn check_cleans_up_after_fetch_failure() {
    let (dir, config) = setup(Some(CHAT_CONFIG));

    let err = run_check(&config, &FailingSource).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));

    // the epilogue ran despite the failure
    assert_eq!(
        std::fs::read_to_string(&config.paths.chat_config).unwrap(),
        CHAT_CONFIG
    );
    assert!(!config.paths.models_file.exists());
    assert!(backups_in(dir.path()).is_empty());
}

#[tokio::test]
async fn check_cleans_up_after_comparison_failure() {
    let broken = "- not\n- a mapping\n";
    let (dir, config) = setup(Some(broken));

    let err = run_check(&config, &fixture_source()).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));

    assert_eq!(
        std::fs::read_to_string(&config.paths.chat_config).unwrap(),
        broken
    );
    assert!(!config.paths.models_file.exists());
    assert!(backups_in(dir.path()).is_empty());
}
