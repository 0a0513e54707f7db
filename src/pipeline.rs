use crate::backup;
use crate::catalog::ModelCatalog;
use crate::chat_config::{ChatConfig, SlotChange, UpdatePlan};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch;
use crate::http::HttpClient;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where the model listing comes from. Production uses the OpenRouter API;
/// tests inject fixtures.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<String>>;
}

pub struct OpenRouterSource {
    http: HttpClient,
    config: crate::config::OpenRouterConfig,
}

impl OpenRouterSource {
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpClient::new(concat!("chatstack/", env!("CARGO_PKG_VERSION")))?;
        Ok(Self {
            http,
            config: config.openrouter.clone(),
        })
    }
}

#[async_trait]
impl ModelSource for OpenRouterSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        fetch::fetch_entries(&self.http, &self.config).await
    }
}

/// Outcome of an update run. The backup and the fetched list stay on disk
/// on success; the backup is the rollback source on failure.
#[derive(Debug)]
pub struct UpdateReport {
    pub backup: PathBuf,
    pub models_fetched: usize,
    pub plan: UpdatePlan,
}

#[derive(Debug)]
pub struct CheckReport {
    pub models_fetched: usize,
    pub plan: UpdatePlan,
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::precondition(format!(
            "{what} not found: {}",
            path.display()
        )))
    }
}

/// Fetch the listing, persist it, and parse it back from disk. Reading the
/// file we just wrote keeps the on-disk contract honest: an empty or
/// unwritable artifact fails here, not later.
async fn fetch_to_file(source: &dyn ModelSource, models_file: &Path) -> Result<ModelCatalog> {
    info!("fetching model listing");
    let entries = source.fetch().await?;
    if entries.is_empty() {
        return Err(Error::output_contract("model fetch produced no entries"));
    }

    fetch::write_models_file(models_file, &entries)?;
    if !models_file.is_file() {
        return Err(Error::output_contract(format!(
            "fetched model list missing: {}",
            models_file.display()
        )));
    }

    let catalog = ModelCatalog::from_file(models_file)?;
    if catalog.is_empty() {
        return Err(Error::output_contract(
            "fetched model list has no categorized models",
        ));
    }
    info!(
        categories = catalog.category_count(),
        models = catalog.model_count(),
        "model listing written"
    );
    Ok(catalog)
}

fn log_plan(plan: &UpdatePlan, dry_run: bool) {
    for change in plan
        .spec_changes
        .iter()
        .chain(plan.endpoint_changes.iter().flat_map(|e| e.changes.iter()))
    {
        match change {
            SlotChange::Keep(model) => info!(%model, "already latest"),
            SlotChange::Update { from, to } => {
                let verb = if dry_run { "would update" } else { "updated" };
                info!(%from, %to, "{verb} to newer version");
            }
            SlotChange::Replace { from, to } => {
                let verb = if dry_run { "would replace" } else { "replaced" };
                info!(%from, %to, "{verb} invalid model");
            }
            SlotChange::Unresolvable(model) => {
                warn!(%model, "no valid replacement available");
            }
        }
    }
}

fn apply_and_save(chat_config_path: &Path, catalog: &ModelCatalog) -> Result<UpdatePlan> {
    let mut chat_config = ChatConfig::load(chat_config_path)?;
    let plan = chat_config.apply(catalog);
    log_plan(&plan, false);
    chat_config.save(chat_config_path)?;
    Ok(plan)
}

/// The update orchestrator: backup, fetch, merge, save; restore the newest
/// backup if the merge step fails. The fetched list and the backup are left
/// on disk on success.
pub async fn run_update(config: &Config, source: &dyn ModelSource) -> Result<UpdateReport> {
    let chat_config_path = &config.paths.chat_config;
    let models_file = &config.paths.models_file;

    require_file(chat_config_path, "chat configuration")?;

    let backup = backup::create(chat_config_path)?;
    info!(backup = %backup.display(), "backup created");

    // Nothing is mutated until apply_and_save, so fetch failures are fatal
    // without any rollback.
    let catalog = fetch_to_file(source, models_file).await?;
    let models_fetched = catalog.model_count();

    match apply_and_save(chat_config_path, &catalog) {
        Ok(plan) => {
            info!(
                updates = plan.updates(),
                replacements = plan.replacements(),
                unresolved = plan.unresolved(),
                "configuration updated"
            );
            Ok(UpdateReport {
                backup,
                models_fetched,
                plan,
            })
        }
        Err(e) => {
            error!(error = %e, "update failed, attempting restore");
            match backup::latest(chat_config_path)? {
                Some(newest) => {
                    backup::restore(&newest, chat_config_path)?;
                    info!(backup = %newest.display(), "configuration restored");
                }
                None => {
                    warn!("automatic restore failed: no matching backup found");
                }
            }
            Err(e)
        }
    }
}

async fn check_steps(
    source: &dyn ModelSource,
    chat_config_path: &Path,
    models_file: &Path,
) -> Result<CheckReport> {
    let catalog = fetch_to_file(source, models_file).await?;
    let chat_config = ChatConfig::load(chat_config_path)?;
    let plan = chat_config.plan(&catalog);
    log_plan(&plan, true);
    Ok(CheckReport {
        models_fetched: catalog.model_count(),
        plan,
    })
}

/// Delete the fetched list, restore the configuration, delete the check
/// backup. The backup is only deleted once the restore succeeded; after a
/// failed restore it is the sole pristine copy.
fn check_cleanup(models_file: &Path, check_backup: &Path, chat_config_path: &Path) {
    if models_file.exists() {
        if let Err(e) = std::fs::remove_file(models_file) {
            warn!(error = %e, "failed to delete fetched model list");
        }
    }
    match backup::restore(check_backup, chat_config_path) {
        Ok(()) => {
            if let Err(e) = std::fs::remove_file(check_backup) {
                warn!(error = %e, "failed to delete check backup");
            }
        }
        Err(e) => {
            warn!(
                error = %e,
                backup = %check_backup.display(),
                "failed to restore configuration, keeping check backup"
            );
        }
    }
}

/// The dry-run orchestrator: same fetch path as an update, but only reports
/// what would change. The cleanup epilogue runs whether the steps succeeded
/// or not, so the working directory always ends byte-identical to how it
/// started: fetched list deleted, configuration restored from the
/// fixed-name backup, backup deleted.
pub async fn run_check(config: &Config, source: &dyn ModelSource) -> Result<CheckReport> {
    let chat_config_path = &config.paths.chat_config;
    let models_file = &config.paths.models_file;

    require_file(chat_config_path, "chat configuration")?;
    let check_backup = backup::create_check(chat_config_path)?;

    let outcome = check_steps(source, chat_config_path, models_file).await;

    // Unconditional epilogue.
    check_cleanup(models_file, &check_backup, chat_config_path);

    if outcome.is_ok() {
        info!("dry run complete, no changes were made");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_file_rejects_missing() {
        let err = require_file(Path::new("/nonexistent/x.yaml"), "chat configuration")
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn check_cleanup_keeps_backup_when_restore_fails() {
        let dir = tempfile::tempdir().unwrap();
        let models_file = dir.path().join("openrouter.txt");
        let check_backup = dir.path().join("librechat.yaml.check-backup");
        std::fs::write(&models_file, "[]").unwrap();
        std::fs::write(&check_backup, "version: 1\n").unwrap();

        // a directory at the target path makes the copy-back fail
        let chat_config = dir.path().join("librechat.yaml");
        std::fs::create_dir(&chat_config).unwrap();

        check_cleanup(&models_file, &check_backup, &chat_config);

        assert!(!models_file.exists());
        assert!(check_backup.is_file(), "sole pristine copy must survive");
    }

    #[test]
    fn check_cleanup_consumes_backup_after_restore() {
        let dir = tempfile::tempdir().unwrap();
        let models_file = dir.path().join("openrouter.txt");
        let check_backup = dir.path().join("librechat.yaml.check-backup");
        let chat_config = dir.path().join("librechat.yaml");
        std::fs::write(&models_file, "[]").unwrap();
        std::fs::write(&check_backup, "version: 1\n").unwrap();
        std::fs::write(&chat_config, "mangled").unwrap();

        check_cleanup(&models_file, &check_backup, &chat_config);

        assert!(!models_file.exists());
        assert!(!check_backup.exists());
        assert_eq!(std::fs::read(&chat_config).unwrap(), b"version: 1\n");
    }
}
