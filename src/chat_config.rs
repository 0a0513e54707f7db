use crate::catalog::ModelCatalog;
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome for one model slot (a `modelSpecs` preset or one entry of an
/// endpoint's default model list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotChange {
    /// Present in the catalog and already the latest version.
    Keep(String),
    /// A newer version of the same model exists.
    Update { from: String, to: String },
    /// Absent from the catalog, swapped for a valid stand-in.
    Replace { from: String, to: String },
    /// Absent from the catalog with no usable stand-in; left as is.
    Unresolvable(String),
}

impl SlotChange {
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Self::Update { to, .. } | Self::Replace { to, .. } => Some(to),
            Self::Keep(_) | Self::Unresolvable(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct EndpointPlan {
    pub name: String,
    pub changes: Vec<SlotChange>,
}

/// Everything a sync run would change, computed before (or while) touching
/// the document. A dry run stops here; an update applies it.
#[derive(Debug, Default)]
pub struct UpdatePlan {
    pub spec_changes: Vec<SlotChange>,
    pub endpoint_changes: Vec<EndpointPlan>,
}

impl UpdatePlan {
    fn all(&self) -> impl Iterator<Item = &SlotChange> {
        self.spec_changes
            .iter()
            .chain(self.endpoint_changes.iter().flat_map(|e| e.changes.iter()))
    }

    pub fn updates(&self) -> usize {
        self.all()
            .filter(|c| matches!(c, SlotChange::Update { .. }))
            .count()
    }

    pub fn replacements(&self) -> usize {
        self.all()
            .filter(|c| matches!(c, SlotChange::Replace { .. }))
            .count()
    }

    pub fn unresolved(&self) -> usize {
        self.all()
            .filter(|c| matches!(c, SlotChange::Unresolvable(_)))
            .count()
    }

    pub fn is_noop(&self) -> bool {
        self.updates() == 0 && self.replacements() == 0
    }
}

fn resolve(model: &str, catalog: &ModelCatalog) -> SlotChange {
    if !catalog.contains(model) {
        return match catalog.replacement_for(model) {
            Some(to) => SlotChange::Replace {
                from: model.to_string(),
                to,
            },
            None => SlotChange::Unresolvable(model.to_string()),
        };
    }
    match catalog.latest_version(model) {
        Some(latest) if latest != model => SlotChange::Update {
            from: model.to_string(),
            to: latest,
        },
        _ => SlotChange::Keep(model.to_string()),
    }
}

/// The chat application's YAML settings document, held as a raw value so
/// keys this tool does not understand survive a load/apply/save cycle.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    doc: Value,
}

impl ChatConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
            .map_err(|e| Error::parse(format!("{}: {e}", path.display())))
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(content)?;
        if !doc.is_mapping() {
            return Err(Error::parse("chat config root is not a mapping"));
        }
        Ok(Self { doc })
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.doc)?)
    }

    /// Write the document atomically: serialize fully, write a sibling temp
    /// file, rename over the target. A crash mid-write leaves the original
    /// untouched.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = self.to_yaml_string()?;
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, &body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Compute what a sync against `catalog` would change, without mutating.
    pub fn plan(&self, catalog: &ModelCatalog) -> UpdatePlan {
        let mut copy = self.clone();
        copy.apply(catalog)
    }

    /// Resolve every model slot against the catalog and rewrite the ones
    /// that change. Unrelated keys are never touched.
    pub fn apply(&mut self, catalog: &ModelCatalog) -> UpdatePlan {
        UpdatePlan {
            spec_changes: self.apply_model_specs(catalog),
            endpoint_changes: self.apply_endpoints(catalog),
        }
    }

    fn apply_model_specs(&mut self, catalog: &ModelCatalog) -> Vec<SlotChange> {
        let mut changes = Vec::new();
        let Some(list) = self
            .doc
            .get_mut("modelSpecs")
            .and_then(|s| s.get_mut("list"))
            .and_then(Value::as_sequence_mut)
        else {
            return changes;
        };

        for spec in list {
            let Some(model) = spec
                .get("preset")
                .and_then(|p| p.get("model"))
                .and_then(Value::as_str)
            else {
                continue;
            };

            let change = resolve(model, catalog);
            match &change {
                SlotChange::Update { from, to } | SlotChange::Replace { from, to } => {
                    debug!(%from, %to, "rewriting model spec");
                    if let Some(preset) = spec.get_mut("preset") {
                        preset["model"] = Value::from(to.as_str());
                    }
                    // Keep the visible label in step with the preset.
                    if spec.get("modelLabel").is_some() {
                        spec["modelLabel"] = Value::from(to.as_str());
                    }
                }
                SlotChange::Unresolvable(model) => {
                    warn!(%model, "no replacement found, keeping as is");
                }
                SlotChange::Keep(_) => {}
            }
            changes.push(change);
        }

        changes
    }

    fn apply_endpoints(&mut self, catalog: &ModelCatalog) -> Vec<EndpointPlan> {
        let mut plans = Vec::new();
        let Some(endpoints) = self
            .doc
            .get_mut("endpoints")
            .and_then(|e| e.get_mut("custom"))
            .and_then(Value::as_sequence_mut)
        else {
            return plans;
        };

        for endpoint in endpoints {
            let name = endpoint
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();

            let Some(defaults) = endpoint
                .get_mut("models")
                .and_then(|m| m.get_mut("default"))
                .and_then(Value::as_sequence_mut)
            else {
                continue;
            };

            let mut changes = Vec::new();
            for slot in defaults.iter_mut() {
                let Some(model) = slot.as_str() else {
                    continue;
                };
                let change = resolve(model, catalog);
                if let Some(to) = change.resolved() {
                    *slot = Value::from(to);
                }
                changes.push(change);
            }

            plans.push(EndpointPlan { name, changes });
        }

        plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: 1.2.1
cache: true
interface:
  customWelcome: "Welcome!"
modelSpecs:
  list:
    - name: sonnet
      modelLabel: anthropic/claude-3.5-sonnet
      preset:
        endpoint: OpenRouter
        model: anthropic/claude-3.5-sonnet
    - name: current
      preset:
        endpoint: OpenRouter
        model: openai/gpt-4o
endpoints:
  custom:
    - name: OpenRouter
      apiKey: "${OPENROUTER_KEY}"
      models:
        default:
          - openai/gpt-4o
          - x-ai/grok-2
      titleConvo: true
"#;

    fn catalog(entries: &[&str]) -> ModelCatalog {
        let entries: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        ModelCatalog::parse(&entries)
    }

    fn full_catalog() -> ModelCatalog {
        catalog(&[
            "---Anthropic---",
            "anthropic/claude-4-sonnet",
            "---Openai---",
            "openai/gpt-4o",
            "---X-ai---",
            "x-ai/grok-3-beta",
        ])
    }

    #[test]
    fn apply_updates_and_replaces() {
        let mut config = ChatConfig::from_str(SAMPLE).unwrap();
        let plan = config.apply(&full_catalog());

        // claude-3.5-sonnet is absent -> replaced via the static table path
        // (family upgrade is only reachable for ids present in the catalog,
        // absence routes through replacement_for).
        assert_eq!(plan.replacements(), 2); // claude spec + grok endpoint entry
        assert_eq!(plan.updates(), 0);
        assert_eq!(plan.unresolved(), 0);

        let yaml = config.to_yaml_string().unwrap();
        assert!(yaml.contains("x-ai/grok-3-beta"));
        assert!(!yaml.contains("x-ai/grok-2"));
    }

    #[test]
    fn apply_upgrades_to_newer_same_base_version() {
        let yaml = r#"
modelSpecs:
  list:
    - name: beta
      modelLabel: x/model-a:beta
      preset:
        endpoint: OpenRouter
        model: x/model-a:beta
endpoints:
  custom:
    - name: X
      models:
        default: [x/model-a:beta]
"#;
        let mut config = ChatConfig::from_str(yaml).unwrap();
        let cat = catalog(&["---X---", "x/model-a:beta", "x/model-a:exp"]);
        let plan = config.apply(&cat);

        // both slots hold a valid id with a newer same-base version
        assert_eq!(plan.updates(), 2);
        assert_eq!(plan.replacements(), 0);

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&config.to_yaml_string().unwrap()).unwrap();
        assert_eq!(
            doc["modelSpecs"]["list"][0]["preset"]["model"],
            "x/model-a:exp"
        );
        assert_eq!(doc["modelSpecs"]["list"][0]["modelLabel"], "x/model-a:exp");
        assert_eq!(
            doc["endpoints"]["custom"][0]["models"]["default"][0],
            "x/model-a:exp"
        );
    }

    #[test]
    fn model_label_tracks_preset() {
        let mut config = ChatConfig::from_str(SAMPLE).unwrap();
        config.apply(&full_catalog());
        let yaml = config.to_yaml_string().unwrap();
        assert!(!yaml.contains("modelLabel: anthropic/claude-3.5-sonnet"));
    }

    #[test]
    fn unrelated_keys_survive() {
        let mut config = ChatConfig::from_str(SAMPLE).unwrap();
        config.apply(&full_catalog());
        let yaml = config.to_yaml_string().unwrap();
        assert!(yaml.contains("customWelcome: Welcome!"));
        assert!(yaml.contains("cache: true"));
        assert!(yaml.contains("apiKey: ${OPENROUTER_KEY}"));
        assert!(yaml.contains("titleConvo: true"));
    }

    #[test]
    fn plan_does_not_mutate() {
        let config = ChatConfig::from_str(SAMPLE).unwrap();
        let before = config.to_yaml_string().unwrap();
        let plan = config.plan(&full_catalog());
        assert!(!plan.is_noop());
        assert_eq!(config.to_yaml_string().unwrap(), before);
    }

    #[test]
    fn merge_scenario_per_entry_resolution() {
        // models: [gpt-a, gpt-b]; fetched list has gpt-a and gpt-c.
        let yaml = r#"
endpoints:
  custom:
    - name: Test
      models:
        default: [prov/gpt-a, prov/gpt-b]
other: untouched
"#;
        let mut config = ChatConfig::from_str(yaml).unwrap();
        let cat = catalog(&["---Prov---", "prov/gpt-a", "prov/gpt-c"]);
        let plan = config.apply(&cat);

        // gpt-a kept; gpt-b invalid -> same-provider stand-in gpt-a... the
        // fragment match hits the shared "gpt" part first.
        assert_eq!(plan.endpoint_changes.len(), 1);
        let changes = &plan.endpoint_changes[0].changes;
        assert_eq!(changes[0], SlotChange::Keep("prov/gpt-a".into()));
        assert!(matches!(changes[1], SlotChange::Replace { .. }));

        let out = config.to_yaml_string().unwrap();
        assert!(out.contains("other: untouched"));
        assert!(!out.contains("prov/gpt-b"));
    }

    #[test]
    fn missing_sections_yield_empty_plan() {
        let mut config = ChatConfig::from_str("version: 1.0\n").unwrap();
        let plan = config.apply(&full_catalog());
        assert!(plan.spec_changes.is_empty());
        assert!(plan.endpoint_changes.is_empty());
        assert!(plan.is_noop());
    }

    #[test]
    fn non_mapping_root_rejected() {
        assert!(ChatConfig::from_str("- a\n- b\n").is_err());
    }
}
