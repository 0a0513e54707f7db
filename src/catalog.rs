use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::path::Path;

/// Family-upgrade candidates for major version jumps, tried in order. Used
/// when no same-base newer version exists in the catalog.
const FAMILY_UPGRADES: &[(&str, &[&str])] = &[
    (
        "anthropic/claude-3.7-sonnet",
        &["anthropic/claude-4-sonnet", "anthropic/claude-4"],
    ),
    (
        "anthropic/claude-3.7-sonnet:thinking",
        &[
            "anthropic/claude-4-sonnet:thinking",
            "anthropic/claude-4:thinking",
        ],
    ),
    (
        "anthropic/claude-3.5-sonnet",
        &["anthropic/claude-4-sonnet", "anthropic/claude-4"],
    ),
    (
        "anthropic/claude-3.5-sonnet:thinking",
        &[
            "anthropic/claude-4-sonnet:thinking",
            "anthropic/claude-4:thinking",
        ],
    ),
    (
        "anthropic/claude-3-opus",
        &["anthropic/claude-4-opus", "anthropic/claude-4"],
    ),
    (
        "anthropic/claude-3-opus:thinking",
        &[
            "anthropic/claude-4-opus:thinking",
            "anthropic/claude-4:thinking",
        ],
    ),
    (
        "anthropic/claude-3-haiku",
        &["anthropic/claude-4-haiku", "anthropic/claude-4"],
    ),
    (
        "anthropic/claude-3-haiku:thinking",
        &[
            "anthropic/claude-4-haiku:thinking",
            "anthropic/claude-4:thinking",
        ],
    ),
    ("openai/gpt-4", &["openai/gpt-4o", "openai/gpt-4o-latest"]),
    (
        "openai/gpt-4-turbo",
        &["openai/gpt-4o", "openai/gpt-4o-latest"],
    ),
    (
        "openai/gpt-4-turbo-preview",
        &["openai/gpt-4o", "openai/gpt-4o-latest"],
    ),
    (
        "openai/gpt-4-1106-preview",
        &["openai/gpt-4o", "openai/gpt-4o-latest"],
    ),
    (
        "openai/gpt-4-0125-preview",
        &["openai/gpt-4o", "openai/gpt-4o-latest"],
    ),
    (
        "openai/gpt-4-0613",
        &["openai/gpt-4o", "openai/gpt-4o-latest"],
    ),
    (
        "openai/gpt-4-0314",
        &["openai/gpt-4o", "openai/gpt-4o-latest"],
    ),
    (
        "openai/gpt-3.5-turbo",
        &["openai/gpt-4o-mini", "openai/o4-mini"],
    ),
    (
        "openai/gpt-3.5-turbo-16k",
        &["openai/gpt-4o-mini", "openai/o4-mini"],
    ),
    (
        "google/gemini-2.0",
        &["google/gemini-2.5-pro", "google/gemini-2.5-pro-exp-03-25"],
    ),
    (
        "google/gemini-1.5",
        &["google/gemini-2.5-pro", "google/gemini-2.5-pro-exp-03-25"],
    ),
    (
        "google/gemini-1.0",
        &["google/gemini-2.5-pro", "google/gemini-2.5-pro-exp-03-25"],
    ),
    (
        "deepseek/deepseek-chat-v2",
        &[
            "deepseek/deepseek-chat-v3",
            "deepseek/deepseek-chat-v3-0324",
        ],
    ),
    (
        "deepseek/deepseek-chat-v1",
        &[
            "deepseek/deepseek-chat-v3",
            "deepseek/deepseek-chat-v3-0324",
        ],
    ),
    ("x-ai/grok-2", &["x-ai/grok-3", "x-ai/grok-3-beta"]),
    ("x-ai/grok-1", &["x-ai/grok-3", "x-ai/grok-3-beta"]),
    (
        "mistralai/mistral-7b",
        &["mistralai/mistral-8x7b", "mistralai/mistral-large"],
    ),
    (
        "mistralai/mistral-medium",
        &["mistralai/mistral-large", "mistralai/mistral-large-latest"],
    ),
    (
        "meta-llama/llama-2",
        &["meta-llama/llama-3", "meta-llama/llama-3.1"],
    ),
    (
        "meta-llama/llama-2-70b",
        &["meta-llama/llama-3.1-70b", "meta-llama/llama-3.1-405b"],
    ),
    (
        "meta-llama/llama-2-13b",
        &["meta-llama/llama-3.1-8b", "meta-llama/llama-3.1-70b"],
    ),
    (
        "meta-llama/llama-2-7b",
        &["meta-llama/llama-3.1-8b", "meta-llama/llama-3.1-70b"],
    ),
];

/// Direct replacements for ids that no longer exist upstream.
const REPLACEMENTS: &[(&str, &str)] = &[
    (
        "google/gemini-2.5-flash-preview",
        "google/gemini-2.5-pro-exp-03-25",
    ),
    (
        "google/gemini-2.5-flash-preview:thinking",
        "google/gemini-2.5-pro-exp-03-25",
    ),
    (
        "google/gemini-2.5-pro-preview-03-25",
        "google/gemini-2.5-pro-exp-03-25",
    ),
    (
        "google/gemini-2.5-pro-preview",
        "google/gemini-2.5-pro-exp-03-25",
    ),
    ("google/gemini-2.0-flash", "google/gemini-2.5-pro-exp-03-25"),
    ("google/gemini-2.0-pro", "google/gemini-2.5-pro-exp-03-25"),
    ("google/gemini-1.5-pro", "google/gemini-2.5-pro-exp-03-25"),
    ("google/gemini-1.5-flash", "google/gemini-2.5-pro-exp-03-25"),
    ("openai/gpt-4-turbo", "openai/gpt-4o-latest"),
    ("openai/gpt-4-turbo-preview", "openai/gpt-4o-latest"),
    ("openai/gpt-4-1106-preview", "openai/gpt-4o-latest"),
    ("openai/gpt-4-0125-preview", "openai/gpt-4o-latest"),
    ("openai/gpt-4-0613", "openai/gpt-4o-latest"),
    ("openai/gpt-4-0314", "openai/gpt-4o-latest"),
    ("openai/gpt-3.5-turbo", "openai/o4-mini"),
    ("openai/gpt-3.5-turbo-16k", "openai/o4-mini"),
    ("anthropic/claude-3.5-sonnet", "anthropic/claude-3.7-sonnet"),
    (
        "anthropic/claude-3.5-sonnet:thinking",
        "anthropic/claude-3.7-sonnet:thinking",
    ),
    ("anthropic/claude-3-opus", "anthropic/claude-3.7-sonnet"),
    (
        "anthropic/claude-3-opus:thinking",
        "anthropic/claude-3.7-sonnet:thinking",
    ),
    ("anthropic/claude-3-haiku", "anthropic/claude-3.7-sonnet"),
    (
        "anthropic/claude-3-haiku:thinking",
        "anthropic/claude-3.7-sonnet:thinking",
    ),
    ("deepseek/deepseek-chat-v2", "deepseek/deepseek-chat-v3-0324"),
    ("deepseek/deepseek-chat-v1", "deepseek/deepseek-chat-v3-0324"),
    ("x-ai/grok-2", "x-ai/grok-3-beta"),
    ("x-ai/grok-1", "x-ai/grok-3-beta"),
    ("mistralai/mistral-7b", "mistralai/mistral-large"),
    ("mistralai/mistral-medium", "mistralai/mistral-large"),
    ("meta-llama/llama-2", "meta-llama/llama-3.1-8b"),
    ("meta-llama/llama-2-70b", "meta-llama/llama-3.1-70b"),
    ("meta-llama/llama-2-13b", "meta-llama/llama-3.1-8b"),
    ("meta-llama/llama-2-7b", "meta-llama/llama-3.1-8b"),
];

/// The fetched model list, grouped by category. The on-disk form is a JSON
/// array of strings where `---<Category>---` entries open a group and every
/// following plain entry belongs to it.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    categories: IndexMap<String, Vec<String>>,
}

fn base_id(model: &str) -> &str {
    model.split(':').next().unwrap_or(model)
}

fn is_free(model: &str) -> bool {
    model.ends_with(":free")
}

impl ModelCatalog {
    pub fn parse(entries: &[String]) -> Self {
        let mut categories: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut current: Option<String> = None;

        for entry in entries {
            if entry.starts_with("---") && entry.ends_with("---") && entry.len() > 6 {
                current = Some(entry.trim_matches('-').to_string());
            } else if let Some(category) = &current {
                categories
                    .entry(category.clone())
                    .or_default()
                    .push(entry.clone());
            }
        }

        Self { categories }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<String> = serde_json::from_str(&content)
            .map_err(|e| Error::parse(format!("model list {}: {e}", path.display())))?;
        Ok(Self::parse(&entries))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn model_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    fn all_models(&self) -> impl Iterator<Item = &str> {
        self.categories.values().flatten().map(String::as_str)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.all_models().any(|m| m == model)
    }

    /// Latest available version sharing the base id (text before `:`),
    /// ignoring `:free` variants; falls back to the family-upgrade table.
    /// May return the input itself when it is already the latest.
    pub fn latest_version(&self, current: &str) -> Option<String> {
        let base = base_id(current);
        let mut latest: Option<&str> = None;

        for model in self.all_models() {
            if is_free(model) || base_id(model) != base {
                continue;
            }
            if latest.is_none_or(|l| model > l) {
                latest = Some(model);
            }
        }

        latest
            .map(str::to_string)
            .or_else(|| self.family_upgrade(current))
    }

    fn family_upgrade(&self, current: &str) -> Option<String> {
        let (_, candidates) = FAMILY_UPGRADES.iter().find(|(from, _)| *from == current)?;
        candidates
            .iter()
            .find(|c| self.all_models().any(|m| !is_free(m) && m == **c))
            .map(|c| c.to_string())
    }

    /// A valid stand-in for an id that is absent from the catalog: the
    /// static replacement table first, then a same-provider model sharing a
    /// name fragment, then any non-free model from the same provider.
    pub fn replacement_for(&self, invalid: &str) -> Option<String> {
        if let Some(&(_, replacement)) = REPLACEMENTS.iter().find(|(from, _)| *from == invalid) {
            if self.contains(replacement) {
                return Some(replacement.to_string());
            }
        }

        let provider = invalid.split('/').next().unwrap_or(invalid);
        let prefix = format!("{provider}/");

        if let Some(name) = invalid.strip_prefix(&prefix) {
            let fragments: Vec<&str> = name.split('-').take(2).collect();
            for model in self.all_models() {
                if is_free(model) || !model.starts_with(&prefix) {
                    continue;
                }
                if fragments.iter().any(|f| model.contains(f)) {
                    return Some(model.to_string());
                }
            }
        }

        self.all_models()
            .find(|m| !is_free(m) && m.starts_with(&prefix))
            .map(str::to_string)
    }
}
