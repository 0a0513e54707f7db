use crate::config::OpenRouterConfig;
use crate::error::Result;
use crate::http::HttpClient;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<RemoteModel>,
}

#[derive(Deserialize)]
struct RemoteModel {
    #[serde(default)]
    id: String,
}

/// Query the models-listing API and return the fetched-list entries:
/// model ids sorted and grouped under `---<Category>---` separators.
pub async fn fetch_entries(http: &HttpClient, config: &OpenRouterConfig) -> Result<Vec<String>> {
    let token = std::env::var(&config.api_key_env).ok();
    let resp: ModelsResponse = http.get_json(&config.api_url, token.as_deref()).await?;

    let ids: Vec<String> = resp.data.into_iter().map(|m| m.id).collect();
    let ids = filter_ids(ids, config);
    info!(model_count = ids.len(), "fetched model listing");

    Ok(group_entries(ids))
}

fn filter_ids(ids: Vec<String>, config: &OpenRouterConfig) -> Vec<String> {
    ids.into_iter()
        .filter(|id| !id.is_empty())
        .filter(|id| config.include_free || !id.ends_with(":free"))
        .filter(|id| {
            config.providers.is_empty()
                || config
                    .providers
                    .iter()
                    .any(|p| id.split('/').next() == Some(p.as_str()))
        })
        .collect()
}

/// Sort ids and insert a `---<Category>---` header whenever the provider
/// prefix changes. This is the on-disk shape the updater parses back.
pub fn group_entries(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();

    let mut entries = Vec::with_capacity(ids.len());
    let mut current: Option<String> = None;

    for id in ids {
        let provider = id.split('/').next().unwrap_or(&id).to_string();
        if current.as_deref() != Some(&provider) {
            entries.push(format!("---{}---", category_label(&provider)));
            current = Some(provider);
        }
        entries.push(id);
    }

    entries
}

fn category_label(provider: &str) -> String {
    let mut chars = provider.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Write the Fetched Model List File: a pretty-printed JSON array of
/// strings, trailing newline included.
pub fn write_models_file(path: &Path, entries: &[String]) -> Result<()> {
    let mut body = serde_json::to_string_pretty(entries)
        .map_err(|e| crate::error::Error::parse(format!("model list encode: {e}")))?;
    body.push('\n');
    std::fs::write(path, body)?;
    Ok(())
}
