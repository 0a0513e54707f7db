use crate::config::TopologyConfig;
use crate::error::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// One declared container. Field order matches the rendered YAML.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Service {
    pub image: String,
    pub restart: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Compose {
    pub services: IndexMap<String, Service>,
}

fn env(pairs: &[(&str, String)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Build the full service stack from one parameterized source. The ports,
/// image references, and environment variable names are deployment
/// contracts consumed by the unmodified upstream images; only the knobs in
/// [`TopologyConfig`] vary between deployments.
pub fn build(config: &TopologyConfig) -> Compose {
    let speech_base = format!("http://{}:{}", config.speech_host, config.speech_port);
    let mut services = IndexMap::new();

    services.insert(
        "api".to_string(),
        Service {
            image: "ghcr.io/danny-avila/librechat-dev:latest".into(),
            restart: "always".into(),
            ports: vec![format!("{}:3080", config.api_port)],
            depends_on: strings(&["mongodb", "meilisearch", "rag_api"]),
            environment: env(&[
                ("HOST", "0.0.0.0".into()),
                ("MONGO_URI", "mongodb://mongodb:27017/LibreChat".into()),
                ("MEILI_HOST", "http://meilisearch:7700".into()),
                ("RAG_API_URL", "http://rag_api:8000".into()),
                // Both point at the speech container; host is the
                // deployment knob (compose network name vs localhost).
                ("TTS_API_URL", format!("{speech_base}/v1/audio/speech")),
                ("COMPLETIONS_API_URL", format!("{speech_base}/v1")),
            ]),
            volumes: strings(&[
                "./librechat.yaml:/app/librechat.yaml",
                "./images:/app/client/public/images",
                "./logs:/app/api/logs",
            ]),
            ..Default::default()
        },
    );

    services.insert(
        "client".to_string(),
        Service {
            image: "nginx:1.27-alpine".into(),
            restart: "always".into(),
            ports: vec![
                format!("{}:80", config.client_http_port),
                format!("{}:443", config.client_https_port),
            ],
            depends_on: strings(&["api"]),
            volumes: strings(&["./client.conf:/etc/nginx/conf.d/default.conf"]),
            ..Default::default()
        },
    );

    services.insert(
        "mongodb".to_string(),
        Service {
            image: "mongo:7".into(),
            restart: "always".into(),
            command: Some("mongod --noauth".into()),
            volumes: strings(&["./data-node:/data/db"]),
            ..Default::default()
        },
    );

    services.insert(
        "meilisearch".to_string(),
        Service {
            image: "getmeili/meilisearch:v1.12.3".into(),
            restart: "always".into(),
            environment: env(&[
                ("MEILI_NO_ANALYTICS", "true".into()),
                ("MEILI_MASTER_KEY", "${MEILI_MASTER_KEY}".into()),
            ]),
            volumes: strings(&["./meili_data:/meili_data"]),
            ..Default::default()
        },
    );

    services.insert(
        "vectordb".to_string(),
        Service {
            image: "ankane/pgvector:latest".into(),
            restart: "always".into(),
            environment: env(&[
                ("POSTGRES_DB", "mydatabase".into()),
                ("POSTGRES_USER", "myuser".into()),
                ("POSTGRES_PASSWORD", "mypassword".into()),
            ]),
            volumes: strings(&["./pgdata:/var/lib/postgresql/data"]),
            ..Default::default()
        },
    );

    services.insert(
        "rag_api".to_string(),
        Service {
            image: config.rag_image.image_ref().into(),
            restart: "always".into(),
            depends_on: strings(&["vectordb"]),
            environment: env(&[
                ("DB_HOST", "vectordb".into()),
                ("RAG_PORT", "8000".into()),
            ]),
            ..Default::default()
        },
    );

    services.insert(
        "speech".to_string(),
        Service {
            image: "ghcr.io/matatonic/openedai-speech:latest".into(),
            restart: "always".into(),
            ports: vec![format!("{}:8000", config.speech_port)],
            environment: env(&[
                ("TTS_HOME", "voices".into()),
                ("PRELOAD_MODEL", "xtts".into()),
                ("USE_GPU", "false".into()),
            ]),
            volumes: strings(&["./voices:/app/voices", "./speech-config:/app/config"]),
            ..Default::default()
        },
    );

    Compose { services }
}

pub fn render(config: &TopologyConfig) -> Result<String> {
    Ok(serde_yaml::to_string(&build(config))?)
}

pub fn write(config: &TopologyConfig, path: &Path) -> Result<()> {
    std::fs::write(path, render(config)?)?;
    Ok(())
}
