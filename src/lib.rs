pub mod backup;
pub mod catalog;
pub mod chat_config;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod pipeline;
pub mod topology;
