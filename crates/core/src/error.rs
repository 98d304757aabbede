use std::path::PathBuf;

/// Errors raised while parsing or rendering a catalog template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Template {template:?} has an invalid placeholder {name:?}")]
    InvalidPlaceholder { template: String, name: String },

    #[error("Template {template:?} has unbalanced braces")]
    Unbalanced { template: String },

    #[error("Missing event parameter: {0}")]
    MissingParameter(String),
}

/// Errors raised while loading the notification catalog or looking up a type.
///
/// Every variant is fatal for the caller: a misconfigured catalog must stop
/// the process at start-up, and an unknown key must fail the dispatch before
/// anything is written to the ledger.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid catalog entry {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Duplicate notification key in catalog: {0}")]
    DuplicateKey(String),

    #[error("Unknown notification type: {0}")]
    UnknownNotificationType(String),
}
