use crate::assets::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse {url}: {message}")]
    Parse { url: String, message: String },
    #[error("missing texture {file}: {source}")]
    MissingTexture {
        file: String,
        #[source]
        source: FetchError,
    },
    #[error(
        "This model contains no scene, and cannot be viewed here. However, it may contain individual 3D resources."
    )]
    NoRenderableScene,
}

impl LoadError {
    /// Text shown to the user; the full error goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            LoadError::Fetch(_) => {
                "Unable to retrieve this file. Check the log output and network access.".to_string()
            }
            LoadError::Parse { message, .. } => format!(
                "Unable to parse file content. Verify that this file is valid. Error: \"{}\"",
                message
            ),
            LoadError::MissingTexture { file, .. } => format!("Missing texture: {}", file),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
