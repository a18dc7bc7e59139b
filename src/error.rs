use thiserror::Error;


/// Failure of one asynchronous asset load
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("failed to fetch {path}: {message}")]
    Fetch { path: String, message: String },

    #[error("{path} is not a glTF asset: {reason}")]
    Format { path: String, reason: String },

    #[error("{path} requires {extension}, which the decoder under {decoder_path} cannot read from this container")]
    UnsupportedCompression {
        path: String,
        extension: String,
        decoder_path: String,
    },

    #[error("failed to decompress {path} with the Draco decoder under {decoder_path}: {message}")]
    Draco {
        path: String,
        decoder_path: String,
        message: String,
    },

    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("invalid font {url}: {message}")]
    Font { url: String, message: String },
}


#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid scene configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid scene configuration: {0}")]
    Invalid(String),
}


/// Failures that stop the viewer before the first frame
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not create the window: {0}")]
    Window(String),
}
