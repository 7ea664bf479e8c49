use thiserror::Error;

#[derive(Debug, Error)]
pub enum Gmid22Error {
    /// Malformed sweep or design configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A derived-quantity reduction found no admissible samples at all.
    #[error("no admissible `{quantity}` samples {context}")]
    EmptyTable {
        quantity: &'static str,
        context: String,
    },

    /// The selected operating point cannot support dimension synthesis.
    #[error("invalid operating point: {0}")]
    InvalidOperatingPoint(String),

    #[error("unknown model `{0}`")]
    UnknownModel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Gmid22Error>;
