#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures of the drawing surface. Reported once; never retried per frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot open window: {0}")]
    Surface(#[source] minifb::Error),
    #[error("cannot present frame: {0}")]
    Present(#[source] minifb::Error),
    #[error("cannot write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
    #[error("frame buffer has {got} pixels, expected {expected}")]
    BufferSize { expected: usize, got: usize },
}
