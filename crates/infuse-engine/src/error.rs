use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} not found; install Docker with the buildx plugin")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} command failed: {args:?}\n{stderr}")]
    CommandFailed {
        program: String,
        args: Vec<String>,
        stderr: String,
    },

    #[error("{program} output was not valid UTF-8")]
    InvalidUtf8 {
        program: String,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to {program} stdin")]
    StdinWrite {
        program: String,
        source: std::io::Error,
    },
}

/// Failure of the external build engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("image build failed")]
    Build { source: ExecError },

    #[error("failed to log in to registry {address}")]
    Login { address: String, source: ExecError },

    #[error("registry {address}: environment variable {variable} is not set")]
    MissingCredential { address: String, variable: String },

    #[error("failed to prepare the build metadata file")]
    MetadataFile { source: std::io::Error },

    #[error("failed to read build metadata at {path}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid build metadata at {path}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("build metadata at {path} has no image digest")]
    MissingDigest { path: PathBuf },
}
