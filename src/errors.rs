use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlcError {
    #[error("didn't specify any {0} for the container")]
    MissingField(&'static str),

    #[error("Invalid container port '{0}': {1}")]
    InvalidPort(String, String),

    #[error("localstack.tf file is not found in a given directory: {0}")]
    ConfigFileNotFound(String),

    #[error("failed to create {profile} container: {cause}")]
    ContainerCreate {
        profile: String,
        #[source]
        cause: Box<TlcError>,
    },

    #[error("failed to get the external port of created container: {0}")]
    PortResolution(#[source] Box<TlcError>),

    #[error("Port {port} is not mapped for container {container}")]
    PortNotMapped { container: String, port: String },

    #[error("Container {0} has already been terminated")]
    ContainerTerminated(String),

    #[error("Container {id} exited before becoming ready. Last logs:\n{logs}")]
    ContainerExited { id: String, logs: String },

    #[error("Container {id} did not satisfy '{condition}' within {timeout_secs}s")]
    ReadinessTimeout {
        id: String,
        condition: String,
        timeout_secs: u64,
    },

    #[error("Docker error: {0}")]
    Docker(String),

    #[error("Terraform error: {0}")]
    Terraform(String),

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("Failed to write {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set permissions on {path}: {source}")]
    Permissions {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TlcError {
    /// True for errors raised before any collaborator was called
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TlcError::MissingField(_) | TlcError::InvalidPort(..) | TlcError::ConfigFileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TlcError>;
