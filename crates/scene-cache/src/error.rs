use thiserror::Error;

/// Failures of a scene build; recorded on the scene rather than returned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A collaborator the build needs (e.g. an embedder) is not configured
    #[error("not available: {0}")]
    NotAvailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("layout failed: {0}")]
    Layout(String),
}
