use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to resolve application paths: {0}")]
    Paths(#[from] updraft_platform::AppPathsError),
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
    #[error(transparent)]
    Descriptor(#[from] updraft_core::DescriptorError),
    #[error(transparent)]
    Storage(#[from] updraft_store::StorageError),
}
