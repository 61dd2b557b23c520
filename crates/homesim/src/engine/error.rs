use super::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Light {0} not found")]
    LightNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
