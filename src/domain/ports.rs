use crate::domain::model::Payload;
use crate::utils::error::{Result, StoreError};
use async_trait::async_trait;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The object-store capabilities the importer consumes.
pub trait ObjectStore: Send + Sync {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl std::future::Future<Output = StoreResult<Vec<u8>>> + Send;

    /// Copies `src_bucket/key` to `dest_bucket/key`.
    fn copy_object(
        &self,
        src_bucket: &str,
        key: &str,
        dest_bucket: &str,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// Deleting an absent object is not an error.
    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    fn object_exists(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> impl std::future::Future<Output = StoreResult<Vec<String>>> + Send;
}

/// The downstream API collaborator that receives each file's payload.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, payload: &Payload) -> Result<()>;
}
