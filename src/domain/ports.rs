use crate::domain::model::Batch;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Anything that can hand the merge step a fresh batch of records:
/// the BGA REST client, a browser export, a fixture in tests.
#[async_trait]
pub trait BatchProducer: Send + Sync {
    async fn produce(&self) -> Result<Batch>;
}
