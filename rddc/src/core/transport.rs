use async_trait::async_trait;
use serde_json::Value;

use super::task::Task;
use crate::error::TransportError;

/// Moves a composed descriptor to the execution layer and brings the result
/// back. Retries, timeouts and cancellation are the implementor's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, task: Task) -> Result<Value, TransportError>;

    /// Number of live workers. Only used as the default slice count of
    /// `parallelize`.
    async fn worker_count(&self) -> Result<usize, TransportError>;
}
