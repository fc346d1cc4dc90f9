use async_trait::async_trait;

use super::failure::Failure;
use crate::resource::ResourceId;

/// One acquisition method for a payload of type `P`.
///
/// Expected failure modes (missing content, network errors, unparseable data)
/// are returned as [`Failure`] values. A panic is treated as a defect and is
/// not caught by the [`Fetcher`](super::Fetcher). Implementations enforce
/// their own deadline and report `TransientNetwork` when it expires.
///
/// The trait is object-safe and Send + Sync so a fetcher can be shared
/// across async tasks.
#[async_trait]
pub trait Strategy<P>: Send + Sync {
    /// Name recorded in the outcome and attempt log.
    fn name(&self) -> &str;

    async fn attempt(&self, id: &ResourceId) -> Result<P, Failure>;
}
