// Metadata resolver trait for device -> asset identity lookups
use crate::domain::device::DeviceMetadata;
use async_trait::async_trait;

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Best-effort lookup; `Ok(None)` when the device is unknown
    async fn resolve(&self, device_id: &str) -> anyhow::Result<Option<DeviceMetadata>>;
}

/// Resolver used when no metadata service is configured
#[derive(Debug, Clone, Default)]
pub struct NullMetadataResolver;

#[async_trait]
impl MetadataResolver for NullMetadataResolver {
    async fn resolve(&self, _device_id: &str) -> anyhow::Result<Option<DeviceMetadata>> {
        Ok(None)
    }
}
