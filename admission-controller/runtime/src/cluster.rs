use crate::k8s::{Api, Client, ListParams, PartitionExports};
use anyhow::Result;

/// Reads the cluster-wide state that admission decisions depend on.
///
/// Listings reflect the store at the time of the call; nothing prevents the
/// store from changing before the admission decision is returned.
#[async_trait::async_trait]
pub trait ClusterState {
    /// Lists all `PartitionExports` resources in the cluster.
    async fn list_partition_exports(&self) -> Result<Vec<PartitionExports>>;
}

#[async_trait::async_trait]
impl ClusterState for Client {
    async fn list_partition_exports(&self) -> Result<Vec<PartitionExports>> {
        let api = Api::<PartitionExports>::all(self.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }
}
