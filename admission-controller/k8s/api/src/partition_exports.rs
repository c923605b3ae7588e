use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Describes the services a partition makes available to other partitions.
///
/// There may be at most one `PartitionExports` per cluster and it must be
/// named after the partition the cluster belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "PartitionExports",
    plural = "partitionexports"
)]
#[serde(rename_all = "camelCase")]
pub struct PartitionExportsSpec {
    #[serde(default)]
    pub services: Vec<ExportedService>,
}

/// A service exported to a set of consuming partitions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportedService {
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub consumers: Vec<ServiceConsumer>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConsumer {
    pub partition: String,
}

impl PartitionExports {
    /// The lowercase name used for this kind in user-facing messages.
    pub fn kube_kind() -> String {
        use kube::Resource;
        Self::plural(&()).into_owned()
    }
}
