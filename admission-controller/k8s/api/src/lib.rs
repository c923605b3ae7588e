#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod partition_exports;

pub use self::partition_exports::{
    ExportedService, PartitionExports, PartitionExportsSpec, ServiceConsumer,
};
pub use k8s_openapi::api::{
    self,
    core::v1::{Pod, PodDNSConfig, PodDNSConfigOption, PodSpec},
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, ResourceExt},
    Client, Resource,
};

/// Pod annotation that overrides whether DNS lookups are redirected to the
/// mesh-local resolver.
pub const MESH_DNS_ANNOTATION: &str = "consul.hashicorp.com/consul-dns";

/// Checks whether `group`/`kind` (as sent in an admission request) refer to
/// the resource type `T`.
pub fn is_kind<T>(group: &str, kind: &str) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    group.eq_ignore_ascii_case(&T::group(&dt)) && kind.eq_ignore_ascii_case(&T::kind(&dt))
}
