//! Redirects a pod's DNS lookups to the mesh-local resolver.

use crate::ResolverConfig;
use mesh_admission_controller_k8s_api::{PodDNSConfig, PodDNSConfigOption, PodSpec};
use thiserror::Error;

/// The address of the DNS responder served by the pod's sidecar proxy.
pub const MESH_DNS_ADDRESS: &str = "127.0.0.1";

/// The pod DNS policy under which only the pod's explicit `dnsConfig` is used.
pub const DNS_POLICY_NONE: &str = "None";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("DNS redirection to Consul is not supported with an already defined DNSConfig on the pod")]
pub struct DnsConflict(());

/// Configures `spec` so that the mesh-local resolver is queried first, falling
/// back to the host's nameservers.
///
/// The mesh resolver must come first: many DNS clients stop at the first
/// NXDOMAIN answer, so the host resolvers only serve as a fallback when the
/// mesh resolver is unreachable.
///
/// Pods that already set a `dnsConfig` are rejected rather than merged, and
/// `spec` is left untouched on error.
pub fn redirect(spec: &mut PodSpec, resolver: &ResolverConfig) -> Result<(), DnsConflict> {
    if spec.dns_config.is_some() {
        return Err(DnsConflict(()));
    }

    let nameservers = std::iter::once(MESH_DNS_ADDRESS.to_string())
        .chain(resolver.servers.iter().cloned())
        .collect();

    let options = [
        ("ndots", resolver.ndots),
        ("timeout", resolver.timeout),
        ("attempts", resolver.attempts),
    ]
    .into_iter()
    .filter(|(_, value)| *value != 0)
    .map(|(name, value)| PodDNSConfigOption {
        name: Some(name.to_string()),
        value: Some(value.to_string()),
    })
    .collect::<Vec<_>>();

    spec.dns_policy = Some(DNS_POLICY_NONE.to_string());
    spec.dns_config = Some(PodDNSConfig {
        nameservers: Some(nameservers),
        searches: (!resolver.search.is_empty()).then(|| resolver.search.clone()),
        options: (!options.is_empty()).then_some(options),
    });
    Ok(())
}
