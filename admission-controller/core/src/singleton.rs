//! Enforces that a cluster holds a single `PartitionExports`, named after the
//! cluster's partition.
//!
//! The uniqueness check is advisory. It is made against a listing of the
//! cluster taken at admission time, so concurrent creations may each observe
//! an empty cluster and both be admitted. Only the store itself could enforce
//! uniqueness.

use mesh_admission_controller_k8s_api::{PartitionExports, PartitionExportsSpec, ResourceExt};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct Singleton {
    kind: String,
    partition: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(
        "{kind} resource already defined - only one {kind} entry is supported per Kubernetes cluster"
    )]
    AlreadyDefined { kind: String },

    #[error("{kind} resource name must be the same name as the partition, \"{partition}\"")]
    NameMismatch { kind: String, partition: String },

    #[error("{kind}.spec.services[{service}].name: Required value")]
    MissingServiceName { kind: String, service: usize },

    #[error("{kind}.spec.services[{service}].consumers[{consumer}].partition: Required value")]
    MissingConsumerPartition {
        kind: String,
        service: usize,
        consumer: usize,
    },
}

// === impl Singleton ===

impl Singleton {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            kind: PartitionExports::kube_kind(),
            partition: partition.into(),
        }
    }

    /// Validates the creation of `new` given the instances that already exist
    /// in the cluster.
    ///
    /// The existence check always runs first, so a second instance is
    /// rejected as a duplicate even when its name is also wrong.
    pub fn validate_create(
        &self,
        existing: &[PartitionExports],
        new: &PartitionExports,
    ) -> Result<(), Error> {
        if !existing.is_empty() {
            tracing::debug!(
                existing = ?existing.iter().map(|e| e.name_any()).collect::<Vec<_>>(),
                "Found existing {}",
                self.kind,
            );
            return Err(Error::AlreadyDefined {
                kind: self.kind.clone(),
            });
        }

        self.validate_update(new)
    }

    /// Validates an update to the existing instance.
    ///
    /// The only instance that may exist is the one named after the partition,
    /// so no existence check is made.
    pub fn validate_update(&self, new: &PartitionExports) -> Result<(), Error> {
        if new.name_any() != self.partition {
            return Err(Error::NameMismatch {
                kind: self.kind.clone(),
                partition: self.partition.clone(),
            });
        }

        self.validate_spec(&new.spec)
    }

    fn validate_spec(&self, spec: &PartitionExportsSpec) -> Result<(), Error> {
        for (i, svc) in spec.services.iter().enumerate() {
            if svc.name.is_empty() {
                return Err(Error::MissingServiceName {
                    kind: self.kind.clone(),
                    service: i,
                });
            }

            if let Some(j) = svc.consumers.iter().position(|c| c.partition.is_empty()) {
                return Err(Error::MissingConsumerPartition {
                    kind: self.kind.clone(),
                    service: i,
                    consumer: j,
                });
            }
        }

        Ok(())
    }
}
