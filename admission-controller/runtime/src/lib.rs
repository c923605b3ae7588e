#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use mesh_admission_controller_core as core;
pub use mesh_admission_controller_k8s_api as k8s;

mod admission;
mod args;
mod cluster;
mod metrics;

pub use self::{
    admission::{Admission, Config, DecodeError},
    args::Args,
    cluster::ClusterState,
    metrics::AdmissionMetrics,
};
