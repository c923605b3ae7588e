#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod dns;
pub mod resolv;
pub mod singleton;

pub use self::{
    dns::{DnsConflict, MESH_DNS_ADDRESS},
    resolv::ResolverConfig,
    singleton::Singleton,
};
