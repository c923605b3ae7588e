use crate::{
    admission::{Admission, Config},
    core::resolv,
    metrics::AdmissionMetrics,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "mesh-admission",
    about = "Admission webhooks for mesh partition resources and pod DNS"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "mesh_admission=info,warn",
        env = "MESH_ADMISSION_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The partition this cluster belongs to.
    ///
    /// The cluster's PartitionExports resource must be named after it.
    #[clap(long, default_value = "default", env = "MESH_PARTITION_NAME")]
    partition_name: String,

    /// Host resolver configuration used as the fallback for mesh DNS.
    #[clap(long, default_value = resolv::DEFAULT_PATH)]
    resolv_conf_path: PathBuf,

    /// Redirects pod DNS to the mesh resolver unless the pod's
    /// `consul.hashicorp.com/consul-dns` annotation disables it.
    #[clap(long)]
    enable_mesh_dns: bool,

    #[clap(long, default_value = "5000")]
    api_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            partition_name,
            resolv_conf_path,
            enable_mesh_dns,
            api_timeout_ms,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        let config = Config {
            partition: partition_name,
            resolv_conf: resolv_conf_path,
            mesh_dns_enabled: enable_mesh_dns,
            api_timeout: Duration::from_millis(api_timeout_ms),
        };
        info!(
            partition = %config.partition,
            resolv_conf = %config.resolv_conf.display(),
            mesh_dns = config.mesh_dns_enabled,
            "Admission controller configured"
        );

        let admission = Admission::new(runtime.client(), config, metrics);
        let runtime = runtime.spawn_server(admission);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
