use crate::{
    core::{dns, DnsConflict, ResolverConfig, Singleton},
    k8s::{self, PartitionExports, Pod, Resource, ResourceExt},
    metrics::AdmissionMetrics,
    ClusterState,
};
use anyhow::{bail, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::{admission::Operation, DynamicObject};
use serde::de::DeserializeOwned;
use std::{fmt, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::time;
use tracing::{debug, info, trace, warn};


/// Validates `PartitionExports` resources and redirects pod DNS to the mesh.
#[derive(Clone)]
pub struct Admission<C> {
    cluster: C,
    singleton: Arc<Singleton>,
    config: Arc<Config>,
    metrics: AdmissionMetrics,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// The partition this cluster belongs to.
    pub partition: String,

    /// The host resolver configuration, read on each pod admission.
    pub resolv_conf: PathBuf,

    /// Whether pods are redirected to the mesh resolver when they don't
    /// carry an annotation that says otherwise.
    pub mesh_dns_enabled: bool,

    /// Bounds the time spent reading cluster state for a single request.
    pub api_timeout: time::Duration,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// A request object that could not be decoded into the expected type.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("admission request missing 'object'")]
    MissingObject,

    #[error("failed to decode {kind}: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
enum RedirectError {
    #[error("invalid {annotation} annotation: {0}", annotation = k8s::MESH_DNS_ANNOTATION)]
    Annotation(#[from] std::str::ParseBoolError),

    #[error(transparent)]
    Resolver(#[from] crate::core::resolv::Error),

    #[error(transparent)]
    Conflict(#[from] DnsConflict),

    #[error("failed to encode pod: {0}")]
    Json(#[from] serde_json::Error),
}

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl AdmissionService ===

impl<C> tower::Service<Request<hyper::body::Incoming>> for Admission<C>
where
    C: ClusterState + Clone + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            json_response(admission.review(&bytes).await)
        })
    }
}

impl<C> Admission<C>
where
    C: ClusterState,
{
    pub fn new(cluster: C, config: Config, metrics: AdmissionMetrics) -> Self {
        Self {
            cluster,
            singleton: Arc::new(Singleton::new(config.partition.clone())),
            config: Arc::new(config),
            metrics,
        }
    }

    /// Handles a serialized `AdmissionReview`, returning the review to send
    /// back to the API server.
    pub async fn review(&self, body: &[u8]) -> AdmissionReview {
        let review: Review = match serde_json::from_slice(body) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return AdmissionResponse::invalid(error).into_review();
            }
        };
        trace!(?review);

        let rsp = match review.try_into() {
            Ok(req) => {
                debug!(?req);
                self.admit(req).await
            }
            Err(error) => {
                warn!(%error, "Invalid admission request");
                AdmissionResponse::invalid(error)
            }
        };
        debug!(?rsp);
        rsp.into_review()
    }

    async fn admit(&self, req: AdmissionRequest) -> AdmissionResponse {
        let operation = operation_label(&req.operation);

        // Metric labels are fixed so that unknown kinds don't create new series.
        let (kind, rsp) = if k8s::is_kind::<PartitionExports>(&req.kind.group, &req.kind.kind) {
            ("PartitionExports", self.admit_partition_exports(req).await)
        } else if k8s::is_kind::<Pod>(&req.kind.group, &req.kind.kind) {
            ("Pod", self.admit_pod(req).await)
        } else {
            let rsp = AdmissionResponse::invalid(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
            ("unsupported", rsp)
        };

        self.metrics.observe(kind, operation, rsp.allowed);
        rsp
    }

    async fn admit_partition_exports(&self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);
        if matches!(req.operation, Operation::Delete | Operation::Connect) {
            return rsp;
        }

        // Decode the resource under review before doing anything with the
        // API--i.e., if this fails we don't have to waste the API calls.
        let exports = match decode::<PartitionExports>(&req) {
            Ok(exports) => exports,
            Err(error) => {
                info!(%error, "Failed to parse {} object", req.kind.kind);
                return rsp.deny(error);
            }
        };
        let name = exports.name_any();

        if let Operation::Update = req.operation {
            return decide(rsp, &name, self.singleton.validate_update(&exports));
        }

        let existing = match self.list_partition_exports().await {
            Ok(existing) => existing,
            Err(error) => {
                warn!(%error, "Failed to list {}", PartitionExports::kube_kind());
                return rsp.deny(format_args!("{error:#}"));
            }
        };
        decide(rsp, &name, self.singleton.validate_create(&existing, &exports))
    }

    async fn list_partition_exports(&self) -> Result<Vec<PartitionExports>> {
        let timeout = self.config.api_timeout;
        match time::timeout(timeout, self.cluster.list_partition_exports()).await {
            Ok(res) => res,
            Err(_) => bail!(
                "timed out listing {} after {:?}",
                PartitionExports::kube_kind(),
                timeout
            ),
        }
    }

    async fn admit_pod(&self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);
        if !matches!(req.operation, Operation::Create) {
            return rsp;
        }

        let pod = match decode::<Pod>(&req) {
            Ok(pod) => pod,
            Err(error) => {
                info!(%error, "Failed to parse pod");
                return rsp.deny(error);
            }
        };
        // Pods created by a controller typically only carry a generated name.
        let name = pod
            .metadata
            .name
            .clone()
            .or_else(|| pod.metadata.generate_name.clone())
            .unwrap_or_default();

        let patch = match self.redirect_dns(&pod) {
            Ok(Some(patch)) => patch,
            Ok(None) => {
                debug!(%name, "DNS redirection disabled");
                return rsp;
            }
            Err(error) => return decide(rsp, &name, Err(error)),
        };

        debug!(%name, ?patch, "Redirecting DNS");
        match rsp.with_patch(patch) {
            Ok(rsp) => rsp,
            Err(error) => {
                warn!(%error, "Failed to encode patch");
                AdmissionResponse::from(&req).deny(error)
            }
        }
    }

    /// Computes the patch that points `pod` at the mesh resolver, or `None`
    /// if DNS redirection is disabled for the pod.
    fn redirect_dns(&self, pod: &Pod) -> Result<Option<json_patch::Patch>, RedirectError> {
        let enabled = match pod.annotations().get(k8s::MESH_DNS_ANNOTATION) {
            Some(v) => v.parse::<bool>()?,
            None => self.config.mesh_dns_enabled,
        };
        if !enabled {
            return Ok(None);
        }

        let resolver = ResolverConfig::load(&self.config.resolv_conf)?;

        // Plan against a copy so the submitted pod is kept for the diff.
        let mut mutated = pod.clone();
        dns::redirect(mutated.spec.get_or_insert_with(Default::default), &resolver)?;

        let patch = json_patch::diff(
            &serde_json::to_value(pod)?,
            &serde_json::to_value(&mutated)?,
        );
        Ok(Some(patch))
    }
}

/// Allows the request unless `result` is an error, in which case the error is
/// returned to the client as the reason for the denial.
fn decide<E: fmt::Display>(
    rsp: AdmissionResponse,
    name: &str,
    result: Result<(), E>,
) -> AdmissionResponse {
    match result {
        Ok(()) => rsp,
        Err(error) => {
            info!(%error, %name, "Denied");
            rsp.deny(error)
        }
    }
}

fn decode<T>(req: &AdmissionRequest) -> Result<T, DecodeError>
where
    T: Resource + DeserializeOwned,
    T::DynamicType: Default,
{
    let obj = req.object.as_ref().ok_or(DecodeError::MissingObject)?;
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|source| DecodeError::Invalid {
            kind: T::kind(&Default::default()).into_owned(),
            source,
        })
}

fn operation_label(op: &Operation) -> &'static str {
    match op {
        Operation::Create => "create",
        Operation::Update => "update",
        Operation::Delete => "delete",
        Operation::Connect => "connect",
    }
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
