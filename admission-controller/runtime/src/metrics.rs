use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct AdmissionMetrics {
    requests: Family<Labels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct Labels {
    kind: String,
    operation: &'static str,
    allowed: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<Labels, Counter>::default();
        reg.register(
            "requests",
            "Total number of admission requests handled, by decision",
            requests.clone(),
        );
        Self { requests }
    }

    pub(crate) fn observe(&self, kind: &str, operation: &'static str, allowed: bool) {
        self.requests
            .get_or_create(&Labels {
                kind: kind.to_string(),
                operation,
                allowed: if allowed { "true" } else { "false" },
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn get(&self, kind: &str, operation: &'static str, allowed: bool) -> u64 {
        self.requests
            .get_or_create(&Labels {
                kind: kind.to_string(),
                operation,
                allowed: if allowed { "true" } else { "false" },
            })
            .get()
    }
}
