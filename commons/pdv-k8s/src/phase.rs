use k8s_openapi::api::core::v1::Pod;

/// A simplified view of a pod phase.
///
/// Mirrors the string phases reported by Kubernetes. Unknown or missing
/// values map to [`PodPhase::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl PodPhase {
    pub fn of(pod: &Pod) -> Self {
        pod.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map(PodPhase::from)
            .unwrap_or(PodPhase::Unknown)
    }

    /// A pod is ready once it is serving or has finished successfully.
    pub fn is_ready(self) -> bool {
        matches!(self, PodPhase::Running | PodPhase::Succeeded)
    }
}
