// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The local-storage filter predicate.
//!
//! 1. A pod mounting node-local storage may only run on the node owning that
//!    storage; every other candidate is rejected. When the owner cannot be
//!    pinned down to one node, every candidate is rejected.
//! 2. Any other pod is admitted on a node only if it fits in what remains of
//!    the node's allocatable capacity once the requests of pods waiting for the
//!    node's local volumes are held back.

use crate::cluster::ClusterStateReader;
use crate::types::k8s::{NodeExt, PodExt};
use crate::types::resources::Resources;
use futures::future::join_all;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod affinity;
pub mod classifier;
pub mod reservation;

use affinity::AffinityResolver;
use classifier::{ClaimScan, LOCAL_STORAGE_CLASS, VolumeClassifier};
use reservation::ReservationCalculator;

pub const NOT_OWNING_NODE: &str = "not the local-storage owning node for this pod";
pub const OWNING_NODE_NOT_FOUND: &str = "owning node not found";
pub const AMBIGUOUS_BINDING: &str = "ambiguous or missing local-storage binding";
pub const INSUFFICIENT_RESOURCES: &str =
    "insufficient resources after reservation for pending local-storage pods";
pub const EVALUATION_TIMED_OUT: &str = "evaluation timed out";
pub const NODE_NOT_FOUND: &str = "node not found";

pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one filter call: feasible nodes in candidate order, and a
/// reason for every rejected node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Decision {
    pub feasible: Vec<corev1::Node>,
    pub infeasible: BTreeMap<String, String>,
}

impl Decision {
    pub fn reject_all(candidates: &[corev1::Node], reason: &str) -> Self {
        Self {
            feasible: Vec::new(),
            infeasible: candidates
                .iter()
                .map(|n| (n.name_any(), reason.to_string()))
                .collect(),
        }
    }

    pub fn feasible_names(&self) -> Vec<String> {
        self.feasible.iter().map(|n| n.name_any()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Storage class of unbound claims that ask for local storage.
    pub local_storage_class: String,

    /// Restricts the pods considered for reservations to one namespace.
    pub pod_namespace: Option<String>,

    pub claim_scan: ClaimScan,

    pub evaluation_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            local_storage_class: LOCAL_STORAGE_CLASS.to_string(),
            pod_namespace: None,
            claim_scan: ClaimScan::default(),
            evaluation_timeout: DEFAULT_EVALUATION_TIMEOUT,
        }
    }
}

/// Evaluates filter calls against a read-only cluster view. Holds no state
/// across calls.
#[derive(Clone)]
pub struct PredicateEngine {
    cluster: Arc<dyn ClusterStateReader>,
    options: EngineOptions,
}

impl PredicateEngine {
    pub fn new(cluster: Arc<dyn ClusterStateReader>, options: EngineOptions) -> Self {
        Self { cluster, options }
    }

    pub fn cluster(&self) -> &dyn ClusterStateReader {
        self.cluster.as_ref()
    }

    fn classifier(&self) -> VolumeClassifier<'_> {
        VolumeClassifier::new(
            self.cluster.as_ref(),
            &self.options.local_storage_class,
            self.options.claim_scan,
        )
    }

    /// [`Self::evaluate`] bounded by the configured timeout. On expiry
    /// every candidate is rejected.
    pub async fn filter(&self, pod: &corev1::Pod, candidates: &[corev1::Node]) -> Decision {
        match tokio::time::timeout(
            self.options.evaluation_timeout,
            self.evaluate(pod, candidates),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => {
                warn!(
                    "pod {}: evaluation exceeded {:?}, rejecting {} candidates",
                    pod.key(),
                    self.options.evaluation_timeout,
                    candidates.len()
                );
                Decision::reject_all(candidates, EVALUATION_TIMED_OUT)
            }
        }
    }

    /// [`Self::filter`] for a scheduler that sends node names only. Names
    /// are looked up under the same deadline; duplicates are dropped and
    /// unknown names rejected.
    pub async fn filter_names(&self, pod: &corev1::Pod, names: &[String]) -> Decision {
        let mut seen = HashSet::new();
        let names: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect();

        match tokio::time::timeout(
            self.options.evaluation_timeout,
            self.evaluate_names(pod, &names),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => {
                warn!(
                    "pod {}: evaluation exceeded {:?}, rejecting {} node names",
                    pod.key(),
                    self.options.evaluation_timeout,
                    names.len()
                );
                Decision {
                    feasible: Vec::new(),
                    infeasible: names
                        .iter()
                        .map(|name| (name.to_string(), EVALUATION_TIMED_OUT.to_string()))
                        .collect(),
                }
            }
        }
    }

    async fn evaluate_names(&self, pod: &corev1::Pod, names: &[&str]) -> Decision {
        let lookups = join_all(names.iter().map(|name| self.cluster.get_node(name))).await;

        let mut candidates = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for (name, lookup) in names.iter().zip(lookups) {
            match lookup {
                Ok(node) => candidates.push(node),
                Err(e) => {
                    debug!("pod {}: {}", pod.key(), e);
                    missing.push(name.to_string());
                }
            }
        }

        let mut decision = self.evaluate(pod, &candidates).await;
        decision.infeasible.extend(
            missing
                .into_iter()
                .map(|name| (name, NODE_NOT_FOUND.to_string())),
        );
        decision
    }

    pub async fn evaluate(&self, pod: &corev1::Pod, candidates: &[corev1::Node]) -> Decision {
        if self.classifier().pod_requires_local_storage(pod).await {
            debug!("pod {} requires local storage", pod.key());
            self.restrict_to_owner(pod, candidates).await
        } else {
            self.check_capacity(pod, candidates).await
        }
    }

    async fn restrict_to_owner(&self, pod: &corev1::Pod, candidates: &[corev1::Node]) -> Decision {
        let owners = match AffinityResolver::new(self.cluster.as_ref())
            .owning_nodes_of_pod(pod)
            .await
        {
            Ok(owners) => owners,
            Err(e) => {
                warn!("pod {}: {}", pod.key(), e);
                return Decision::reject_all(candidates, AMBIGUOUS_BINDING);
            }
        };

        if owners.len() != 1 {
            warn!(
                "pod {}: local volumes resolve to {} nodes {:?}",
                pod.key(),
                owners.len(),
                owners
            );
            return Decision::reject_all(candidates, AMBIGUOUS_BINDING);
        }
        let Some(owner) = owners.into_iter().next() else {
            return Decision::reject_all(candidates, AMBIGUOUS_BINDING);
        };

        if let Some(node) = candidates.iter().find(|n| n.name_any() == owner) {
            return Decision {
                feasible: vec![node.clone()],
                infeasible: candidates
                    .iter()
                    .filter(|n| n.name_any() != owner)
                    .map(|n| (n.name_any(), NOT_OWNING_NODE.to_string()))
                    .collect(),
            };
        }

        match self.cluster.get_node(&owner).await {
            Ok(_) => {
                debug!("pod {}: owning node {} is not a candidate", pod.key(), owner);
                Decision::reject_all(candidates, NOT_OWNING_NODE)
            }
            Err(e) => {
                warn!("pod {}: owning node {}: {}", pod.key(), owner, e);
                Decision::reject_all(candidates, OWNING_NODE_NOT_FOUND)
            }
        }
    }

    async fn check_capacity(&self, pod: &corev1::Pod, candidates: &[corev1::Node]) -> Decision {
        let request = pod.requests();
        let classifier = self.classifier();
        let reservations = ReservationCalculator::new(
            self.cluster.as_ref(),
            self.options.pod_namespace.as_deref(),
        );

        let verdicts = join_all(
            candidates
                .iter()
                .map(|node| self.has_headroom(node, request, &classifier, &reservations)),
        )
        .await;

        let mut decision = Decision::default();
        for (node, fits) in candidates.iter().zip(verdicts) {
            if fits {
                decision.feasible.push(node.clone());
            } else {
                decision
                    .infeasible
                    .insert(node.name_any(), INSUFFICIENT_RESOURCES.to_string());
            }
        }
        decision
    }

    async fn has_headroom(
        &self,
        node: &corev1::Node,
        request: Resources,
        classifier: &VolumeClassifier<'_>,
        reservations: &ReservationCalculator<'_>,
    ) -> bool {
        let mut capacity = node.allocatable();

        if classifier.node_hosts_local_volume(node).await {
            match reservations.reserved_capacity(node).await {
                Ok(reserved) => capacity = capacity - reserved,
                Err(e) => {
                    warn!("node {}: cannot compute reservation: {}", node.name_any(), e);
                    return false;
                }
            }
        }

        let fits = request.fits_within(&capacity);
        debug!(
            "node {}: request {} against remaining {}: {}",
            node.name_any(),
            request,
            capacity,
            if fits { "fits" } else { "rejected" }
        );
        fits
    }
}

impl std::fmt::Debug for PredicateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Logs a one-line summary of a decision.
pub fn log_decision(pod: &corev1::Pod, decision: &Decision) {
    info!(
        "pod {}: feasible {:?}, rejected {}",
        pod.key(),
        decision.feasible_names(),
        decision.infeasible.len()
    );
}
