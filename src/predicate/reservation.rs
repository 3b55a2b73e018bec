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

use crate::cluster::{self, ClusterStateReader};
use crate::predicate::affinity::AffinityResolver;
use crate::predicate::classifier::{VolumeClassifier, volume_name_candidates};
use crate::types::k8s::{ClaimExt, NodeExt, PodExt};
use crate::types::resources::Resources;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use std::collections::BTreeSet;
use tokio::sync::OnceCell;
use tracing::debug;

/// Capacity to hold back on a node for pods that are not placed yet but
/// whose claims are bound to local volumes of that node.
///
/// Volume and pod listings are fetched once and shared by every node
/// evaluated through the same calculator, so one calculator serves a
/// single request.
pub struct ReservationCalculator<'a> {
    cluster: &'a dyn ClusterStateReader,
    pod_namespace: Option<&'a str>,
    volumes: OnceCell<Vec<corev1::PersistentVolume>>,
    pods: OnceCell<Vec<corev1::Pod>>,
}

impl<'a> ReservationCalculator<'a> {
    pub fn new(cluster: &'a dyn ClusterStateReader, pod_namespace: Option<&'a str>) -> Self {
        Self {
            cluster,
            pod_namespace,
            volumes: OnceCell::new(),
            pods: OnceCell::new(),
        }
    }

    async fn volumes(&self) -> Result<&[corev1::PersistentVolume], cluster::Error> {
        self.volumes
            .get_or_try_init(|| self.cluster.list_volumes())
            .await
            .map(Vec::as_slice)
    }

    async fn pods(&self) -> Result<&[corev1::Pod], cluster::Error> {
        self.pods
            .get_or_try_init(|| self.cluster.list_pods(self.pod_namespace))
            .await
            .map(Vec::as_slice)
    }

    /// Names of the local volumes attached to `node` whose node affinity also
    /// points at it. A volume the affinity assigns to the node but that is not
    /// attached there is left out.
    pub async fn local_volumes_of(
        &self,
        node: &corev1::Node,
    ) -> Result<BTreeSet<String>, cluster::Error> {
        let node_name = node.name_any();
        let attached: BTreeSet<&str> = node
            .attached_volume_ids()
            .into_iter()
            .flat_map(volume_name_candidates)
            .collect();

        Ok(self
            .volumes()
            .await?
            .iter()
            .filter(|v| VolumeClassifier::is_local_volume(v))
            .filter(|v| attached.contains(v.name_any().as_str()))
            .filter(|v| match AffinityResolver::owning_node(v) {
                Ok(owner) => owner == node_name,
                Err(e) => {
                    debug!("skip volume {}: {}", v.name_any(), e);
                    false
                }
            })
            .map(|v| v.name_any())
            .collect())
    }

    pub async fn reserved_capacity(
        &self,
        node: &corev1::Node,
    ) -> Result<Resources, cluster::Error> {
        let node_name = node.name_any();
        let local_volumes = self.local_volumes_of(node).await?;
        if local_volumes.is_empty() {
            return Ok(Resources::default());
        }

        let mut reserved = Resources::default();
        for pod in self.pods().await? {
            if !pod.awaits_placement_on(&node_name) {
                continue;
            }
            // a pod mounting several of the node's volumes still counts once
            if self.mounts_any(pod, &local_volumes).await {
                debug!(
                    "node {}: reserving {} for pod {}",
                    node_name,
                    pod.requests(),
                    pod.key()
                );
                reserved += pod.requests();
            }
        }

        Ok(reserved)
    }

    async fn mounts_any(&self, pod: &corev1::Pod, volumes: &BTreeSet<String>) -> bool {
        let Ok(namespace) = pod.namespace_or_err() else {
            return false;
        };

        for claim_name in pod.claim_names() {
            match self.cluster.get_volume_claim(&namespace, claim_name).await {
                Ok(claim) => {
                    if let Some(volume) = claim.bound_volume_name()
                        && volumes.contains(volume)
                    {
                        return true;
                    }
                }
                Err(e) => debug!("pod {}: {}", pod.key(), e),
            }
        }

        false
    }
}
