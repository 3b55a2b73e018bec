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
use crate::types::k8s::{ClaimExt, NodeExt, PodExt};
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use strum::Display;
use tracing::debug;

/// Storage class that marks a not-yet-bound claim as asking for node-local storage.
pub const LOCAL_STORAGE_CLASS: &str = "local-storage";

/// How [`VolumeClassifier::pod_requires_local_storage`] treats a pod volume
/// that is not backed by a claim.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Display, clap::ValueEnum)]
pub enum ClaimScan {
    /// The first volume without a claim ends the scan and the pod is
    /// considered not to need local storage.
    #[default]
    #[strum(to_string = "first-non-claim-stops")]
    FirstNonClaimStops,

    /// Volumes without a claim are skipped and the scan goes on.
    #[strum(to_string = "all-claims")]
    AllClaims,
}

pub struct VolumeClassifier<'a> {
    cluster: &'a dyn ClusterStateReader,
    local_storage_class: &'a str,
    claim_scan: ClaimScan,
}

impl<'a> VolumeClassifier<'a> {
    pub fn new(
        cluster: &'a dyn ClusterStateReader,
        local_storage_class: &'a str,
        claim_scan: ClaimScan,
    ) -> Self {
        Self {
            cluster,
            local_storage_class,
            claim_scan,
        }
    }

    pub fn is_local_volume(volume: &corev1::PersistentVolume) -> bool {
        volume.spec.as_ref().is_some_and(|s| s.local.is_some())
    }

    /// An unbound claim is local when it asks for the local storage class; a
    /// bound one when its volume is. A volume that cannot be looked up makes
    /// the claim non-local.
    pub async fn is_local_claim(&self, claim: &corev1::PersistentVolumeClaim) -> bool {
        self.claim_locality(claim).await.unwrap_or_else(|e| {
            debug!("claim {} treated as non-local: {}", claim.name_any(), e);
            false
        })
    }

    async fn claim_locality(
        &self,
        claim: &corev1::PersistentVolumeClaim,
    ) -> Result<bool, cluster::Error> {
        if !claim.is_bound() {
            return Ok(claim.storage_class() == Some(self.local_storage_class));
        }

        let Some(volume_name) = claim.bound_volume_name() else {
            debug!("claim {} is bound without a volume name", claim.name_any());
            return Ok(false);
        };

        let volume = self.cluster.get_volume(volume_name).await?;
        Ok(Self::is_local_volume(&volume))
    }

    pub async fn pod_requires_local_storage(&self, pod: &corev1::Pod) -> bool {
        let volumes = pod.volumes();
        if volumes.is_empty() {
            return false;
        }

        let namespace = match pod.namespace_or_err() {
            Ok(namespace) => namespace,
            Err(e) => {
                debug!("pod {}: {}", pod.name_any(), e);
                return false;
            }
        };

        for volume in volumes {
            let Some(source) = volume.persistent_volume_claim.as_ref() else {
                match self.claim_scan {
                    ClaimScan::FirstNonClaimStops => return false,
                    ClaimScan::AllClaims => continue,
                }
            };

            let claim = match self
                .cluster
                .get_volume_claim(&namespace, &source.claim_name)
                .await
            {
                Ok(claim) => claim,
                Err(e) => {
                    debug!("pod {}: {}", pod.key(), e);
                    return false;
                }
            };

            match self.claim_locality(&claim).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    debug!("pod {}: {}", pod.key(), e);
                    return false;
                }
            }
        }

        false
    }

    pub async fn node_hosts_local_volume(&self, node: &corev1::Node) -> bool {
        for id in node.attached_volume_ids() {
            for name in volume_name_candidates(id) {
                match self.cluster.get_volume(name).await {
                    Ok(volume) if Self::is_local_volume(&volume) => return true,
                    Ok(_) => break,
                    Err(e) => debug!("node {} volume {}: {}", node.name_any(), id, e),
                }
            }
        }

        false
    }
}

/// Names an attached-volume identifier may refer to: the identifier itself,
/// then the last segment of a plugin-qualified unique name such as
/// `kubernetes.io/local-volume/<pv>`.
pub(crate) fn volume_name_candidates(id: &str) -> Vec<&str> {
    match id.rsplit_once('/') {
        Some((_, last)) if !last.is_empty() => vec![id, last],
        _ => vec![id],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::ClusterSnapshot;
    use crate::tests::{
        bound_claim, ephemeral_volume, local_volume, network_volume, node, pod, unbound_claim,
    };

    fn classifier(cluster: &ClusterSnapshot) -> VolumeClassifier<'_> {
        VolumeClassifier::new(cluster, LOCAL_STORAGE_CLASS, ClaimScan::default())
    }

    #[test]
    fn test_is_local_volume() {
        assert!(VolumeClassifier::is_local_volume(&local_volume(
            "pv-a",
            &[&["node-a"]]
        )));
        assert!(!VolumeClassifier::is_local_volume(&network_volume("pv-n")));
    }

    #[tokio::test]
    async fn test_is_local_claim() {
        let cluster = ClusterSnapshot::new()
            .with_volume(local_volume("pv-a", &[&["node-a"]]))
            .with_volume(network_volume("pv-n"));
        let classifier = classifier(&cluster);

        assert!(
            classifier
                .is_local_claim(&unbound_claim("default", "c1", Some(LOCAL_STORAGE_CLASS)))
                .await
        );
        assert!(
            !classifier
                .is_local_claim(&unbound_claim("default", "c2", Some("standard")))
                .await
        );
        assert!(
            !classifier
                .is_local_claim(&unbound_claim("default", "c3", None))
                .await
        );
        assert!(
            classifier
                .is_local_claim(&bound_claim("default", "c4", "pv-a"))
                .await
        );
        assert!(
            !classifier
                .is_local_claim(&bound_claim("default", "c5", "pv-n"))
                .await
        );
        // bound to a volume that does not exist: fails closed
        assert!(
            !classifier
                .is_local_claim(&bound_claim("default", "c6", "pv-gone"))
                .await
        );
    }

    #[tokio::test]
    async fn test_pod_without_volumes_is_not_local() {
        let cluster = ClusterSnapshot::new();

        let p = pod("default", "web-0", "1", "1Gi", &[]);

        assert!(!classifier(&cluster).pod_requires_local_storage(&p).await);
    }

    #[tokio::test]
    async fn test_pod_with_local_claims() {
        let cluster = ClusterSnapshot::new()
            .with_volume(local_volume("pv-a", &[&["node-a"]]))
            .with_volume(network_volume("pv-n"))
            .with_claim(bound_claim("default", "local", "pv-a"))
            .with_claim(bound_claim("default", "remote", "pv-n"))
            .with_claim(unbound_claim("default", "waiting", Some(LOCAL_STORAGE_CLASS)));
        let classifier = classifier(&cluster);

        let bound = pod("default", "a", "1", "1Gi", &["local"]);
        assert!(classifier.pod_requires_local_storage(&bound).await);

        let remote_then_local = pod("default", "b", "1", "1Gi", &["remote", "local"]);
        assert!(classifier.pod_requires_local_storage(&remote_then_local).await);

        let waiting = pod("default", "c", "1", "1Gi", &["waiting"]);
        assert!(classifier.pod_requires_local_storage(&waiting).await);

        let remote = pod("default", "d", "1", "1Gi", &["remote"]);
        assert!(!classifier.pod_requires_local_storage(&remote).await);

        // claims are looked up in the pod's own namespace
        let elsewhere = pod("other", "e", "1", "1Gi", &["local"]);
        assert!(!classifier.pod_requires_local_storage(&elsewhere).await);
    }

    #[tokio::test]
    async fn test_missing_claim_stops_the_scan() {
        let cluster = ClusterSnapshot::new()
            .with_volume(local_volume("pv-a", &[&["node-a"]]))
            .with_claim(bound_claim("default", "local", "pv-a"));

        let p = pod("default", "a", "1", "1Gi", &["missing", "local"]);

        assert!(!classifier(&cluster).pod_requires_local_storage(&p).await);
    }

    #[tokio::test]
    async fn test_claim_scan_modes() {
        let cluster = ClusterSnapshot::new()
            .with_volume(local_volume("pv-a", &[&["node-a"]]))
            .with_claim(bound_claim("default", "local", "pv-a"));

        let mut p = pod("default", "a", "1", "1Gi", &["local"]);
        if let Some(spec) = p.spec.as_mut() {
            spec.volumes
                .get_or_insert_with(Vec::new)
                .insert(0, ephemeral_volume("scratch"));
        }

        let stops =
            VolumeClassifier::new(&cluster, LOCAL_STORAGE_CLASS, ClaimScan::FirstNonClaimStops);
        assert!(!stops.pod_requires_local_storage(&p).await);

        let all = VolumeClassifier::new(&cluster, LOCAL_STORAGE_CLASS, ClaimScan::AllClaims);
        assert!(all.pod_requires_local_storage(&p).await);
    }

    #[tokio::test]
    async fn test_node_hosts_local_volume() {
        let cluster = ClusterSnapshot::new()
            .with_volume(local_volume("pv-a", &[&["node-a"]]))
            .with_volume(network_volume("pv-n"));
        let classifier = classifier(&cluster);

        let direct = node("node-a", "8", "16Gi", &["pv-a"]);
        assert!(classifier.node_hosts_local_volume(&direct).await);

        let qualified = node("node-a", "8", "16Gi", &["kubernetes.io/local-volume/pv-a"]);
        assert!(classifier.node_hosts_local_volume(&qualified).await);

        let remote = node(
            "node-b",
            "8",
            "16Gi",
            &["pv-n", "kubernetes.io/csi/ebs^vol-1"],
        );
        assert!(!classifier.node_hosts_local_volume(&remote).await);

        let bare = node("node-c", "8", "16Gi", &[]);
        assert!(!classifier.node_hosts_local_volume(&bare).await);
    }

    #[test]
    fn test_claim_scan_display() {
        assert_eq!(ClaimScan::FirstNonClaimStops.to_string(), "first-non-claim-stops");
        assert_eq!(ClaimScan::AllClaims.to_string(), "all-claims");
    }
}
