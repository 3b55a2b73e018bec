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

use crate::cluster::{ClusterStateReader, Error, NotFoundSnafu};
use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use snafu::OptionExt;
use std::collections::BTreeMap;

type NamespacedKey = (String, String);

fn namespaced_key<K: ResourceExt>(object: &K) -> NamespacedKey {
    (object.namespace().unwrap_or_default(), object.name_any())
}

/// A fixed, in-memory cluster state.
///
/// Objects are kept in name order so listings are deterministic.
#[derive(Clone, Debug, Default)]
pub struct ClusterSnapshot {
    pods: BTreeMap<NamespacedKey, corev1::Pod>,
    nodes: BTreeMap<String, corev1::Node>,
    claims: BTreeMap<NamespacedKey, corev1::PersistentVolumeClaim>,
    volumes: BTreeMap<String, corev1::PersistentVolume>,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pod(mut self, pod: corev1::Pod) -> Self {
        self.pods.insert(namespaced_key(&pod), pod);
        self
    }

    pub fn with_node(mut self, node: corev1::Node) -> Self {
        self.nodes.insert(node.name_any(), node);
        self
    }

    pub fn with_claim(mut self, claim: corev1::PersistentVolumeClaim) -> Self {
        self.claims.insert(namespaced_key(&claim), claim);
        self
    }

    pub fn with_volume(mut self, volume: corev1::PersistentVolume) -> Self {
        self.volumes.insert(volume.name_any(), volume);
        self
    }
}

#[async_trait]
impl ClusterStateReader for ClusterSnapshot {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<corev1::Pod, Error> {
        self.pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .context(NotFoundSnafu {
                kind: "Pod",
                name: format!("{namespace}/{name}"),
            })
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<corev1::Pod>, Error> {
        Ok(self
            .pods
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|wanted| wanted == ns.as_str()))
            .map(|(_, pod)| pod.clone())
            .collect())
    }

    async fn get_node(&self, name: &str) -> Result<corev1::Node, Error> {
        self.nodes
            .get(name)
            .cloned()
            .context(NotFoundSnafu { kind: "Node", name })
    }

    async fn list_nodes(&self) -> Result<Vec<corev1::Node>, Error> {
        Ok(self.nodes.values().cloned().collect())
    }

    async fn get_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<corev1::PersistentVolumeClaim, Error> {
        self.claims
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .context(NotFoundSnafu {
                kind: "PersistentVolumeClaim",
                name: format!("{namespace}/{name}"),
            })
    }

    async fn get_volume(&self, name: &str) -> Result<corev1::PersistentVolume, Error> {
        self.volumes.get(name).cloned().context(NotFoundSnafu {
            kind: "PersistentVolume",
            name,
        })
    }

    async fn list_volumes(&self) -> Result<Vec<corev1::PersistentVolume>, Error> {
        Ok(self.volumes.values().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{bound_claim, local_volume, node, pod};

    fn snapshot() -> ClusterSnapshot {
        ClusterSnapshot::new()
            .with_node(node("node-a", "8", "16Gi", &[]))
            .with_pod(pod("default", "web-0", "1", "1Gi", &["data-web-0"]))
            .with_pod(pod("kube-system", "dns", "100m", "64Mi", &[]))
            .with_claim(bound_claim("default", "data-web-0", "pv-a"))
            .with_volume(local_volume("pv-a", &[&["node-a"]]))
    }

    #[tokio::test]
    async fn test_get_objects() {
        let cluster = snapshot();

        assert_eq!(
            cluster.get_pod("default", "web-0").await.unwrap().name_any(),
            "web-0"
        );
        assert_eq!(cluster.get_node("node-a").await.unwrap().name_any(), "node-a");
        assert_eq!(
            cluster
                .get_volume_claim("default", "data-web-0")
                .await
                .unwrap()
                .name_any(),
            "data-web-0"
        );
        assert_eq!(cluster.get_volume("pv-a").await.unwrap().name_any(), "pv-a");
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let cluster = snapshot();

        let err = cluster.get_pod("other", "web-0").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Pod 'other/web-0' not found");

        assert!(cluster.get_node("node-z").await.unwrap_err().is_not_found());
        assert!(
            cluster
                .get_volume_claim("default", "missing")
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(cluster.get_volume("pv-z").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_pods_by_namespace() {
        let cluster = snapshot();

        assert_eq!(cluster.list_pods(None).await.unwrap().len(), 2);

        let scoped = cluster.list_pods(Some("kube-system")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].name_any(), "dns");
    }
}
