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

//! Read-only view of the cluster the predicate consults.

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use snafu::Snafu;

pub mod client;
pub mod snapshot;

pub use client::KubeClusterState;
pub use snapshot::ClusterSnapshot;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("{} '{}' not found", kind, name))]
    NotFound { kind: &'static str, name: String },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Accessors for the objects the predicate needs to resolve relationships
/// between pods, claims, volumes and nodes.
///
/// A missing object is reported as [`Error::NotFound`]; every other failure
/// is a transport error. Implementations never mutate the cluster.
#[async_trait]
pub trait ClusterStateReader: Send + Sync {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<corev1::Pod, Error>;

    /// Pods of `namespace`, or of every namespace when `None`.
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<corev1::Pod>, Error>;

    async fn get_node(&self, name: &str) -> Result<corev1::Node, Error>;

    async fn list_nodes(&self) -> Result<Vec<corev1::Node>, Error>;

    async fn get_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<corev1::PersistentVolumeClaim, Error>;

    async fn get_volume(&self, name: &str) -> Result<corev1::PersistentVolume, Error>;

    async fn list_volumes(&self) -> Result<Vec<corev1::PersistentVolume>, Error>;
}
