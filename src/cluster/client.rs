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

use crate::cluster::{ClusterStateReader, Error, KubeSnafu, NotFoundSnafu};
use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use snafu::futures::TryFutureExt;
use snafu::{OptionExt, ResultExt, Snafu};
use std::fmt::Debug;
use std::path::Path;
use tracing::info;

#[derive(Debug, Snafu)]
pub enum ConnectError {
    #[snafu(display("read kubeconfig '{}' error: {}", path, source))]
    ReadKubeconfig {
        path: String,
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("load kubeconfig error: {}", source))]
    LoadKubeconfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("infer cluster config error: {}", source))]
    InferConfig {
        source: kube::config::InferConfigError,
    },

    #[snafu(display("create Kubernetes client error: {}", source))]
    CreateClient { source: kube::Error },
}

/// Cluster state served by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterState {
    client: Client,
}

impl KubeClusterState {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from an explicit kubeconfig file, or from the
    /// in-cluster service account / `KUBECONFIG` / `~/.kube/config` otherwise.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, ConnectError> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).context(ReadKubeconfigSnafu {
                    path: path.display().to_string(),
                })?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context(LoadKubeconfigSnafu)?
            }
            None => kube::Config::infer().await.context(InferConfigSnafu)?,
        };

        info!("connecting to Kubernetes API server {}", config.cluster_url);
        let client = Client::try_from(config).context(CreateClientSnafu)?;
        Ok(Self::new(client))
    }

    async fn get<T>(&self, api: Api<T>, name: &str) -> Result<T, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource + k8s_openapi::Resource,
    {
        api.get_opt(name)
            .context(KubeSnafu)
            .await?
            .context(NotFoundSnafu {
                kind: <T as k8s_openapi::Resource>::KIND,
                name,
            })
    }

    async fn list<T>(&self, api: Api<T>) -> Result<Vec<T>, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource,
    {
        api.list(&ListParams::default())
            .context(KubeSnafu)
            .await
            .map(|list| list.items)
    }
}

#[async_trait]
impl ClusterStateReader for KubeClusterState {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<corev1::Pod, Error> {
        self.get(Api::namespaced(self.client.clone(), namespace), name)
            .await
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<corev1::Pod>, Error> {
        let api: Api<corev1::Pod> = match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        self.list(api).await
    }

    async fn get_node(&self, name: &str) -> Result<corev1::Node, Error> {
        self.get(Api::all(self.client.clone()), name).await
    }

    async fn list_nodes(&self) -> Result<Vec<corev1::Node>, Error> {
        self.list(Api::all(self.client.clone())).await
    }

    async fn get_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<corev1::PersistentVolumeClaim, Error> {
        self.get(Api::namespaced(self.client.clone(), namespace), name)
            .await
    }

    async fn get_volume(&self, name: &str) -> Result<corev1::PersistentVolume, Error> {
        self.get(Api::all(self.client.clone()), name).await
    }

    async fn list_volumes(&self) -> Result<Vec<corev1::PersistentVolume>, Error> {
        self.list(Api::all(self.client.clone())).await
    }
}
