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

//! Accessors over the upstream Kubernetes objects the predicate reads.

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use crate::types::resources::Resources;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use snafu::OptionExt;
use std::collections::HashSet;

pub const PHASE_PENDING: &str = "Pending";
pub const PHASE_BOUND: &str = "Bound";

pub trait PodExt {
    fn namespace_or_err(&self) -> Result<String, types::error::Error>;

    /// `namespace/name`, for logs.
    fn key(&self) -> String;

    fn volumes(&self) -> &[corev1::Volume];

    /// Claim names of the volumes backed by a PersistentVolumeClaim, in declaration order.
    fn claim_names(&self) -> Vec<&str>;

    /// Summed requests of the regular containers.
    fn requests(&self) -> Resources;

    fn assigned_node(&self) -> Option<&str>;

    fn phase(&self) -> Option<&str>;

    /// Whether the pod still waits to be placed, seen from `node_name`.
    /// A pod already assigned to `node_name` is accounted for by the
    /// scheduler itself and never waits on it.
    fn awaits_placement_on(&self, node_name: &str) -> bool {
        match self.assigned_node() {
            None => true,
            Some(assigned) => assigned != node_name && self.phase() == Some(PHASE_PENDING),
        }
    }
}

impl PodExt for corev1::Pod {
    fn namespace_or_err(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    fn key(&self) -> String {
        format!(
            "{}/{}",
            ResourceExt::namespace(self).unwrap_or_default(),
            self.name_any()
        )
    }

    fn volumes(&self) -> &[corev1::Volume] {
        self.spec
            .as_ref()
            .and_then(|s| s.volumes.as_deref())
            .unwrap_or_default()
    }

    fn claim_names(&self) -> Vec<&str> {
        self.volumes()
            .iter()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .map(|c| c.claim_name.as_str())
            .collect()
    }

    fn requests(&self) -> Resources {
        self.spec
            .as_ref()
            .map(|s| {
                s.containers
                    .iter()
                    .map(|c| {
                        Resources::from_list(c.resources.as_ref().and_then(|r| r.requests.as_ref()))
                    })
                    .sum::<Resources>()
            })
            .unwrap_or_default()
    }

    fn assigned_node(&self) -> Option<&str> {
        self.spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .filter(|n| !n.is_empty())
    }

    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }
}

pub trait NodeExt {
    fn allocatable(&self) -> Resources;

    /// Identifiers of the volumes attached to or in use on the node.
    fn attached_volume_ids(&self) -> Vec<&str>;
}

impl NodeExt for corev1::Node {
    fn allocatable(&self) -> Resources {
        Resources::from_list(self.status.as_ref().and_then(|s| s.allocatable.as_ref()))
    }

    fn attached_volume_ids(&self) -> Vec<&str> {
        let Some(status) = self.status.as_ref() else {
            return Vec::new();
        };

        let mut ids: Vec<&str> = status
            .volumes_attached
            .iter()
            .flatten()
            .map(|v| v.name.as_str())
            .chain(status.volumes_in_use.iter().flatten().map(String::as_str))
            .collect();
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));
        ids
    }
}

pub trait ClaimExt {
    fn is_bound(&self) -> bool;

    fn storage_class(&self) -> Option<&str>;

    /// Name of the volume the claim is bound to. `None` unless the claim is bound.
    fn bound_volume_name(&self) -> Option<&str>;
}

impl ClaimExt for corev1::PersistentVolumeClaim {
    fn is_bound(&self) -> bool {
        self.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(PHASE_BOUND)
    }

    fn storage_class(&self) -> Option<&str> {
        self.spec
            .as_ref()
            .and_then(|s| s.storage_class_name.as_deref())
    }

    fn bound_volume_name(&self) -> Option<&str> {
        if !self.is_bound() {
            return None;
        }
        self.spec
            .as_ref()
            .and_then(|s| s.volume_name.as_deref())
            .filter(|n| !n.is_empty())
    }
}
