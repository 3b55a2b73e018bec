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

//! Which node owns a local volume, according to its required node affinity.

use crate::cluster::{self, ClusterStateReader};
use crate::predicate::classifier::VolumeClassifier;
use crate::types;
use crate::types::k8s::{ClaimExt, PodExt};
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeSet;

pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Why a volume's node affinity does not name a node.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum AffinityError {
    #[snafu(display("volume '{}' has no node selector terms", volume))]
    NoTerms { volume: String },

    #[snafu(display("volume '{}' node selector term {} has no match expressions", volume, term))]
    NoExpressions { volume: String, term: usize },

    #[snafu(display("volume '{}' has a match expression without key", volume))]
    EmptyKey { volume: String },

    #[snafu(display("volume '{}' has no '{}' match expression", volume, HOSTNAME_LABEL))]
    NoHostname { volume: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("cannot resolve claim '{}': {}", claim, source))]
    Claim {
        claim: String,
        source: cluster::Error,
    },

    #[snafu(display("claim '{}' is not bound to a volume", claim))]
    UnboundClaim { claim: String },

    #[snafu(display("cannot resolve volume '{}': {}", volume, source))]
    Volume {
        volume: String,
        source: cluster::Error,
    },

    #[snafu(transparent)]
    Affinity { source: AffinityError },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

fn node_selector_terms(volume: &corev1::PersistentVolume) -> &[corev1::NodeSelectorTerm] {
    volume
        .spec
        .as_ref()
        .and_then(|s| s.node_affinity.as_ref())
        .and_then(|a| a.required.as_ref())
        .map(|r| r.node_selector_terms.as_slice())
        .unwrap_or_default()
}

/// Values of the first hostname expression of a term carrying at least one value.
fn hostname_values<'v>(
    volume: &str,
    index: usize,
    term: &'v corev1::NodeSelectorTerm,
) -> Result<Option<&'v [String]>, AffinityError> {
    let expressions = term.match_expressions.as_deref().unwrap_or_default();
    if expressions.is_empty() {
        return NoExpressionsSnafu {
            volume,
            term: index,
        }
        .fail();
    }

    for expression in expressions {
        if expression.key.is_empty() {
            return EmptyKeySnafu { volume }.fail();
        }
        if expression.key == HOSTNAME_LABEL
            && let Some(values) = expression.values.as_deref()
            && !values.is_empty()
        {
            return Ok(Some(values));
        }
    }

    Ok(None)
}

pub struct AffinityResolver<'a> {
    cluster: &'a dyn ClusterStateReader,
}

impl<'a> AffinityResolver<'a> {
    pub fn new(cluster: &'a dyn ClusterStateReader) -> Self {
        Self { cluster }
    }

    /// The node named by the first term that carries a hostname expression.
    pub fn owning_node(volume: &corev1::PersistentVolume) -> Result<String, AffinityError> {
        let name = volume.name_any();
        let terms = node_selector_terms(volume);
        if terms.is_empty() {
            return NoTermsSnafu { volume: name }.fail();
        }

        for (index, term) in terms.iter().enumerate() {
            if let Some(first) = hostname_values(&name, index, term)?.and_then(|v| v.first()) {
                return Ok(first.clone());
            }
        }

        NoHostnameSnafu { volume: name }.fail()
    }

    /// Every hostname the volume's affinity admits. More than one means the
    /// volume cannot be pinned to a single node.
    pub fn owning_nodes(
        volume: &corev1::PersistentVolume,
    ) -> Result<BTreeSet<String>, AffinityError> {
        let name = volume.name_any();
        let terms = node_selector_terms(volume);
        if terms.is_empty() {
            return NoTermsSnafu { volume: name }.fail();
        }

        let mut nodes = BTreeSet::new();
        for (index, term) in terms.iter().enumerate() {
            if let Some(values) = hostname_values(&name, index, term)? {
                nodes.extend(values.iter().cloned());
            }
        }

        if nodes.is_empty() {
            return NoHostnameSnafu { volume: name }.fail();
        }
        Ok(nodes)
    }

    /// Nodes owning the local volumes mounted by `pod`.
    ///
    /// Claims bound to non-local volumes put no constraint on placement and
    /// are skipped. Any claim or volume that cannot be resolved fails the
    /// whole lookup: a partial answer could pin the pod to the wrong node.
    pub async fn owning_nodes_of_pod(&self, pod: &corev1::Pod) -> Result<BTreeSet<String>, Error> {
        let namespace = pod.namespace_or_err()?;

        let mut nodes = BTreeSet::new();
        for claim_name in pod.claim_names() {
            let claim = self
                .cluster
                .get_volume_claim(&namespace, claim_name)
                .await
                .context(ClaimSnafu { claim: claim_name })?;

            let volume_name = claim
                .bound_volume_name()
                .context(UnboundClaimSnafu { claim: claim_name })?;

            let volume = self
                .cluster
                .get_volume(volume_name)
                .await
                .context(VolumeSnafu {
                    volume: volume_name,
                })?;

            if !VolumeClassifier::is_local_volume(&volume) {
                continue;
            }

            nodes.extend(Self::owning_nodes(&volume)?);
        }

        Ok(nodes)
    }
}
