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

//! Filter request and response bodies exchanged with kube-scheduler.
//!
//! https://github.com/kubernetes/kube-scheduler/blob/master/extender/v1/types.go

use crate::predicate::Decision;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node list as sent by the scheduler. Only `items` is read; `apiVersion`,
/// `kind` and list metadata may be absent.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<corev1::Node>,
}

/// Arguments of a filter call.
///
/// A scheduler configured with `nodeCacheCapable: true` sends `nodenames`
/// instead of full `nodes`.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtenderArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<corev1::Pod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeList>,

    #[serde(default, rename = "nodenames", skip_serializing_if = "Option::is_none")]
    pub node_names: Option<Vec<String>>,
}

/// Result of a filter call.
///
/// `error` reports a request that could not be evaluated at all. It is left
/// empty whenever evaluation completed, including when no node is feasible.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtenderFilterResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeList>,

    #[serde(default, rename = "nodenames", skip_serializing_if = "Option::is_none")]
    pub node_names: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_nodes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ExtenderFilterResult {
    /// Response for a request that carried full node objects.
    pub fn with_nodes(decision: Decision) -> Self {
        Self {
            nodes: Some(NodeList {
                items: decision.feasible,
            }),
            node_names: None,
            failed_nodes: decision.infeasible,
            error: String::new(),
        }
    }

    /// Response for a request that carried node names only.
    pub fn with_node_names(decision: Decision) -> Self {
        Self {
            nodes: None,
            node_names: Some(decision.feasible.iter().map(|n| n.name_any()).collect()),
            failed_nodes: decision.infeasible,
            error: String::new(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::node;

    #[test]
    fn test_decode_scheduler_args() {
        let body = r#"{
            "pod": {"metadata": {"name": "web-0", "namespace": "default"}},
            "nodes": {"metadata": {}, "items": [{"metadata": {"name": "node-a"}}]}
        }"#;

        let args: ExtenderArgs = serde_json::from_str(body).expect("Should decode args");

        assert_eq!(
            args.pod.expect("Should carry a pod").metadata.name.as_deref(),
            Some("web-0")
        );
        let nodes = args.nodes.expect("Should carry nodes");
        assert_eq!(nodes.items.len(), 1);
        assert_eq!(nodes.items[0].metadata.name.as_deref(), Some("node-a"));
        assert!(args.node_names.is_none());
    }

    #[test]
    fn test_decode_node_names_args() {
        let body = r#"{"pod": {"metadata": {"name": "web-0"}}, "nodenames": ["node-a", "node-b"]}"#;

        let args: ExtenderArgs = serde_json::from_str(body).expect("Should decode args");

        assert!(args.nodes.is_none());
        assert_eq!(
            args.node_names,
            Some(vec!["node-a".to_string(), "node-b".to_string()])
        );
    }

    #[test]
    fn test_result_omits_error_when_evaluated() {
        let decision = Decision {
            feasible: Vec::new(),
            infeasible: [("node-a".to_string(), "no room".to_string())]
                .into_iter()
                .collect(),
        };

        let json = serde_json::to_value(ExtenderFilterResult::with_nodes(decision)).unwrap();

        assert!(json.get("error").is_none(), "error must stay unset: {json}");
        assert_eq!(json["nodes"]["items"], serde_json::json!([]));
        assert_eq!(json["failedNodes"]["node-a"], "no room");
    }

    #[test]
    fn test_result_with_node_names() {
        let decision = Decision {
            feasible: vec![node("node-b", "8", "16Gi", &[])],
            infeasible: BTreeMap::new(),
        };

        let result = ExtenderFilterResult::with_node_names(decision);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["nodenames"], serde_json::json!(["node-b"]));
        assert!(json.get("nodes").is_none());
        assert!(json.get("failedNodes").is_none());
    }

    #[test]
    fn test_malformed_result_has_no_node_fields() {
        let json = serde_json::to_value(ExtenderFilterResult::malformed("bad body")).unwrap();

        assert_eq!(json, serde_json::json!({"error": "bad body"}));
    }
}
