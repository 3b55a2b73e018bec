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

use crate::predicate::log_decision;
use crate::server::state::AppState;
use crate::types::k8s::PodExt;
use crate::types::v1::extender::{ExtenderArgs, ExtenderFilterResult};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use tracing::{info, warn};

/// Filter a pod's candidate nodes.
///
/// Always answers 200: a request that cannot be evaluated is reported in the
/// result's `error` field, as kube-scheduler expects.
pub async fn filter_local_pv(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<ExtenderFilterResult> {
    let args: ExtenderArgs = match serde_json::from_slice(&body) {
        Ok(args) => args,
        Err(e) => {
            warn!("undecodable filter request: {}", e);
            return Json(ExtenderFilterResult::malformed(format!(
                "cannot decode extender args: {e}"
            )));
        }
    };

    let Some(pod) = args.pod else {
        warn!("filter request without pod");
        return Json(ExtenderFilterResult::malformed("extender args carry no pod"));
    };

    let result = match (args.nodes, args.node_names) {
        (Some(nodes), _) => {
            info!("pod {}: filtering {} nodes", pod.key(), nodes.items.len());
            let decision = state.engine.filter(&pod, &nodes.items).await;
            log_decision(&pod, &decision);
            ExtenderFilterResult::with_nodes(decision)
        }
        (None, Some(names)) => {
            info!("pod {}: filtering {} node names", pod.key(), names.len());
            let decision = state.engine.filter_names(&pod, &names).await;
            log_decision(&pod, &decision);
            ExtenderFilterResult::with_node_names(decision)
        }
        (None, None) => {
            warn!("pod {}: filter request without nodes", pod.key());
            ExtenderFilterResult::malformed("extender args carry neither nodes nor nodenames")
        }
    };

    Json(result)
}
