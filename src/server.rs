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

//! HTTP surface of the extender.

use crate::server::state::AppState;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use snafu::{ResultExt, Snafu};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod handlers;
pub mod routes;
pub mod state;

pub const PREDICATES_PATH_PREFIX: &str = "/scheduler/predicates";
pub const LOCAL_PV_PREDICATE_PATH: &str = const_str::concat!(PREDICATES_PATH_PREFIX, "/localpv");

// Filter calls carry whole node objects; large clusters send several MiB.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to bind {}: {}", addr, source))]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[snafu(display("server error: {}", source))]
    Serve { source: std::io::Error },
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(ready_check))
        .nest(PREDICATES_PATH_PREFIX, routes::predicate_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(port: u16, state: AppState) -> Result<(), Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(BindSnafu { addr })?;

    info!("extender listening on http://{}", addr);
    info!("  - POST {}", LOCAL_PV_PREDICATE_PATH);
    info!("  - GET  /healthz");
    info!("  - GET  /readyz");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(ServeSnafu)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.cluster().list_nodes().await {
        Ok(_) => (StatusCode::OK, "Ready"),
        Err(e) => {
            warn!("not ready: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::ClusterSnapshot;
    use crate::predicate::{
        EVALUATION_TIMED_OUT, EngineOptions, NODE_NOT_FOUND, NOT_OWNING_NODE, PredicateEngine,
    };
    use crate::tests::{Stalled, bound_claim, local_volume, node, pod};
    use crate::types::v1::extender::{ExtenderArgs, ExtenderFilterResult, NodeList};
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let cluster = ClusterSnapshot::new()
            .with_node(node("node-a", "8", "16Gi", &[]))
            .with_node(node("node-b", "8", "16Gi", &[]))
            .with_volume(local_volume("pv-b", &[&["node-b"]]))
            .with_claim(bound_claim("default", "data-web-0", "pv-b"));
        let engine = PredicateEngine::new(Arc::new(cluster), EngineOptions::default());
        router(AppState::new(engine))
    }

    async fn call(app: Router, method: Method, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn filter(args: &ExtenderArgs) -> ExtenderFilterResult {
        let (status, body) = call(
            app(),
            Method::POST,
            LOCAL_PV_PREDICATE_PATH,
            Body::from(serde_json::to_vec(args).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_predicate_path() {
        assert_eq!(LOCAL_PV_PREDICATE_PATH, "/scheduler/predicates/localpv");
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (status, body) = call(app(), Method::GET, "/healthz", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");

        let (status, body) = call(app(), Method::GET, "/readyz", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Ready");
    }

    #[tokio::test]
    async fn test_filter_with_nodes() {
        let result = filter(&ExtenderArgs {
            pod: Some(pod("default", "web-0", "1", "1Gi", &["data-web-0"])),
            nodes: Some(NodeList {
                items: vec![
                    node("node-a", "8", "16Gi", &[]),
                    node("node-b", "8", "16Gi", &[]),
                ],
            }),
            node_names: None,
        })
        .await;

        let feasible: Vec<String> = result
            .nodes
            .unwrap()
            .items
            .iter()
            .map(|n| n.metadata.name.clone().unwrap())
            .collect();
        assert_eq!(feasible, vec!["node-b"]);
        assert_eq!(result.node_names, None);
        assert_eq!(result.failed_nodes.get("node-a").unwrap(), NOT_OWNING_NODE);
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_filter_with_node_names() {
        let result = filter(&ExtenderArgs {
            pod: Some(pod("default", "p", "1", "1Gi", &[])),
            nodes: None,
            node_names: Some(vec![
                "node-b".to_string(),
                "node-z".to_string(),
                "node-a".to_string(),
            ]),
        })
        .await;

        assert_eq!(result.nodes, None);
        assert_eq!(
            result.node_names.unwrap(),
            vec!["node-b".to_string(), "node-a".to_string()]
        );
        assert_eq!(result.failed_nodes.get("node-z").unwrap(), NODE_NOT_FOUND);
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_filter_with_duplicate_node_names() {
        let result = filter(&ExtenderArgs {
            pod: Some(pod("default", "p", "1", "1Gi", &[])),
            nodes: None,
            node_names: Some(vec![
                "node-a".to_string(),
                "node-a".to_string(),
                "node-b".to_string(),
            ]),
        })
        .await;

        assert_eq!(
            result.node_names.unwrap(),
            vec!["node-a".to_string(), "node-b".to_string()]
        );
        assert!(result.failed_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_node_name_lookups_share_the_deadline() {
        let engine = PredicateEngine::new(
            Arc::new(Stalled),
            EngineOptions {
                evaluation_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let args = ExtenderArgs {
            pod: Some(pod("default", "p", "1", "1Gi", &[])),
            nodes: None,
            node_names: Some(vec!["node-a".to_string(), "node-b".to_string()]),
        };

        let (status, body) = tokio::time::timeout(
            Duration::from_secs(5),
            call(
                router(AppState::new(engine)),
                Method::POST,
                LOCAL_PV_PREDICATE_PATH,
                Body::from(serde_json::to_vec(&args).unwrap()),
            ),
        )
        .await
        .expect("filter call should finish once the evaluation deadline expires");
        assert_eq!(status, StatusCode::OK);

        let result: ExtenderFilterResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(result.node_names, Some(Vec::new()));
        assert_eq!(result.failed_nodes.len(), 2);
        assert!(result.failed_nodes.values().all(|r| r == EVALUATION_TIMED_OUT));
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_no_feasible_node_is_not_an_error() {
        let result = filter(&ExtenderArgs {
            pod: Some(pod("default", "web-0", "1", "1Gi", &["data-web-0"])),
            nodes: Some(NodeList {
                items: vec![node("node-a", "8", "16Gi", &[])],
            }),
            node_names: None,
        })
        .await;

        assert!(result.nodes.unwrap().items.is_empty());
        assert_eq!(result.failed_nodes.len(), 1);
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let (status, body) = call(
            app(),
            Method::POST,
            LOCAL_PV_PREDICATE_PATH,
            Body::from("{not json"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let result: ExtenderFilterResult = serde_json::from_slice(&body).unwrap();
        assert!(!result.error.is_empty());
        assert_eq!(result.nodes, None);
        assert!(result.failed_nodes.is_empty());

        let without_pod = filter(&ExtenderArgs {
            pod: None,
            nodes: Some(NodeList::default()),
            node_names: None,
        })
        .await;
        assert!(!without_pod.error.is_empty());

        let without_nodes = filter(&ExtenderArgs {
            pod: Some(pod("default", "p", "1", "1Gi", &[])),
            nodes: None,
            node_names: None,
        })
        .await;
        assert!(!without_nodes.error.is_empty());
        assert_eq!(without_nodes.node_names, None);
    }

    #[tokio::test]
    async fn test_predicate_requires_post() {
        let (status, _) = call(app(), Method::GET, LOCAL_PV_PREDICATE_PATH, Body::empty()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
