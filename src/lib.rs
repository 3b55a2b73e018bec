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

use crate::cluster::KubeClusterState;
use crate::config::ServerArgs;
use crate::predicate::PredicateEngine;
use crate::server::state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod cluster;
pub mod config;
pub mod predicate;
pub mod server;
pub mod types;


pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let cluster = KubeClusterState::connect(args.kubeconfig.as_deref()).await?;

    let options = args.engine_options();
    info!(
        "local storage class '{}', claim scan {}, pod namespace {}, timeout {:?}",
        options.local_storage_class,
        options.claim_scan,
        options.pod_namespace.as_deref().unwrap_or("<all>"),
        options.evaluation_timeout
    );

    let engine = PredicateEngine::new(Arc::new(cluster), options);
    server::run(args.port, AppState::new(engine)).await?;

    Ok(())
}
