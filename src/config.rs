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

use crate::predicate::EngineOptions;
use crate::predicate::classifier::{ClaimScan, LOCAL_STORAGE_CLASS};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 12345;

#[derive(Args, Clone, Debug)]
pub struct ServerArgs {
    /// Port the extender listens on
    #[arg(long, env = "LOCALPV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to a single kubeconfig file. When unset the client is inferred
    /// from $KUBECONFIG (which may list several files), ~/.kube/config or the
    /// in-cluster service account.
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Storage class marking unbound claims that need node-local storage
    #[arg(long, env = "LOCALPV_STORAGE_CLASS", default_value = LOCAL_STORAGE_CLASS)]
    pub local_storage_class: String,

    /// Only count pods of this namespace when reserving capacity. All namespaces if unset.
    #[arg(long, env = "LOCALPV_POD_NAMESPACE")]
    pub pod_namespace: Option<String>,

    /// Deadline for one filter call, in milliseconds
    #[arg(long, env = "LOCALPV_EVALUATION_TIMEOUT_MS", default_value_t = 10_000)]
    pub evaluation_timeout: u64,

    /// How volumes without a claim are treated when classifying a pod
    #[arg(long, env = "LOCALPV_CLAIM_SCAN", value_enum, default_value_t = ClaimScan::default())]
    pub claim_scan: ClaimScan,
}

impl ServerArgs {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            local_storage_class: self.local_storage_class.clone(),
            pod_namespace: self.pod_namespace.clone().filter(|ns| !ns.is_empty()),
            claim_scan: self.claim_scan,
            evaluation_timeout: Duration::from_millis(self.evaluation_timeout),
        }
    }
}
