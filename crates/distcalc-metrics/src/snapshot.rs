// Copyright 2025 distcalc Authors
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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of distcalc server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Worker,
    Orchestrator,
}

/// Server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_type: ServerType,
    pub version: String,
    pub uptime_ms: u64,
}

impl ServerInfo {
    pub fn new(server_type: ServerType, uptime_ms: u64) -> Self {
        Self {
            server_type,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_ms,
        }
    }
}

/// Metrics for a single method (or operator, on workers)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodMetrics {
    pub call_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
}

/// Requests dispatched to one worker (orchestrator only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerMetrics {
    pub worker_addr: String,
    pub request_count: u64,
    pub last_request_ms: u64,
}

/// Complete metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub uptime_ms: u64,
    pub methods: HashMap<String, MethodMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<HashMap<String, WorkerMetrics>>,
}
