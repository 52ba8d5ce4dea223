use axum::{extract::State, Json};
use std::sync::Arc;

use crate::facts::{gather, plan_commands, GatherOptions};
use crate::models::*;
use crate::runner::{self, DeviceTarget};
use crate::utils::is_valid_host;
use crate::AppState;

use super::ApiError;

/// Resolve gather_subset and list the command batch without contacting a device
pub async fn resolve_facts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let catalog = state.catalogs.get(req.platform);
    let run_set = catalog.resolve(req.gather_subset.as_deref())?;
    let opts = GatherOptions {
        config_format: req.config_format,
    };
    let commands = plan_commands(catalog, &run_set, &opts);

    Ok(Json(ResolveResponse {
        platform: req.platform,
        gather_subset: run_set.into_iter().collect(),
        commands,
    }))
}

/// Connect to a device and gather the requested fact subsets
pub async fn gather_facts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FactsRequest>,
) -> Result<Json<FactsResponse>, ApiError> {
    let host = req.host.trim();
    if host.is_empty() {
        return Err(ApiError::bad_request("host is required"));
    }
    if !is_valid_host(host) {
        return Err(ApiError::bad_request("invalid host: expected an IP address or hostname"));
    }

    // Subset errors are reported before any connection attempt
    let catalog = state.catalogs.get(req.platform);
    let run_set = catalog.resolve(req.gather_subset.as_deref())?;
    let opts = GatherOptions {
        config_format: req.config_format,
    };

    let cfg = &state.config;
    let target = DeviceTarget {
        host: host.to_string(),
        port: req.port.unwrap_or_else(|| cfg.default_port(req.platform)),
        username: req.username.clone().unwrap_or_else(|| cfg.default_ssh_user.clone()),
        password: req.password.clone().unwrap_or_else(|| cfg.default_ssh_pass.clone()),
        timeout_secs: cfg.ssh_timeout_secs,
        max_error_lines: cfg.max_output_lines,
    };

    let request_id = uuid::Uuid::new_v4();
    tracing::info!(
        "[{}] Gathering {} facts from {}:{} (subsets: {})",
        request_id,
        req.platform,
        target.host,
        target.port,
        run_set.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    let runner = runner::for_platform(req.platform, target);
    let started = std::time::Instant::now();
    let outcome = gather(catalog, &run_set, &opts, runner.as_ref())
        .await
        .map_err(|e| {
            tracing::warn!("[{}] Gather from {} failed: {:#}", request_id, host, e);
            ApiError::bad_gateway(format!("{:#}", e))
        })?;

    tracing::info!(
        "[{}] Collected {} facts from {} in {}ms ({} warnings)",
        request_id,
        outcome.facts.len(),
        host,
        started.elapsed().as_millis(),
        outcome.warnings.len()
    );

    Ok(Json(FactsResponse {
        ansible_facts: outcome.facts,
        warnings: outcome.warnings,
    }))
}
