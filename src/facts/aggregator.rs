use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::{namespace_facts, Catalog, FactMap, GatherOptions, Responses, RunSet};
use crate::runner::{CommandOutput, CommandRunner};

/// Namespaced facts plus non-fatal problems hit while collecting them
#[derive(Debug, Default)]
pub struct GatherOutcome {
    pub facts: FactMap,
    pub warnings: Vec<String>,
}

/// Commands needed for a RunSet, in catalog order, each listed once
pub fn plan_commands(catalog: &Catalog, run_set: &RunSet, opts: &GatherOptions) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut batch = Vec::new();
    for subset in catalog.selected(run_set) {
        for command in subset.commands(opts) {
            if seen.insert(command.clone()) {
                batch.push(command);
            }
        }
    }
    batch
}

/// Run every selected subset's commands in one batch and merge the facts.
///
/// Every selected subset is populated, failed commands included. A subset
/// whose extractor errors (typically on a failed command it needs) is
/// skipped with a warning; the remaining subsets still contribute. Colliding keys are
/// overwritten in catalog order.
pub async fn gather(
    catalog: &Catalog,
    run_set: &RunSet,
    opts: &GatherOptions,
    runner: &dyn CommandRunner,
) -> Result<GatherOutcome> {
    let batch = plan_commands(catalog, run_set, opts);
    tracing::debug!(
        "Running {} commands for subsets [{}]",
        batch.len(),
        run_set.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    let outputs = if batch.is_empty() {
        Vec::new()
    } else {
        runner.run(&batch).await?
    };
    if outputs.len() != batch.len() {
        bail!(
            "runner returned {} replies for {} commands",
            outputs.len(),
            batch.len()
        );
    }

    let replies: HashMap<&str, &CommandOutput> = batch
        .iter()
        .map(|c| c.as_str())
        .zip(outputs.iter())
        .collect();

    let mut facts = FactMap::new();
    let mut warnings = Vec::new();

    facts.insert(
        "gather_subset".to_string(),
        Value::Array(run_set.iter().cloned().map(Value::String).collect()),
    );

    for subset in catalog.selected(run_set) {
        let commands = subset.commands(opts);
        let mut responses = Responses::new();
        for command in &commands {
            match replies.get(command.as_str()) {
                Some(Ok(reply)) => responses.insert(command, reply),
                Some(Err(e)) => responses.insert_failure(command, e),
                None => {}
            }
        }

        // Extractors see failed commands too; a subset that needs the
        // failed reply errors out and is skipped
        match subset.populate(&responses, opts) {
            Ok(contribution) => facts.extend(contribution),
            Err(e) => {
                tracing::warn!("Skipping subset {}: {:#}", subset.name(), e);
                warnings.push(format!("subset {} skipped: {:#}", subset.name(), e));
            }
        }
    }

    Ok(GatherOutcome {
        facts: namespace_facts(facts),
        warnings,
    })
}
