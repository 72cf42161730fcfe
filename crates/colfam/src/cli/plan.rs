//! `colfam plan`: reconcile a model against a live snapshot.

use anyhow::{Context, Result};
use colfam_schema::{reconcile, ExecutionPlan, LiveTable};
use std::path::PathBuf;

use crate::cli::config::ColfamConfig;
use crate::cli::{load_model, read_spec};

#[derive(Debug)]
pub struct PlanArgs {
    pub model: PathBuf,
    pub live: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: PlanArgs, config: &ColfamConfig) -> Result<()> {
    print!("{}", render(&args, config)?);
    Ok(())
}

fn render(args: &PlanArgs, config: &ColfamConfig) -> Result<String> {
    let desired = load_model(&args.model, config)?;

    let live = match &args.live {
        Some(path) => {
            let spec = read_spec(path)?;
            let indexes = spec.live_indexes();
            let descriptor = spec
                .into_descriptor(&config.default_keyspace)
                .with_context(|| format!("Invalid snapshot in {}", path.display()))?;
            Some(LiveTable::new(descriptor, indexes))
        }
        None => None,
    };

    let plan = reconcile(&desired, live.as_ref())?;
    if args.json {
        Ok(format!("{}\n", serde_json::to_string_pretty(&plan_json(&plan))?))
    } else {
        Ok(plan.to_string())
    }
}

pub fn plan_json(plan: &ExecutionPlan) -> serde_json::Value {
    serde_json::json!({
        "changes": plan.iter().map(|change| serde_json::json!({
            "description": change.to_string(),
            "cql": change.to_cql(),
        })).collect::<Vec<_>>(),
        "drift": plan.drift.iter().map(|d| serde_json::json!({
            "column": d.column,
            "desired": d.desired,
            "live": d.live,
        })).collect::<Vec<_>>(),
    })
}
