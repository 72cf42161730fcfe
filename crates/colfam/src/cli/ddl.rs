//! `colfam ddl`: creation statements for a model.

use anyhow::Result;
use colfam_schema::reconcile;
use std::path::PathBuf;

use crate::cli::config::ColfamConfig;
use crate::cli::load_model;

#[derive(Debug)]
pub struct DdlArgs {
    pub model: PathBuf,
}

pub fn run(args: DdlArgs, config: &ColfamConfig) -> Result<()> {
    print!("{}", render(&args, config)?);
    Ok(())
}

fn render(args: &DdlArgs, config: &ColfamConfig) -> Result<String> {
    let desired = load_model(&args.model, config)?;
    let plan = reconcile(&desired, None)?;
    Ok(plan
        .statements()
        .iter()
        .map(|statement| format!("{};\n", statement.query))
        .collect())
}
