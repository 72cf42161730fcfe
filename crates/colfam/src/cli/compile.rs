//! `colfam compile`: show the statements a mutation compiles to.

use anyhow::{bail, Result};
use clap::Args;
use colfam_model::TableDescriptor;
use colfam_mutation::{
    Capabilities, CompiledStatement, MutationCompiler, MutationIntent, Predicate, ServerVersion, WriteOptions,
};
use colfam_protocol::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::cli::config::ColfamConfig;
use crate::cli::error::HelpfulError;
use crate::cli::load_model;

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Model file (TOML)
    pub model: PathBuf,

    /// Key term selecting the row, as column=value (repeatable)
    #[arg(short = 'w', long = "where", value_name = "COLUMN=VALUE", required = true)]
    pub where_terms: Vec<String>,

    /// Assignment, as column=value or column__op=value (repeatable).
    /// Values are parsed as JSON when possible, otherwise taken as text.
    #[arg(short = 's', long = "set", value_name = "COLUMN=VALUE")]
    pub set: Vec<String>,

    /// Compile a full-row insert instead of an update
    #[arg(long, conflicts_with = "delete")]
    pub insert: bool,

    /// Compile a row delete
    #[arg(long)]
    pub delete: bool,

    /// TTL in seconds
    #[arg(long)]
    pub ttl: Option<u32>,

    /// Write timestamp in microseconds
    #[arg(long)]
    pub timestamp: Option<i64>,

    /// Insert only if the row does not exist
    #[arg(long, requires = "insert")]
    pub if_not_exists: bool,

    /// Server release to compile for [default: from config, else latest]
    #[arg(long)]
    pub server_version: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CompileArgs, config: &ColfamConfig) -> Result<()> {
    print!("{}", render(&args, config)?);
    Ok(())
}

fn render(args: &CompileArgs, config: &ColfamConfig) -> Result<String> {
    let table = load_model(&args.model, config)?;
    let compiled = compile(args, config, &table)?;

    if args.json {
        let statements: Vec<serde_json::Value> = compiled
            .to_statements()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "query": s.query,
                    "values": s.values.iter().map(Value::to_json).collect::<Vec<_>>(),
                })
            })
            .collect();
        return Ok(format!("{}\n", serde_json::to_string_pretty(&statements)?));
    }
    Ok(compiled.to_string())
}

fn compile(args: &CompileArgs, config: &ColfamConfig, table: &TableDescriptor) -> Result<CompiledStatement> {
    let capabilities = capabilities(args.server_version.as_deref().or(config.server_version.as_deref()))?;
    let compiler = MutationCompiler::new(table).with_capabilities(capabilities);

    let mut options = WriteOptions::new();
    if let Some(ttl) = args.ttl {
        options = options.ttl(ttl);
    }
    if let Some(timestamp) = args.timestamp {
        options = options.timestamp(timestamp);
    }
    if args.if_not_exists {
        options = options.if_not_exists();
    }

    let key = args
        .where_terms
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;
    let assignments = args
        .set
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;
    debug!(table = %table.table, keys = key.len(), assignments = assignments.len(), "Compiling");

    if args.delete {
        if !assignments.is_empty() {
            bail!("--delete removes whole rows; drop the --set arguments or set columns to null instead");
        }
        return Ok(compiler.compile_delete(&key.into_iter().collect(), &options)?);
    }

    if args.insert {
        let values: Vec<(String, Value)> = key.into_iter().chain(assignments).collect();
        return Ok(compiler.compile_insert(&values, &options)?);
    }

    let intents = assignments
        .into_iter()
        .map(|(column, value)| MutationIntent::parse(&column, value))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let predicate: Predicate = key.into_iter().collect();
    Ok(compiler.compile_update(&intents, &predicate, &options)?)
}

fn capabilities(version: Option<&str>) -> Result<Capabilities> {
    match version {
        None => Ok(Capabilities::default()),
        Some(raw) => {
            let version: ServerVersion = raw.parse().map_err(|_| HelpfulError::invalid_server_version(raw))?;
            Ok(Capabilities::from_server_version(version))
        }
    }
}

/// Split `column=value`. The value is JSON if it parses, text otherwise.
fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((column, value)) = raw.split_once('=') else {
        return Err(HelpfulError::invalid_assignment(raw).into());
    };
    let column = column.trim();
    if column.is_empty() {
        return Err(HelpfulError::invalid_assignment(raw).into());
    }
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::Text(value.to_string()),
    };
    Ok((column.to_string(), value))
}
