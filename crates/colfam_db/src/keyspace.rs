//! Keyspace management pass-throughs.

use colfam_model::SchemaError;
use colfam_schema::{Replication, SchemaChange};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::Result;
use crate::session::Session;

pub fn create_keyspace_simple<S: Session + ?Sized>(session: &S, name: &str, replication_factor: u32) -> Result<()> {
    create_keyspace(session, name, Replication::Simple { replication_factor })
}

pub fn create_keyspace_network_topology<S: Session + ?Sized>(
    session: &S,
    name: &str,
    datacenters: &BTreeMap<String, u32>,
) -> Result<()> {
    create_keyspace(
        session,
        name,
        Replication::NetworkTopology {
            datacenters: datacenters.clone(),
        },
    )
}

pub fn drop_keyspace<S: Session + ?Sized>(session: &S, name: &str) -> Result<()> {
    validate_keyspace_name(name)?;
    let change = SchemaChange::DropKeyspace { name: name.to_string() };
    info!(keyspace = name, "{}", change);
    session.execute(&change.to_statement())?;
    Ok(())
}

fn create_keyspace<S: Session + ?Sized>(session: &S, name: &str, replication: Replication) -> Result<()> {
    validate_keyspace_name(name)?;
    let change = SchemaChange::CreateKeyspace {
        name: name.to_string(),
        replication,
    };
    info!(keyspace = name, "{}", change);
    session.execute(&change.to_statement())?;
    Ok(())
}

fn validate_keyspace_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SchemaError::invalid_name(name, "keyspace name is empty").into());
    }
    Ok(())
}
