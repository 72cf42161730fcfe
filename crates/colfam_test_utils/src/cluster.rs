//! In-memory stand-in for a cluster.

use colfam_db::{Session, SessionError, APPLIED_COLUMN};
use colfam_model::{ClusteringOrder, ColumnDescriptor, IndexTarget, TableDescriptor, TableName, TableOptions};
use colfam_mutation::{Capabilities, ServerVersion};
use colfam_protocol::{Row, RowSet, Statement, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::catalog::{catalog_value, default_options, to_table_options};
use crate::cql::{self, ColumnDef, Cql, DeleteClause, Literal, QualifiedName, SetClause};

/// A cluster that lives in a mutex.
///
/// DDL and DML are parsed and applied to in-memory tables, catalog options
/// are stored as text like a real catalog, and every statement received is
/// recorded. Metadata fetches are not recorded.
///
/// ```rust,ignore
/// let cluster = MemoryCluster::new().with_keyspace("cqlengine_test");
/// synchronize(&cluster, &table)?;
/// assert_eq!(cluster.execute_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<ClusterState>,
    server_version: Option<ServerVersion>,
}

#[derive(Debug, Default)]
struct ClusterState {
    keyspaces: BTreeMap<String, BTreeMap<String, String>>,
    tables: BTreeMap<QualifiedName, TableState>,
    log: Vec<Statement>,
}

#[derive(Debug, Clone)]
struct TableState {
    columns: Vec<ColumnDescriptor>,
    options: BTreeMap<String, String>,
    indexes: BTreeMap<String, IndexTarget>,
    rows: Vec<StoredRow>,
    statics: Vec<(Vec<Value>, BTreeMap<String, Value>)>,
}

#[derive(Debug, Clone)]
struct StoredRow {
    key: Vec<Value>,
    cells: BTreeMap<String, Value>,
}

type ApplyResult = Result<RowSet, String>;

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `version` to callers and mimic its prepend behavior.
    pub fn with_server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = Some(version);
        self
    }

    /// Create a keyspace without recording a statement.
    pub fn with_keyspace(self, name: &str) -> Self {
        self.lock()
            .keyspaces
            .insert(name.to_string(), [("class".to_string(), "SimpleStrategy".to_string())].into());
        self
    }

    pub fn has_keyspace(&self, name: &str) -> bool {
        self.lock().keyspaces.contains_key(name)
    }

    /// Every statement received, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.lock().log.clone()
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.lock().log.iter().map(|s| s.query.clone()).collect()
    }

    pub fn execute_count(&self) -> usize {
        self.lock().log.len()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Catalog options of a table, as text.
    pub fn table_options(&self, table: &TableName) -> Option<TableOptions> {
        self.lock()
            .tables
            .get(&key_of(table))
            .map(|t| to_table_options(&t.options))
    }

    /// Number of stored rows in a table.
    pub fn row_count(&self, table: &TableName) -> usize {
        self.lock().tables.get(&key_of(table)).map_or(0, |t| t.rows.len())
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        // A panicking test must not poison the cluster for the next assertion
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prepend_reversed(&self) -> bool {
        self.server_version
            .map(Capabilities::from_server_version)
            .unwrap_or_default()
            .is_prepend_reversed()
    }
}

impl Session for MemoryCluster {
    fn fetch_table_metadata(&self, table: &TableName) -> Result<Option<TableDescriptor>, SessionError> {
        let state = self.lock();
        let Some(stored) = state.tables.get(&key_of(table)) else {
            return Ok(None);
        };
        let mut builder = TableDescriptor::builder(table.keyspace.clone(), table.name.clone());
        if table.name != table.name.to_lowercase() {
            builder = builder.case_sensitive(table.name.clone());
        }
        builder
            .columns(stored.columns.iter().cloned())
            .options(to_table_options(&stored.options))
            .build()
            .map(Some)
            .map_err(|e| SessionError::Metadata {
                table: table.to_string(),
                reason: e.to_string(),
            })
    }

    fn fetch_index_metadata(&self, table: &TableName) -> Result<BTreeSet<IndexTarget>, SessionError> {
        Ok(self
            .lock()
            .tables
            .get(&key_of(table))
            .map(|t| t.indexes.values().cloned().collect())
            .unwrap_or_default())
    }

    fn execute(&self, statement: &Statement) -> Result<RowSet, SessionError> {
        let prepend_reversed = self.prepend_reversed();
        let mut state = self.lock();
        state.log.push(statement.clone());
        debug!(query = %statement.query, "MemoryCluster executing");

        let parsed = cql::parse(&statement.query, &statement.values)
            .map_err(|e| SessionError::query(&statement.query, e.to_string()))?;
        state
            .apply(parsed, prepend_reversed)
            .map_err(|message| SessionError::query(&statement.query, message))
    }

    fn server_version(&self) -> Option<ServerVersion> {
        self.server_version
    }
}

fn key_of(table: &TableName) -> QualifiedName {
    QualifiedName {
        keyspace: table.keyspace.clone(),
        name: table.name.clone(),
    }
}

impl ClusterState {
    fn apply(&mut self, statement: Cql, prepend_reversed: bool) -> ApplyResult {
        match statement {
            Cql::CreateKeyspace { name, replication } => {
                self.keyspaces.entry(name).or_insert(replication);
                Ok(RowSet::empty())
            }
            Cql::DropKeyspace { name } => {
                self.keyspaces.remove(&name);
                self.tables.retain(|key, _| key.keyspace != name);
                Ok(RowSet::empty())
            }
            Cql::CreateTable {
                table,
                columns,
                partition,
                clustering,
                orders,
                options,
            } => {
                if !self.keyspaces.contains_key(&table.keyspace) {
                    return Err(format!("Keyspace '{}' does not exist", table.keyspace));
                }
                if self.tables.contains_key(&table) {
                    return Ok(RowSet::empty());
                }
                let state = TableState::create(columns, &partition, &clustering, &orders, &options)?;
                self.tables.insert(table, state);
                Ok(RowSet::empty())
            }
            Cql::AlterAdd { table, column } => {
                let state = self.table_mut(&table)?;
                if state.column(&column.name).is_some() {
                    return Err(format!(
                        "Invalid column name {} because it conflicts with an existing column",
                        column.name
                    ));
                }
                state.columns.push(to_descriptor(column));
                Ok(RowSet::empty())
            }
            Cql::AlterOptions { table, options } => {
                let state = self.table_mut(&table)?;
                for (name, literal) in &options {
                    let value = catalog_value(name, literal)?;
                    state.options.insert(name.clone(), value);
                }
                Ok(RowSet::empty())
            }
            Cql::CreateIndex { table, name, target } => {
                let state = self.table_mut(&table)?;
                if state.indexes.contains_key(&name) {
                    return Ok(RowSet::empty());
                }
                let column = state
                    .column(&target.column)
                    .ok_or_else(|| format!("No column definition found for column {}", target.column))?;
                if column.column_type.is_counter() || !target.kind.is_valid_for(&column.column_type) {
                    return Err(format!("Cannot create {} index on {}", target.kind, column.column_type));
                }
                if state.indexes.values().any(|existing| *existing == target) {
                    return Err(format!("Index {} is a duplicate of an existing index", name));
                }
                state.indexes.insert(name, target);
                Ok(RowSet::empty())
            }
            Cql::DropTable { table } => {
                self.tables.remove(&table);
                Ok(RowSet::empty())
            }
            Cql::Insert {
                table,
                values,
                if_not_exists,
                ..
            } => self.table_mut(&table)?.insert(values, if_not_exists),
            Cql::Update {
                table,
                clauses,
                predicate,
                ..
            } => self.table_mut(&table)?.update(clauses, &predicate, prepend_reversed),
            Cql::Delete {
                table,
                targets,
                predicate,
                ..
            } => self.table_mut(&table)?.delete(targets, &predicate),
            Cql::Select {
                table,
                predicate,
                limit,
            } => self.table_mut(&table)?.select(&predicate, limit),
            Cql::Batch { statements, .. } => self.apply_batch(statements, prepend_reversed),
        }
    }

    /// All or nothing: a failed condition or a failing member leaves every table untouched.
    fn apply_batch(&mut self, statements: Vec<Cql>, prepend_reversed: bool) -> ApplyResult {
        let mut conditional = false;
        for statement in &statements {
            if let Cql::Insert {
                table,
                values,
                if_not_exists: true,
                ..
            } = statement
            {
                conditional = true;
                if let Some(existing) = self.table_mut(table)?.conflicting_row(values)? {
                    return Ok(RowSet::new(vec![existing]));
                }
            }
        }

        let snapshot = self.tables.clone();
        for statement in statements {
            if let Err(message) = self.apply(statement, prepend_reversed) {
                self.tables = snapshot;
                return Err(message);
            }
        }
        if conditional {
            Ok(RowSet::new(vec![Row::from_pairs([(APPLIED_COLUMN, Value::Boolean(true))])]))
        } else {
            Ok(RowSet::empty())
        }
    }

    fn table_mut(&mut self, table: &QualifiedName) -> Result<&mut TableState, String> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| format!("unconfigured table {}", table.name))
    }
}

fn to_descriptor(def: ColumnDef) -> ColumnDescriptor {
    let column = ColumnDescriptor::new(def.name, def.column_type);
    if def.is_static {
        column.static_column()
    } else {
        column
    }
}

impl TableState {
    fn create(
        defs: Vec<ColumnDef>,
        partition: &[String],
        clustering: &[String],
        orders: &BTreeMap<String, ClusteringOrder>,
        options: &[(String, Literal)],
    ) -> Result<Self, String> {
        if partition.is_empty() {
            return Err("No PRIMARY KEY specified".to_string());
        }
        let mut defs: Vec<Option<ColumnDef>> = defs.into_iter().map(Some).collect();
        let mut take = |name: &str| -> Result<ColumnDef, String> {
            defs.iter_mut()
                .find(|d| d.as_ref().is_some_and(|d| d.name == name))
                .and_then(Option::take)
                .ok_or_else(|| format!("Unknown definition {} referenced in PRIMARY KEY", name))
        };

        let mut columns = Vec::new();
        for name in partition {
            columns.push(to_descriptor(take(name.as_str())?).partition_key());
        }
        for name in clustering {
            let mut column = to_descriptor(take(name.as_str())?).primary_key();
            column.clustering_order = orders.get(name).copied().unwrap_or(ClusteringOrder::Asc);
            columns.push(column);
        }
        columns.extend(defs.into_iter().flatten().map(to_descriptor));

        let mut stored = default_options();
        for (name, literal) in options {
            stored.insert(name.clone(), catalog_value(name, literal)?);
        }

        Ok(Self {
            columns,
            options: stored,
            indexes: BTreeMap::new(),
            rows: Vec::new(),
            statics: Vec::new(),
        })
    }

    fn column(&self, db_name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.db_name == db_name)
    }

    fn partition_len(&self) -> usize {
        self.columns.iter().filter(|c| c.partition_key).count()
    }

    fn key_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Key values from `terms`, in key order. Only the first `len` key columns are required.
    fn key_from(&self, terms: &[(String, Value)], len: usize) -> Result<Vec<Value>, String> {
        self.key_columns()
            .into_iter()
            .take(len)
            .map(|column| {
                terms
                    .iter()
                    .find(|(c, _)| *c == column.db_name)
                    .map(|(_, v)| v.clone())
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| format!("Some primary key parts are missing: {}", column.db_name))
            })
            .collect()
    }

    fn row_index(&self, key: &[Value]) -> Option<usize> {
        self.rows.iter().position(|r| r.key == key)
    }

    fn statics_mut(&mut self, partition: &[Value]) -> &mut BTreeMap<String, Value> {
        let position = self.statics.iter().position(|(p, _)| p == partition);
        let index = match position {
            Some(index) => index,
            None => {
                self.statics.push((partition.to_vec(), BTreeMap::new()));
                self.statics.len() - 1
            }
        };
        &mut self.statics[index].1
    }

    fn row_mut(&mut self, key: Vec<Value>) -> &mut BTreeMap<String, Value> {
        let index = match self.row_index(&key) {
            Some(index) => index,
            None => {
                self.rows.push(StoredRow {
                    key,
                    cells: BTreeMap::new(),
                });
                self.rows.len() - 1
            }
        };
        &mut self.rows[index].cells
    }

    fn cells_for(&mut self, column: &str, key: &[Value], partition_len: usize) -> Result<&mut BTreeMap<String, Value>, String> {
        let is_static = self
            .column(column)
            .ok_or_else(|| format!("Undefined column name {}", column))?
            .is_static;
        if is_static {
            Ok(self.statics_mut(&key[..partition_len]))
        } else if key.len() < self.key_columns().len() {
            Err(format!("Missing mandatory PRIMARY KEY part for column {}", column))
        } else {
            Ok(self.row_mut(key.to_vec()))
        }
    }

    /// The `[applied] = false` answer when a row already holds the key of `values`.
    fn conflicting_row(&self, values: &[(String, Value)]) -> Result<Option<Row>, String> {
        let key = self.key_from(values, self.key_columns().len())?;
        Ok(self.row_index(&key).map(|index| {
            let existing = self.render_row(&self.rows[index]);
            let mut pairs = vec![(APPLIED_COLUMN.to_string(), Value::Boolean(false))];
            pairs.extend(existing.iter().map(|(k, v)| (k.to_string(), v.clone())));
            Row::from_pairs(pairs)
        }))
    }

    fn insert(&mut self, values: Vec<(String, Value)>, if_not_exists: bool) -> ApplyResult {
        if if_not_exists {
            if let Some(existing) = self.conflicting_row(&values)? {
                return Ok(RowSet::new(vec![existing]));
            }
        }
        let key = self.key_from(&values, self.key_columns().len())?;

        let partition_len = self.partition_len();
        self.row_mut(key.clone());
        for (column, value) in values {
            if self.column(&column).is_some_and(|c| c.primary_key) {
                continue;
            }
            let cells = self.cells_for(&column, &key, partition_len)?;
            store(cells, &column, Some(value));
        }

        if if_not_exists {
            Ok(RowSet::new(vec![Row::from_pairs([(APPLIED_COLUMN, Value::Boolean(true))])]))
        } else {
            Ok(RowSet::empty())
        }
    }

    fn update(&mut self, clauses: Vec<SetClause>, predicate: &[(String, Value)], prepend_reversed: bool) -> ApplyResult {
        let partition_len = self.partition_len();
        let static_only = clauses
            .iter()
            .all(|clause| self.column(clause_column(clause)).is_some_and(|c| c.is_static));
        let key_len = if static_only { partition_len } else { self.key_columns().len() };
        let key = self.key_from(predicate, key_len)?;

        for clause in clauses {
            let column = clause_column(&clause).to_string();
            let cells = self.cells_for(&column, &key, partition_len)?;
            let existing = cells.remove(&column);
            let updated = match clause {
                SetClause::Set(_, value) => Some(value),
                SetClause::Add(_, delta) => add_values(existing, delta)?,
                SetClause::Subtract(_, delta) => subtract_values(existing, delta)?,
                SetClause::Prepend(_, Value::List(mut items)) => {
                    if prepend_reversed {
                        items.reverse();
                    }
                    if let Some(Value::List(old)) = existing {
                        items.extend(old);
                    }
                    Some(Value::List(items))
                }
                SetClause::Prepend(_, other) => return Err(format!("Invalid prepend of {}", other.type_name())),
            };
            store(cells, &column, updated);
        }
        Ok(RowSet::empty())
    }

    fn delete(&mut self, targets: Vec<DeleteClause>, predicate: &[(String, Value)]) -> ApplyResult {
        let partition_len = self.partition_len();
        if targets.is_empty() {
            let partition = self.key_from(predicate, partition_len)?;
            let prefix: Vec<Value> = self
                .key_columns()
                .into_iter()
                .map_while(|c| predicate.iter().find(|(n, _)| *n == c.db_name).map(|(_, v)| v.clone()))
                .collect();
            self.rows.retain(|row| !row.key.starts_with(&prefix));
            if prefix.len() == partition_len {
                self.statics.retain(|(p, _)| *p != partition);
            }
            return Ok(RowSet::empty());
        }

        let all_static = targets.iter().all(|t| {
            let column = match t {
                DeleteClause::Column(c) | DeleteClause::MapKey(c, _) => c,
            };
            self.column(column).is_some_and(|c| c.is_static)
        });
        let key_len = if all_static { partition_len } else { self.key_columns().len() };
        let key = self.key_from(predicate, key_len)?;
        if !all_static && self.row_index(&key).is_none() {
            return Ok(RowSet::empty());
        }

        for target in targets {
            match target {
                DeleteClause::Column(column) => {
                    let cells = self.cells_for(&column, &key, partition_len)?;
                    cells.remove(&column);
                }
                DeleteClause::MapKey(column, map_key) => {
                    let cells = self.cells_for(&column, &key, partition_len)?;
                    if let Some(Value::Map(mut entries)) = cells.remove(&column) {
                        entries.retain(|(k, _)| *k != map_key);
                        store(cells, &column, Some(Value::Map(entries)));
                    }
                }
            }
        }
        Ok(RowSet::empty())
    }

    fn select(&mut self, predicate: &[(String, Value)], limit: Option<usize>) -> ApplyResult {
        let keys = self.key_columns();
        let partition_len = self.partition_len();
        let clustering_given = keys[partition_len..]
            .iter()
            .any(|k| predicate.iter().any(|(c, _)| *c == k.db_name));

        let mut matched: Vec<StoredRow> = self
            .rows
            .iter()
            .filter(|row| self.matches(row, predicate))
            .cloned()
            .collect();

        // A partition holding only static cells still answers with one row
        if !clustering_given {
            for (partition, cells) in &self.statics {
                let has_rows = self.rows.iter().any(|r| r.key.starts_with(partition));
                if has_rows || cells.is_empty() {
                    continue;
                }
                let mut key = partition.clone();
                key.resize(keys.len(), Value::Null);
                let row = StoredRow {
                    key,
                    cells: BTreeMap::new(),
                };
                if self.matches(&row, predicate) {
                    matched.push(row);
                }
            }
        }

        let orders: Vec<ClusteringOrder> = keys.iter().map(|k| k.clustering_order).collect();
        matched.sort_by(|a, b| {
            a.key
                .iter()
                .zip(&b.key)
                .zip(&orders)
                .map(|((x, y), order)| match order {
                    ClusteringOrder::Asc => compare_values(x, y),
                    ClusteringOrder::Desc => compare_values(y, x),
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let rows = matched
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| self.render_row(row))
            .collect();
        Ok(RowSet::new(rows))
    }

    fn matches(&self, row: &StoredRow, predicate: &[(String, Value)]) -> bool {
        predicate.iter().all(|(column, expected)| match self.cell(row, column) {
            Some(Value::Set(items)) | Some(Value::List(items)) => items.contains(expected),
            Some(value) => value == *expected,
            None => false,
        })
    }

    fn cell(&self, row: &StoredRow, column: &str) -> Option<Value> {
        let keys = self.key_columns();
        if let Some(index) = keys.iter().position(|k| k.db_name == column) {
            return row.key.get(index).cloned();
        }
        let partition = &row.key[..self.partition_len()];
        let is_static = self.column(column).is_some_and(|c| c.is_static);
        if is_static {
            self.statics
                .iter()
                .find(|(p, _)| p.as_slice() == partition)
                .and_then(|(_, cells)| cells.get(column).cloned())
        } else {
            row.cells.get(column).cloned()
        }
    }

    fn render_row(&self, row: &StoredRow) -> Row {
        Row::from_pairs(
            self.columns
                .iter()
                .map(|c| (c.db_name.clone(), self.cell(row, &c.db_name).unwrap_or(Value::Null))),
        )
    }
}

fn clause_column(clause: &SetClause) -> &str {
    match clause {
        SetClause::Set(c, _) | SetClause::Add(c, _) | SetClause::Subtract(c, _) | SetClause::Prepend(c, _) => c,
    }
}

/// Store a cell; nulls and empty collections are tombstones.
fn store(cells: &mut BTreeMap<String, Value>, column: &str, value: Option<Value>) {
    match value.map(normalize) {
        Some(Value::Null) | None => {
            cells.remove(column);
        }
        Some(Value::Set(items)) | Some(Value::List(items)) if items.is_empty() => {
            cells.remove(column);
        }
        Some(Value::Map(entries)) if entries.is_empty() => {
            cells.remove(column);
        }
        Some(value) => {
            cells.insert(column.to_string(), value);
        }
    }
}

/// Sets and maps are kept sorted, like the storage engine returns them.
fn normalize(value: Value) -> Value {
    match value {
        Value::Set(mut items) => {
            items.sort_by(compare_values);
            items.dedup();
            Value::Set(items)
        }
        Value::Map(mut entries) => {
            entries.sort_by(|a, b| compare_values(&a.0, &b.0));
            Value::Map(entries)
        }
        other => other,
    }
}

fn add_values(existing: Option<Value>, delta: Value) -> Result<Option<Value>, String> {
    let result = match (existing, delta) {
        (None, delta) => delta,
        (Some(Value::Set(mut items)), Value::Set(new)) => {
            items.extend(new);
            Value::Set(items)
        }
        (Some(Value::List(mut items)), Value::List(new)) => {
            items.extend(new);
            Value::List(items)
        }
        (Some(Value::Map(mut entries)), Value::Map(new)) => {
            for (key, value) in new {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
            }
            Value::Map(entries)
        }
        (Some(Value::BigInt(a)), Value::BigInt(b)) => Value::BigInt(a.wrapping_add(b)),
        (Some(existing), delta) => {
            return Err(format!("Invalid operation: {} + {}", existing.type_name(), delta.type_name()))
        }
    };
    Ok(Some(result))
}

fn subtract_values(existing: Option<Value>, delta: Value) -> Result<Option<Value>, String> {
    let result = match (existing, delta) {
        (None, Value::BigInt(b)) => Value::BigInt(b.wrapping_neg()),
        (None, _) => return Ok(None),
        (Some(Value::Set(mut items)), Value::Set(removed)) => {
            items.retain(|v| !removed.contains(v));
            Value::Set(items)
        }
        (Some(Value::List(mut items)), Value::List(removed)) => {
            items.retain(|v| !removed.contains(v));
            Value::List(items)
        }
        (Some(Value::BigInt(a)), Value::BigInt(b)) => Value::BigInt(a.wrapping_sub(b)),
        (Some(existing), delta) => {
            return Err(format!("Invalid operation: {} - {}", existing.type_name(), delta.type_name()))
        }
    };
    Ok(Some(result))
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Uuid(x), Value::Uuid(y)) => x.cmp(y),
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}
