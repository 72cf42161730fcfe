//! Catalog option storage.
//!
//! Options are kept the way a real catalog reports them: every value as
//! text, maps as JSON objects, compaction and compression classes fully
//! qualified.

use colfam_model::{option_kind, OptionValue, TableOptions};
use std::collections::BTreeMap;

use crate::cql::Literal;

const COMPACTION_PACKAGE: &str = "org.apache.cassandra.db.compaction.";
const COMPRESSION_PACKAGE: &str = "org.apache.cassandra.io.compress.";

/// Options every new table starts with.
pub fn default_options() -> BTreeMap<String, String> {
    [
        ("bloom_filter_fp_chance", "0.01"),
        ("caching", r#"{"keys":"ALL","rows_per_partition":"NONE"}"#),
        ("comment", ""),
        (
            "compaction",
            r#"{"class":"org.apache.cassandra.db.compaction.SizeTieredCompactionStrategy","max_threshold":"32","min_threshold":"4"}"#,
        ),
        (
            "compression",
            r#"{"chunk_length_in_kb":"64","class":"org.apache.cassandra.io.compress.LZ4Compressor"}"#,
        ),
        ("crc_check_chance", "1.0"),
        ("dclocal_read_repair_chance", "0.1"),
        ("default_time_to_live", "0"),
        ("gc_grace_seconds", "864000"),
        ("max_index_interval", "2048"),
        ("memtable_flush_period_in_ms", "0"),
        ("min_index_interval", "128"),
        ("read_repair_chance", "0.0"),
        ("speculative_retry", "99PERCENTILE"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Catalog text for an option literal, or the server's rejection message.
pub fn catalog_value(name: &str, literal: &Literal) -> Result<String, String> {
    if option_kind(name).is_none() {
        return Err(format!("Unknown property '{}'", name));
    }
    match literal {
        Literal::Text(s) | Literal::Number(s) => Ok(s.clone()),
        Literal::Map(map) => {
            let mut map = map.clone();
            let package = match name {
                "compaction" => Some(COMPACTION_PACKAGE),
                "compression" => Some(COMPRESSION_PACKAGE),
                _ => None,
            };
            if let (Some(package), Some(class)) = (package, map.get_mut("class")) {
                if !class.contains('.') {
                    *class = format!("{}{}", package, class);
                }
            }
            serde_json::to_string(&map).map_err(|e| e.to_string())
        }
    }
}

/// Stored options as the catalog would return them.
pub fn to_table_options(options: &BTreeMap<String, String>) -> TableOptions {
    options
        .iter()
        .map(|(k, v)| (k.clone(), OptionValue::Text(v.clone())))
        .collect()
}
