use std::time::Duration;

use agency_facade::Agency;
use agency_routes::{Route, add_levels_for_dbs};
use agency_store::StoreClient;
use serde_json::Value;

use super::print_json;
use crate::Format;

pub fn get(agency: &Agency, path: &str, recursive: bool) -> anyhow::Result<()> {
    let value = agency.store().get(path, recursive)?;
    print_json(&value)
}

pub fn set(agency: &Agency, path: &str, raw: &str, ttl: Option<u64>) -> anyhow::Result<()> {
    let value = parse_value(raw);
    agency
        .store()
        .set(path, value, ttl.map(Duration::from_secs))?;
    println!("✓ {path} written");
    Ok(())
}

pub fn rm(agency: &Agency, path: &str, recursive: bool) -> anyhow::Result<()> {
    agency.store().remove(path, recursive)?;
    println!("✓ {path} removed");
    Ok(())
}

pub fn routes(agency: &Agency, collections: bool, format: Format) -> anyhow::Result<()> {
    let mut paths: Vec<(String, String)> = agency
        .routes()
        .paths()
        .into_iter()
        .map(|(name, path)| (name.to_string(), path))
        .collect();
    if collections {
        let bound = add_levels_for_dbs(&agency.routes().target.collections)?;
        for database in bound.databases() {
            for (id, route) in bound.collections(database) {
                paths.push((
                    format!("target.collections.{database}.{id}"),
                    route.path().to_string(),
                ));
            }
        }
    }

    match format {
        Format::Json => print_json(&paths),
        Format::Text => {
            let width = paths.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, path) in &paths {
                println!("{name:<width$}  {path}");
            }
            Ok(())
        }
    }
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
