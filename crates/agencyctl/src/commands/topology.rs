use agency_facade::{Agency, Scope};
use agency_routes::ReadOnlyRoute;
use agency_topology::DatabaseView;

use super::print_json;
use crate::Format;

fn select(agency: &Agency, scope: Scope, database: &str) -> anyhow::Result<DatabaseView<ReadOnlyRoute>> {
    agency
        .databases(scope)
        .select(database)?
        .ok_or_else(|| anyhow::anyhow!("unknown database {database} in {scope}"))
}

pub fn databases(agency: &Agency, scope: Scope, format: Format) -> anyhow::Result<()> {
    let names = agency.databases(scope).get_list()?;
    match format {
        Format::Json => print_json(&names),
        Format::Text => {
            for name in &names {
                println!("{name}");
            }
            Ok(())
        }
    }
}

pub fn collections(agency: &Agency, scope: Scope, database: &str, format: Format) -> anyhow::Result<()> {
    let names = select(agency, scope, database)?.get_collections()?;
    match format {
        Format::Json => print_json(&names),
        Format::Text => {
            for name in &names {
                println!("{name}");
            }
            Ok(())
        }
    }
}

pub fn shards(
    agency: &Agency,
    scope: Scope,
    database: &str,
    collection: &str,
    server: Option<&str>,
    format: Format,
) -> anyhow::Result<()> {
    let mut db = select(agency, scope, database)?;
    let view = db
        .collection(collection)?
        .ok_or_else(|| anyhow::anyhow!("unknown collection {database}/{collection} in {scope}"))?;

    let mut shards = view.get_shards()?;
    if let Some(server) = server {
        let held = view.get_shards_for_server(server)?;
        shards.retain(|shard, _| held.contains(shard));
    }

    match format {
        Format::Json => print_json(&shards),
        Format::Text => {
            for (shard, servers) in &shards {
                match servers.split_first() {
                    Some((leader, followers)) => {
                        println!(
                            "{:<10} leader={leader} followers={}",
                            shard.as_str(),
                            followers.join(",")
                        )
                    }
                    None => println!("{:<10} (no servers)", shard.as_str()),
                }
            }
            Ok(())
        }
    }
}

pub fn move_shard(
    agency: &Agency,
    database: &str,
    collection: &str,
    shard: &str,
    to: &str,
    format: Format,
) -> anyhow::Result<()> {
    let moved = agency.move_shard(database, collection, shard, to)?;
    match format {
        Format::Json => print_json(&moved),
        Format::Text => {
            match &moved.from {
                Some(from) if from != to => {
                    println!("✓ {database}/{collection} {shard}: leader {from} → {to}")
                }
                Some(_) => println!("✓ {database}/{collection} {shard}: {to} is already leader"),
                None => println!("✓ {database}/{collection} {shard}: leader set to {to}"),
            }
            Ok(())
        }
    }
}

pub fn colocation(agency: &Agency, scope: Scope, database: &str, format: Format) -> anyhow::Result<()> {
    let violations = select(agency, scope, database)?.check_colocation()?;
    match format {
        Format::Json => print_json(&violations)?,
        Format::Text => {
            if violations.is_empty() {
                println!("✓ {database}: all distributeShardsLike layouts match");
            }
            for violation in &violations {
                println!("✗ {violation}");
            }
        }
    }
    if !violations.is_empty() {
        anyhow::bail!("{database}: {} colocation violation(s)", violations.len());
    }
    Ok(())
}

pub fn distribution(agency: &Agency, scope: Scope, database: &str, format: Format) -> anyhow::Result<()> {
    let distribution = select(agency, scope, database)?.shard_distribution()?;
    match format {
        Format::Json => print_json(&distribution),
        Format::Text => {
            for (collection, shards) in &distribution {
                println!("{collection}");
                for (shard, placement) in shards {
                    println!(
                        "  {:<10} leader={} followers={}",
                        shard.as_str(),
                        placement.leader.as_deref().unwrap_or("-"),
                        placement.followers.join(",")
                    );
                }
            }
            Ok(())
        }
    }
}
