use agency_core::Role;
use agency_facade::{Agency, RemovedServer, Scope};

use super::print_json;
use crate::Format;

pub fn servers(agency: &Agency, scope: Scope, format: Format) -> anyhow::Result<()> {
    let servers = agency.db_servers(scope).get_list()?;
    match format {
        Format::Json => print_json(&servers),
        Format::Text => {
            if servers.is_empty() {
                println!("no DBServers in {scope}");
            }
            for record in servers.values() {
                let role = match record.role {
                    Role::Primary => "primary",
                    Role::Secondary => "secondary",
                };
                let mut line = format!("{:<24} {role:<9}", record.id);
                if let Some(secondary) = &record.secondary_id {
                    line.push_str(&format!(" secondary={secondary}"));
                }
                if let Some(address) = &record.address {
                    line.push_str(&format!(" address={address}"));
                }
                println!("{}", line.trim_end());
            }
            Ok(())
        }
    }
}

pub fn coordinators(agency: &Agency, scope: Scope, format: Format) -> anyhow::Result<()> {
    let ids = agency.coordinators(scope).get_list()?;
    match format {
        Format::Json => print_json(&ids),
        Format::Text => {
            for id in &ids {
                println!("{id}");
            }
            Ok(())
        }
    }
}

pub fn remove_server(agency: &mut Agency, id: &str, format: Format) -> anyhow::Result<()> {
    let removed = agency.remove_server(id)?;
    if format == Format::Json {
        return print_json(&removed);
    }
    match removed {
        RemovedServer::Primary { demoted: Some(secondary) } => {
            println!("✓ primary {id} removed, {secondary} is now an unpaired primary")
        }
        RemovedServer::Primary { demoted: None } => println!("✓ primary {id} removed"),
        RemovedServer::Secondary { primary } => {
            println!("✓ secondary {id} detached from {primary}")
        }
        RemovedServer::Coordinator => println!("✓ coordinator {id} removed"),
        RemovedServer::NotFound => anyhow::bail!("{id} is neither a DBServer nor a coordinator"),
    }
    Ok(())
}
