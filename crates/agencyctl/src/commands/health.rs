use agency_facade::Agency;
use chrono::Utc;

use super::print_json;
use crate::Format;

pub fn health(agency: &mut Agency, format: Format) -> anyhow::Result<()> {
    let monitor = agency.heartbeats();
    let report = monitor.report(Utc::now())?;
    match format {
        Format::Json => print_json(&report),
        Format::Text => {
            println!(
                "heartbeat interval {:?}, stale after {:?}",
                monitor.interval(),
                monitor.stale_after()
            );
            for (server, health) in &report {
                let last = health
                    .last_beat
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                let flag = if health.stale { "STALE" } else { "ok" };
                println!(
                    "{server:<24} {:<13} {flag:<5} last={last}",
                    health.status.as_str()
                );
            }
            Ok(())
        }
    }
}

pub fn supervision(agency: &Agency, format: Format) -> anyhow::Result<()> {
    let state = agency.supervision_state()?;
    match format {
        Format::Json => print_json(&state),
        Format::Text => {
            for (queue, jobs) in [
                ("ToDo", &state.to_do),
                ("Pending", &state.pending),
                ("Failed", &state.failed),
                ("Finished", &state.finished),
            ] {
                println!("{queue:<9} {:>4}  {}", jobs.len(), jobs.join(","));
            }
            Ok(())
        }
    }
}
