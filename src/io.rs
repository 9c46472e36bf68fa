use std::path::Path;

use anyhow::{bail, Context};
use csv::{ReaderBuilder, WriterBuilder};

use crate::audit::AuditFinding;
use crate::model::{CallAssignment, Resident, ResidentId, Team};

/// Import residents from CSV.
/// Header: `id,name,pgy,specialty,on_service,is_chief,call_exempt,leave_quota`.
/// A blank id gets a random one; the trailing flags and quota are optional.
pub fn import_residents_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Resident>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(0).context("missing id")?.trim();
        let name = rec.get(1).context("missing name")?.trim();
        let pgy = rec.get(2).context("missing pgy")?.trim();
        let specialty = rec.get(3).context("missing specialty")?.trim();
        if name.is_empty() || specialty.is_empty() {
            bail!("invalid resident row (empty name or specialty)");
        }
        let pgy_level: u8 = pgy
            .parse()
            .with_context(|| format!("invalid pgy level for {name}"))?;

        let mut resident = Resident::new(name, pgy_level, specialty);
        if !id.is_empty() {
            resident.id = ResidentId::new(id);
        }
        if let Some(flag) = non_empty(rec.get(4)) {
            resident.on_service = parse_bool(flag)
                .with_context(|| format!("invalid on_service value for {name}"))?;
        }
        if let Some(flag) = non_empty(rec.get(5)) {
            resident.is_chief = parse_bool(flag)
                .with_context(|| format!("invalid is_chief value for {name}"))?;
        }
        if let Some(flag) = non_empty(rec.get(6)) {
            resident.call_exempt = parse_bool(flag)
                .with_context(|| format!("invalid call_exempt value for {name}"))?;
        }
        if let Some(quota) = non_empty(rec.get(7)) {
            resident.annual_leave_quota = quota
                .parse()
                .with_context(|| format!("invalid leave_quota value for {name}"))?;
        }
        out.push(resident);
    }
    Ok(out)
}

fn non_empty(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => bail!("expected boolean"),
    }
}

/// Export call assignments: header `id,resident,date,type,points,team,status`.
pub fn export_calls_csv<P: AsRef<Path>>(
    path: P,
    assignments: &[CallAssignment],
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record(["id", "resident", "date", "type", "points", "team", "status"])?;
    for call in assignments {
        let team = match call.team {
            Some(Team::Red) => "Red",
            Some(Team::Blue) => "Blue",
            None => "",
        };
        let status = if call.is_post_call() { "post-call" } else { "scheduled" };
        w.write_record([
            call.id.as_str(),
            call.resident_id.as_str(),
            &call.date.to_string(),
            &call.call_type.to_string(),
            &call.points.to_string(),
            team,
            status,
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Export audit findings: header `resident,date,kind,detail`.
pub fn export_findings_csv<P: AsRef<Path>>(
    path: P,
    findings: &[AuditFinding],
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record(["resident", "date", "kind", "detail"])?;
    for finding in findings {
        w.write_record([
            finding.resident_id.as_str(),
            &finding.date.to_string(),
            &finding.kind.to_string(),
            &finding.detail,
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Pretty JSON export of any document.
pub fn export_json<P: AsRef<Path>, T: serde::Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
