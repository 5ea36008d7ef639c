use chrono::{DateTime, Utc};
use client_core::{DashboardState, FheCipher, StatusKind, TransactionStatus};
use shared::domain::SiteRecord;

pub fn site_table(state: &DashboardState, cipher: &dyn FheCipher, details: bool) -> String {
    if state.records.is_empty() {
        return "No heritage sites found".to_string();
    }
    let mut out = format!(
        "{:<22} {:<24} {:>9} {:<8} {:<14} {:<16} {:>5}\n",
        "ID", "SITE", "CONDITION", "STATUS", "OWNER", "REGISTERED", "MINE"
    );
    for record in &state.records {
        out.push_str(&site_row(record, state.is_owner(&record.owner)));
        out.push('\n');
        if details {
            out.push_str(&site_details(record, cipher));
        }
    }
    out
}

fn site_row(record: &SiteRecord, mine: bool) -> String {
    format!(
        "{:<22} {:<24} {:>8}% {:<8} {:<14} {:<16} {:>5}",
        record.id,
        truncate(&record.site_name, 24),
        record.condition,
        record.band().label(),
        record.owner.abbreviated(),
        registered_at(record.timestamp),
        if mine { "yes" } else { "" }
    )
}

fn site_details(record: &SiteRecord, cipher: &dyn FheCipher) -> String {
    let impact = &record.environmental_impact;
    let mut out = format!(
        "    wind {:.1}%  rain {:.1}%  temperature {:.1}%\n",
        impact.wind, impact.rain, impact.temperature
    );
    match cipher.decrypt(&record.encrypted_data) {
        Some(form) => out.push_str(&format!(
            "    location: {}  description: {}\n",
            form.location, form.description
        )),
        None => out.push_str("    payload: encrypted\n"),
    }
    out
}

pub fn stats(state: &DashboardState) -> String {
    format!(
        "total sites: {}\naverage condition: {}%\nat risk (<50%): {}",
        state.total_sites(),
        state.average_condition(),
        state.at_risk_count()
    )
}

pub fn status(status: &TransactionStatus) -> Option<String> {
    if !status.visible {
        return None;
    }
    let marker = match status.kind {
        StatusKind::Pending => "...",
        StatusKind::Success => "ok",
        StatusKind::Error => "!!",
    };
    Some(format!("[{marker}] {}", status.message))
}

fn registered_at(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
