//! Output formatting for CLI

use console::style;
use multiview_core::{DashboardSnapshot, Role, SessionSnapshot, StreamDescriptor, StreamSource};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON for machine consumers
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Locator")]
    url: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

/// Render the catalog as a table
pub fn catalog_table(streams: &[StreamDescriptor]) -> String {
    let rows = streams.iter().map(|s| CatalogRow {
        id: s.id,
        name: s.display_name(),
        url: s.url.clone(),
        kind: match StreamSource::parse(&s.url) {
            Ok(source) if source.is_hls() => "hls".to_string(),
            Ok(source) => format!("{:?}", source.manifest_type()).to_lowercase(),
            Err(_) => "invalid".to_string(),
        },
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Stream")]
    stream: u32,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Drift")]
    drift: String,
    #[tabled(rename = "Corrections")]
    corrections: u64,
    #[tabled(rename = "Paused")]
    paused: bool,
}

impl From<&SessionSnapshot> for SessionRow {
    fn from(s: &SessionSnapshot) -> Self {
        Self {
            stream: s.stream_id,
            role: s.role.to_string(),
            state: s.state.to_string(),
            position: format!("{:.2}", s.position),
            drift: s.drift.map(|d| format!("{d:.2}")).unwrap_or_else(|| "-".to_string()),
            corrections: s.stats.as_ref().map(|st| st.corrections).unwrap_or(0),
            paused: s.paused,
        }
    }
}

/// Render one dashboard snapshot for a terminal
pub fn snapshot_text(snapshot: &DashboardSnapshot, elapsed: f64) -> String {
    let header = format!(
        "{} t={:>6.2}s  leader={}  position={:.2}",
        style("●").cyan(),
        elapsed,
        snapshot
            .leader_stream
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
        snapshot.leader_position,
    );

    let rows: Vec<SessionRow> = snapshot.sessions.iter().map(SessionRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!("{header}\n{table}")
}

/// Closing summary of a simulation run
pub fn summary_text(snapshot: &DashboardSnapshot) -> String {
    let mut lines = vec![format!("{}", style("Simulation summary").bold())];
    for session in &snapshot.sessions {
        let label = format!("stream {:>3} ({})", session.stream_id, session.role);
        let line = match (&session.role, &session.error, &session.stats) {
            (_, Some(error), _) => format!("  {label}: {}", style(error).red()),
            (Role::Leader, None, _) => format!("  {label}: drives the grid"),
            (Role::Follower, None, Some(stats)) => format!(
                "  {label}: {} corrections ({} while paused), max drift {:.2}s",
                stats.corrections, stats.paused_corrections, stats.max_drift
            ),
            (Role::Follower, None, None) => format!("  {label}: no statistics"),
        };
        lines.push(line);
    }

    let total = snapshot.total_corrections();
    let total = if total == 0 {
        style(format!("{total} corrections")).green()
    } else {
        style(format!("{total} corrections")).yellow()
    };
    lines.push(format!("  total: {total}"));
    lines.join("\n")
}
