//! Plain-text summary of the dashboard view.

use crate::state::{DashboardView, LoadingState};
use std::fmt::Write;
use tierboard_core::Quartile;

/// Multi-line board summary: one line per quartile plus movements, banner
/// and the newest notification.
pub fn summarize(view: &DashboardView) -> String {
    let mut out = String::new();

    let range = match (view.filter.query.start_date, view.filter.query.end_date) {
        (Some(start), Some(end)) if start == end => start.to_string(),
        (Some(start), Some(end)) => format!("{} .. {}", start, end),
        _ => "all history".to_string(),
    };
    let roster = if view.filter.query.fixed_roster_only {
        "fixed roster"
    } else {
        "all agents"
    };
    let _ = write!(out, "[{}] {}", range, roster);
    if !view.filter.query.agents.is_empty() {
        let _ = write!(out, ", {} selected", view.filter.query.agents.len());
    }
    let _ = writeln!(out);

    if view.loading != LoadingState::Idle {
        let _ = writeln!(out, "loading...");
    }

    match &view.snapshot {
        None => {
            let _ = writeln!(out, "no data yet");
        }
        Some(snapshot) => {
            let pct = snapshot.percentages();
            for q in Quartile::ALL {
                let stats = snapshot.stats(q);
                let _ = write!(
                    out,
                    "{:<14} agents {:>3}  total {:>8}  {:>5.1}%  mean {:>8.2}",
                    q.label(),
                    stats.count,
                    stats.total,
                    pct[q.index()],
                    stats.mean
                );
                if let Some(top) = snapshot.bucket(q).first() {
                    let _ = write!(out, "  top {}", top.name());
                }
                let _ = writeln!(out);
            }
            let _ = writeln!(out, "agents: {}", snapshot.total_agents());
        }
    }

    if !view.movements.is_empty() {
        let _ = writeln!(
            out,
            "moves: {} up, {} down, {} improved (gen {})",
            view.summary.promoted, view.summary.demoted, view.summary.improved, view.generation
        );
    }

    for (agent, stats) in &view.time_series.occupancy {
        let _ = writeln!(
            out,
            "{}: Q1 {}% Q2 {}% Q3 {}% Q4 {}% over {} days",
            agent,
            stats.pct_quartile1,
            stats.pct_quartile2,
            stats.pct_quartile3,
            stats.pct_quartile4,
            stats.total_days_observed
        );
    }

    if let Some(banner) = &view.banner {
        let _ = writeln!(out, "note: {}", banner);
    }
    if let Some(latest) = view.notifications.last() {
        let _ = writeln!(out, "{:?}: {}", latest.level, latest.message);
    }

    out
}
