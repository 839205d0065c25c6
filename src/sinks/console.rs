//! Table painter that writes each cycle to the log

use tracing::{info, warn};

use super::{CycleNotice, RenderSink};
use crate::format::format_bytes;
use crate::stats::Rollup;
use crate::view::DashboardView;

const TOP_IPS: usize = 10;
const NO_DATA: &str = "  no data";

pub struct ConsoleSink;

impl ConsoleSink {
    fn rollup_lines(
        title: &str,
        rollup: &Rollup,
        limit: Option<usize>,
        label: impl Fn(&str) -> String,
        lines: &mut Vec<String>,
    ) {
        lines.push(format!("{}:", title));
        if rollup.is_empty() {
            lines.push(NO_DATA.to_string());
            return;
        }
        let entries = match limit {
            Some(n) => rollup.top(n),
            None => rollup.sorted_by_total(),
        };
        for (key, entry) in entries {
            lines.push(format!(
                "  {:<24} up {:>10}  down {:>10}  total {:>10}  conns {}",
                label(key),
                format_bytes(entry.upload_bytes),
                format_bytes(entry.download_bytes),
                format_bytes(entry.total_bytes()),
                entry.connections
            ));
        }
    }

    /// Summary cards followed by user, API, country and top-IP tables
    pub fn lines(view: &DashboardView) -> Vec<String> {
        let totals = &view.totals;
        let mut lines = vec![format!(
            "connections {} | upload {} | download {} | unique IPs {} | APIs {}",
            totals.active_connections,
            format_bytes(totals.total_upload_bytes),
            format_bytes(totals.total_download_bytes),
            totals.unique_ips,
            totals.unique_apis
        )];
        if let Some(updated) = totals.last_update_time {
            lines.push(format!("last update {}", updated.format("%Y-%m-%d %H:%M:%S UTC")));
        }

        let plain = |key: &str| key.to_string();
        Self::rollup_lines("Users", &view.users, None, plain, &mut lines);
        Self::rollup_lines("APIs", &view.apis, None, plain, &mut lines);
        Self::rollup_lines("Countries", &view.countries, None, plain, &mut lines);
        Self::rollup_lines(
            "Top IPs",
            &view.ips,
            Some(TOP_IPS),
            |ip: &str| match view.place_of(ip) {
                Some(place) => format!("{} ({})", ip, place),
                None => ip.to_string(),
            },
            &mut lines,
        );
        lines
    }
}

impl RenderSink for ConsoleSink {
    fn render(&self, view: &DashboardView) {
        for line in Self::lines(view) {
            info!("{}", line);
        }
    }

    fn notify(&self, notice: &CycleNotice) {
        match notice {
            CycleNotice::NotYetAvailable => info!("{}", notice),
            CycleNotice::Unavailable { .. } => warn!("{}", notice),
        }
    }
}
