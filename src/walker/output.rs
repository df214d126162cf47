//! Map artifact assembly.
//!
//! The crawl's responses are folded into one JSON document shaped for the
//! map frontend:
//!
//! ```json
//! {"nonMapped": 3, "hostsScraped": 120, "date": "…", "nodeInfo": [{"data": {…}}, …]}
//! ```
//!
//! Nodes without coordinates cannot be mapped and are only counted.
//! Responses stream to a sidecar file as they arrive (a full-mesh crawl
//! does not fit comfortably in memory on a node), then the header and the
//! streamed array are stitched together and the result is renamed into
//! place so readers never observe a partial document.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use log::info;
use tokio::sync::mpsc;

use super::Walker;
use crate::sysinfo::SysinfoResponse;

/// Final crawl tallies, logged and embedded in the artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkSummary {
    /// Responses drained from the channel, fetch failures included.
    pub completed: u64,
    /// Nodes skipped for missing coordinates.
    pub non_mapped: u64,
    /// Distinct hostnames scheduled for fetching.
    pub hosts_scraped: u64,
}

/// Rebadge tunnel links on supernode documents so the map renders them as
/// supernode trunks rather than ordinary tunnels.
pub fn apply_supernode_rewrite(response: &mut SysinfoResponse) {
    if !response.mesh_supernode() {
        return;
    }
    if let Some(mut links) = response.link_info() {
        links.promote_tunnel_links();
        response.set_link_info(links);
    }
}

/// Drain the walk and write the artifact to `output_path`. Progress is
/// logged every two seconds while the crawl is still producing.
pub async fn write_artifact(
    walker: &Arc<Walker>,
    responses: &mut mpsc::Receiver<Option<SysinfoResponse>>,
    output_path: &Path,
) -> Result<WalkSummary> {
    let entries_path = output_path.with_extension("entries.tmp");
    let staging_path = output_path.with_extension("json.new");

    let completed = Arc::new(AtomicU64::new(0));
    let non_mapped = Arc::new(AtomicU64::new(0));

    let progress = spawn_progress_logger(
        Arc::clone(walker),
        Arc::clone(&completed),
        Arc::clone(&non_mapped),
    );

    let stream_result = stream_entries(responses, &entries_path, &completed, &non_mapped).await;
    progress.abort();
    stream_result?;

    let summary = WalkSummary {
        completed: completed.load(Ordering::Relaxed),
        non_mapped: non_mapped.load(Ordering::Relaxed),
        hosts_scraped: walker.total_count(),
    };

    assemble_artifact(&entries_path, &staging_path, output_path, &summary)
        .with_context(|| format!("failed to write artifact to {}", output_path.display()))?;
    let _ = std::fs::remove_file(&entries_path);

    Ok(summary)
}

fn spawn_progress_logger(
    walker: Arc<Walker>,
    completed: Arc<AtomicU64>,
    non_mapped: Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the first report has
        // something to say.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let done = completed.load(Ordering::Relaxed);
            let unmapped = non_mapped.load(Ordering::Relaxed);
            info!(
                "still walking: completed={} total={} mapped={} unmapped={}",
                done,
                walker.total_count(),
                done.saturating_sub(unmapped),
                unmapped
            );
        }
    })
}

async fn stream_entries(
    responses: &mut mpsc::Receiver<Option<SysinfoResponse>>,
    entries_path: &Path,
    completed: &AtomicU64,
    non_mapped: &AtomicU64,
) -> Result<()> {
    let file = File::create(entries_path)
        .with_context(|| format!("failed to create {}", entries_path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut first = true;

    while let Some(response) = responses.recv().await {
        completed.fetch_add(1, Ordering::Relaxed);
        let Some(mut response) = response else {
            continue;
        };

        if response.latitude() == 0.0 || response.longitude() == 0.0 {
            non_mapped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        apply_supernode_rewrite(&mut response);

        if first {
            first = false;
        } else {
            writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut writer, &serde_json::json!({ "data": response }))
            .context("failed to encode response")?;
    }

    writer.flush()?;
    Ok(())
}

fn assemble_artifact(
    entries_path: &Path,
    staging_path: &Path,
    output_path: &Path,
    summary: &WalkSummary,
) -> io::Result<()> {
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut out = BufWriter::new(File::create(staging_path)?);
    write!(
        out,
        "{{\"nonMapped\":{},\"hostsScraped\":{},\"date\":\"{}\",\"nodeInfo\":[",
        summary.non_mapped, summary.hosts_scraped, date,
    )?;
    let mut entries = File::open(entries_path)?;
    io::copy(&mut entries, &mut out)?;
    out.write_all(b"]}")?;
    out.flush()?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    std::fs::rename(staging_path, output_path)
}
