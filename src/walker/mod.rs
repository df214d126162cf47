//! Concurrent breadth-first mesh crawl.
//!
//! A walk starts from one configured root node, fetches its sysinfo, and
//! fans out one task per previously unseen hostname advertised in each
//! response. Every response (or `None` for a node that could not be
//! fetched) is streamed onto a capacity-1 channel, so the consumer's write
//! speed backpressures the crawl. The channel closes exactly once, when the
//! last outstanding task has finished: each task owns a clone of the
//! sender, and quiescence is simply the last clone dropping.
//!
//! Infrastructure names are filtered out of the frontier: `lan.*` hosts
//! (node-local LAN clients) and `midN.*` aliases (per-radio interfaces of a
//! node already crawled under its primary name).

pub mod fetch;
pub mod output;
pub mod seen;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, error};
use regex::Regex;
use tokio::sync::mpsc;

use crate::sysinfo::{Host, SysinfoResponse};
use fetch::{FetchError, Fetcher};
use seen::SeenSet;

/// A walk that could not start: the root node itself was unreachable.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("failed to walk starting node: {0}")]
    Root(#[from] FetchError),
}

fn mid_alias_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^mid[0-9]+\.").expect("mid alias regex"))
}

/// Whether a hostname is crawl-frontier material.
fn skip_hostname(name: &str) -> bool {
    (name.starts_with("lan.") && name.ends_with(".local.mesh"))
        || mid_alias_regex().is_match(name)
}

/// The mesh crawler. One instance drives one walk.
pub struct Walker {
    fetcher: Fetcher,
    seen: SeenSet,
    total: AtomicU64,
    url_for: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl Walker {
    /// Walker against the standard node endpoint
    /// (`http://<node>.local.mesh:8080/cgi-bin/sysinfo.json`).
    pub fn new(timeout: Duration, retries: u32, jitter: Duration) -> Self {
        Self::with_url_for(timeout, retries, jitter, |node| {
            format!("http://{node}.local.mesh:8080/cgi-bin/sysinfo.json?hosts=1&link_info=1&lqm=1")
        })
    }

    /// Walker with a custom node-to-URL mapping; tests point this at a local
    /// fake mesh.
    pub fn with_url_for(
        timeout: Duration,
        retries: u32,
        jitter: Duration,
        url_for: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(timeout, retries, jitter),
            seen: SeenSet::new(),
            total: AtomicU64::new(0),
            url_for: Box::new(url_for),
        }
    }

    /// Number of distinct hostnames scheduled for fetching so far (the root
    /// included). Still moving while the walk runs.
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Number of distinct case-folded hostnames observed so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Crawl the mesh from `root`. Returns the response stream, or an error
    /// if the root itself cannot be fetched. `None` elements mark nodes that
    /// failed after retries; the consumer filters them.
    ///
    /// Dropping the receiver cancels the crawl: tasks fail their sends and
    /// wind down within one in-flight fetch each.
    pub async fn walk(
        self: Arc<Self>,
        root: &str,
    ) -> Result<mpsc::Receiver<Option<SysinfoResponse>>, WalkError> {
        // Seed the seen-set with the root so a neighbor advertising it back
        // cannot schedule a second fetch of the same node.
        self.seen.contains_or_set(&root.to_uppercase());
        self.total.fetch_add(1, Ordering::Relaxed);

        let response = self.fetch_node(root).await?;
        let frontier = response.hosts().to_vec();

        let (tx, rx) = mpsc::channel(1);
        // The buffer is empty here, so the root response lands without a
        // consumer; children are only spawned afterwards and cannot steal
        // the slot.
        let _ = tx.send(Some(response)).await;
        self.spawn_children(&frontier, root, &tx);

        Ok(rx)
    }

    /// Schedule a crawl task for every unseen, unfiltered host in a
    /// response's advertised list.
    fn spawn_children(
        self: &Arc<Self>,
        hosts: &[Host],
        source: &str,
        tx: &mpsc::Sender<Option<SysinfoResponse>>,
    ) {
        for host in hosts {
            if skip_hostname(&host.name) {
                continue;
            }
            if self.seen.contains_or_set(&host.name.to_uppercase()) {
                continue;
            }
            self.total.fetch_add(1, Ordering::Relaxed);

            let walker = Arc::clone(self);
            let tx = tx.clone();
            let hostname = host.name.clone();
            let source = source.to_string();
            tokio::spawn(async move {
                walker.crawl_task(hostname, source, tx).await;
            });
        }
    }

    async fn crawl_task(
        self: Arc<Self>,
        hostname: String,
        source: String,
        tx: mpsc::Sender<Option<SysinfoResponse>>,
    ) {
        match self.fetch_node(&hostname).await {
            Ok(response) => {
                self.spawn_children(response.hosts(), &hostname, &tx);
                let _ = tx.send(Some(response)).await;
            }
            Err(err) => {
                if err.is_timeout() {
                    debug!("timeout fetching data from {hostname} (via {source}): {err}");
                } else {
                    error!("error fetching data from {hostname} (via {source}): {err}");
                }
                let _ = tx.send(None).await;
            }
        }
    }

    async fn fetch_node(&self, node: &str) -> Result<SysinfoResponse, FetchError> {
        let url = (self.url_for)(node);
        self.fetcher.get(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::skip_hostname;

    #[test]
    fn lan_and_mid_hosts_are_filtered() {
        assert!(skip_hostname("lan.KD2ABC-node.local.mesh"));
        assert!(skip_hostname("mid1.KD2ABC-node.local.mesh"));
        assert!(skip_hostname("mid12.KD2ABC-node"));
        assert!(!skip_hostname("KD2ABC-node"));
        // `lan.` alone is not enough without the mesh suffix.
        assert!(!skip_hostname("lan.KD2ABC-node"));
        assert!(!skip_hostname("midway-node.local.mesh"));
    }
}
