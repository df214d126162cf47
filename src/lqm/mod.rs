//! Link-quality monitor.
//!
//! Every 30 seconds the monitor runs a fixed pipeline over its tracker
//! table, one [`Tracker`] per directly adjacent neighbor:
//!
//! 1. `update_neighbors` - Babel `dump-neighbors`: discover neighbors,
//!    fold reachability into `lq`/`avg_lq`
//! 2. `update_routes` - Babel `dump-installed-routes`: routability, route
//!    counts, best metric
//! 3. `update_stats` - kernel transmit counters per tracked device
//! 4. `update_running_averages` - EMA of counter deltas, transmit quality
//! 5. `remote_refresh` - fetch due neighbors' sysinfo (bounded fan-out),
//!    pick up coordinates, hostname, and the neighbor's view of us
//! 6. `update_tracking_state` - ping every neighbor (bounded fan-out),
//!    fold into ping quality and the combined quality score
//! 7. `prune_trackers` - drop neighbors unseen for a day
//! 8. `write_state` - publish the state document
//!
//! Later phases observe all of an earlier phase's writes; nothing outside
//! the monitor mutates the table. Readers take the table lock shared via
//! [`LqmService::snapshot`].

pub mod netdev;
pub mod probe;
pub mod tracker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinSet;

use crate::babel::{BabelClient, InstalledRoute, Neighbor};
use crate::config::Config;
use crate::netutil::{canonical_hostname, ipv6ll_to_mac, mesh_ip_for_hostname};
use netdev::{derive_wireguard_peer_ip, AddrSource, LinkCounterSource, SysfsLinkCounters, SystemAddrSource};
use probe::{Ping6Prober, Prober};
use tracker::{BabelPeerConfig, DeviceType, LqmInfo, Tracker};

const TICK_INTERVAL: Duration = Duration::from_secs(30);
const REFRESH_TIMEOUT_BASE: i64 = 12 * 60;
const REFRESH_TIMEOUT_RANGE: i64 = 5 * 60;
const REFRESH_RETRY_TIMEOUT: i64 = 5 * 60;
const LAST_SEEN_TIMEOUT: i64 = 24 * 60 * 60;
const TX_QUALITY_RUN_AVG: f64 = 0.4;
const PING_TIMEOUT: Duration = Duration::from_secs(1);
const PING_TIME_RUN_AVG: f64 = 0.4;
const DTD_DISTANCE: f64 = 50.0; // meters
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_DISTANCE: i64 = 80_550; // meters
const PING_PENALTY: i32 = 5;
const LAST_UP_MARGIN: i64 = 60;
const METRIC_UNREACHABLE: u32 = 65_535;
const METRIC_SENTINEL: u32 = u32::MAX;

/// Classify a kernel device name. Neighbors on any other interface are not
/// tracked.
fn device_to_type(device: &str) -> Option<DeviceType> {
    if device == "br-dtdlink" {
        return Some(DeviceType::Dtd);
    }
    if device.starts_with("wg") {
        return Some(DeviceType::Wireguard);
    }
    None
}

/// Population count of the 16-bit reachability bitmap, scaled to [0, 100]
/// and rounded up. Unparseable tokens score zero.
fn reach_to_lq(reach: &str) -> u32 {
    let val = match u16::from_str_radix(reach, 16) {
        Ok(val) => val,
        Err(_) => return 0,
    };
    (100.0 * f64::from(val.count_ones()) / 16.0).ceil() as u32
}

/// Great-circle distance in meters via the haversine approximation.
fn calc_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const R2: f64 = 12_742_000.0; // diameter of the earth, meters
    let p = std::f64::consts::PI / 180.0;

    let v = 0.5 - ((lat2 - lat1) * p).cos() / 2.0
        + (lat1 * p).cos() * (lat2 * p).cos() * (1.0 - ((lon2 - lon1) * p).cos()) / 2.0;
    R2 * v.sqrt().atan2((1.0 - v).sqrt())
}

/// Refresh deadline jitter in seconds: uniform over the full range, or half
/// the range if the OS random source fails.
fn refresh_jitter() -> i64 {
    let mut bytes = [0u8; 8];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => (u64::from_le_bytes(bytes) % REFRESH_TIMEOUT_RANGE as u64) as i64,
        Err(_) => REFRESH_TIMEOUT_RANGE / 2,
    }
}

/// Coordinates in remote sysinfo arrive as numbers or strings depending on
/// firmware age; anything unparseable reads as zero.
fn lenient_coord(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(num) => num.as_f64().unwrap_or(0.0),
        serde_json::Value::String(raw) => raw.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// The slice of a remote node's sysinfo the monitor consumes. Deliberately
/// version-blind: these fields have kept their names across the schema
/// family.
#[derive(Debug, Default, Deserialize)]
struct RemoteSysinfo {
    #[serde(default)]
    node: String,
    #[serde(default)]
    lat: serde_json::Value,
    #[serde(default)]
    lon: serde_json::Value,
    #[serde(default)]
    node_details: RemoteNodeDetails,
    #[serde(default)]
    interfaces: Vec<RemoteInterface>,
    #[serde(default)]
    lqm: tracker::LqmSection,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteNodeDetails {
    #[serde(default)]
    model: String,
    #[serde(default)]
    firmware_version: String,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteInterface {
    #[serde(default)]
    mac: String,
    #[serde(default)]
    ip: String,
}

/// The link-quality monitor service.
pub struct LqmService {
    config: Arc<Config>,
    babel: BabelClient,
    trackers: RwLock<HashMap<String, Tracker>>,
    ping_sem: Arc<Semaphore>,
    http_sem: Arc<Semaphore>,
    http_client: reqwest::Client,
    prober: Arc<dyn Prober>,
    counters: Arc<dyn LinkCounterSource>,
    addrs: Arc<dyn AddrSource>,
    start_time: AtomicI64,
    last_tick: AtomicI64,
    total_route_count: AtomicI64,
    total_node_route_count: AtomicI64,
    running: AtomicBool,
    stopping: Mutex<bool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    exited_tx: watch::Sender<bool>,
    exited_rx: watch::Receiver<bool>,
}

impl LqmService {
    /// Monitor wired to the real system: Babel socket, `ping6`, sysfs
    /// counters, `getifaddrs`.
    pub fn new(config: Arc<Config>) -> Arc<Self> {
        let babel = BabelClient::new(&config.lqm.babel_socket);
        Self::with_collaborators(
            config,
            babel,
            Arc::new(Ping6Prober::new(PING_TIMEOUT)),
            Arc::new(SysfsLinkCounters),
            Arc::new(SystemAddrSource),
        )
    }

    /// Monitor with injected collaborators; the seam tests drive phases
    /// through.
    pub fn with_collaborators(
        config: Arc<Config>,
        babel: BabelClient,
        prober: Arc<dyn Prober>,
        counters: Arc<dyn LinkCounterSource>,
        addrs: Arc<dyn AddrSource>,
    ) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(false);
        let http_client = reqwest::Client::builder()
            .timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client construction");
        Arc::new(Self {
            config,
            babel,
            trackers: RwLock::new(HashMap::new()),
            ping_sem: Arc::new(Semaphore::new(10)),
            http_sem: Arc::new(Semaphore::new(5)),
            http_client,
            prober,
            counters,
            addrs,
            start_time: AtomicI64::new(0),
            last_tick: AtomicI64::new(0),
            total_route_count: AtomicI64::new(0),
            total_node_route_count: AtomicI64::new(0),
            running: AtomicBool::new(false),
            stopping: Mutex::new(false),
            shutdown_tx,
            shutdown_rx,
            exited_tx,
            exited_rx,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.lqm.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the monitor until [`stop`](Self::stop). Blocks for the service
    /// lifetime; if a stop has already begun this parks forever, because the
    /// service registry treats a returning `start` as a crash to restart.
    pub async fn start(self: &Arc<Self>) {
        let stopping = *self.stopping.lock().expect("start/stop mutex poisoned");
        if stopping {
            std::future::pending::<()>().await;
        }
        if !self.is_enabled() {
            return;
        }

        self.start_time.store(Utc::now().timestamp(), Ordering::Release);
        self.running.store(true, Ordering::Release);

        self.run(self.shutdown_rx.clone()).await;

        self.running.store(false, Ordering::Release);
        self.exited_tx.send_replace(true);
    }

    /// Signal the monitor to exit and wait for it. Idempotent.
    pub async fn stop(&self) {
        {
            let mut stopping = self.stopping.lock().expect("start/stop mutex poisoned");
            *stopping = true;
        }
        self.shutdown_tx.send_replace(true);

        if self.running.load(Ordering::Acquire) {
            let mut exited = self.exited_rx.clone();
            let _ = exited.wait_for(|done| *done).await;
        }
    }

    async fn run(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately: every start begins with a
        // full pipeline run.
        loop {
            tokio::select! {
                result = shutdown.wait_for(|stop| *stop) => {
                    let _ = result;
                    return;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One pipeline run. Phases execute strictly in order.
    async fn tick(self: &Arc<Self>) {
        let now = Utc::now().timestamp();
        self.update_neighbors().await;
        self.update_routes().await;
        self.update_stats().await;
        self.update_running_averages().await;
        self.remote_refresh().await;
        self.update_tracking_state().await;
        self.prune_trackers(now).await;
        self.write_state().await;
        self.last_tick.store(now, Ordering::Release);
    }

    /// A copy of the tracker table, taken under the shared lock.
    pub async fn snapshot(&self) -> HashMap<String, Tracker> {
        self.trackers.read().await.clone()
    }

    /// The state document as it would be published right now.
    pub async fn state_document(&self) -> LqmInfo {
        LqmInfo {
            now: Utc::now().timestamp(),
            trackers: self.snapshot().await,
            distance: DEFAULT_MAX_DISTANCE,
            start: self.start_time.load(Ordering::Acquire),
            total_route_count: self.total_route_count.load(Ordering::Acquire),
        }
    }

    // Phase 1: neighbors.

    async fn update_neighbors(&self) {
        debug!("lqm: update_neighbors started");
        let neighbors = match self.babel.dump_neighbors().await {
            Ok(neighbors) => neighbors,
            Err(err) => {
                warn!("lqm: failed to connect to babel socket: {err}");
                return;
            }
        };
        self.apply_neighbors(&neighbors).await;
        debug!("lqm: update_neighbors finished");
    }

    async fn apply_neighbors(&self, neighbors: &[Neighbor]) {
        let now = Utc::now().timestamp();
        let mut trackers = self.trackers.write().await;

        for neighbor in neighbors {
            let mac = ipv6ll_to_mac(&neighbor.address);
            let Some(dev_type) = device_to_type(&neighbor.interface) else {
                warn!(
                    "lqm: skipping neighbor on unsupported interface {} ({mac})",
                    neighbor.interface
                );
                continue;
            };

            if let Some(tracker) = trackers.get_mut(&mac) {
                if tracker.device_type == DeviceType::Wireguard {
                    // Tunnel addresses move when peers reconnect; re-derive
                    // on every sighting.
                    tracker.ip = derive_wireguard_peer_ip(self.addrs.as_ref(), &neighbor.interface);
                    debug!(
                        "lqm: updated ip for wireguard tracker {mac} on {}: {}",
                        neighbor.interface, tracker.ip
                    );
                }
            } else {
                info!(
                    "lqm: new neighbor {mac} on {} ({dev_type:?})",
                    neighbor.interface
                );
                let mut tracker = Tracker {
                    first_seen: now,
                    last_seen: now,
                    last_up: now,
                    device_type: dev_type,
                    device: neighbor.interface.clone(),
                    mac: mac.clone(),
                    ipv6ll: neighbor.address.clone(),
                    ..Tracker::default()
                };
                if dev_type == DeviceType::Wireguard {
                    tracker.ip = derive_wireguard_peer_ip(self.addrs.as_ref(), &neighbor.interface);
                }
                trackers.insert(mac.clone(), tracker);
            }

            let tracker = trackers.get_mut(&mac).expect("tracker just ensured");
            tracker.last_seen = now;
            tracker.lq = reach_to_lq(&neighbor.reach);
            tracker.rxcost = neighbor.rxcost;
            tracker.txcost = neighbor.txcost;
            tracker.avg_lq = (0.9 * tracker.avg_lq + 0.1 * f64::from(tracker.lq)).min(100.0);

            if tracker.babel_config.is_none() {
                let mut rxcost = 96;
                let mut hello_interval = 6;
                let mut update_interval = 120;
                if self.config.node.supernode {
                    update_interval = 300;
                }
                if dev_type == DeviceType::Wireguard {
                    rxcost = 206;
                    hello_interval = 10;
                }
                tracker.babel_config = Some(BabelPeerConfig {
                    hello_interval,
                    update_interval,
                    rxcost,
                });
            }

            if let Some(rtt) = neighbor.rtt {
                tracker.rtt = rtt;
            }
        }
    }

    // Phase 2: routes.

    async fn update_routes(&self) {
        debug!("lqm: update_routes started");
        let routes = match self.babel.dump_installed_routes().await {
            Ok(routes) => routes,
            Err(err) => {
                warn!("lqm: failed to dump routes: {err}");
                return;
            }
        };
        self.apply_routes(&routes).await;
        debug!("lqm: update_routes finished");
    }

    async fn apply_routes(&self, routes: &[InstalledRoute]) {
        let mut trackers = self.trackers.write().await;

        let mut ip_to_mac: HashMap<String, String> = HashMap::new();
        for tracker in trackers.values_mut() {
            tracker.node_route_count = 0;
            tracker.babel_route_count = 0;
            tracker.babel_metric = METRIC_SENTINEL;
            tracker.routable = false;
            if !tracker.ipv6ll.is_empty() {
                ip_to_mac.insert(tracker.ipv6ll.clone(), tracker.mac.clone());
            }
            if !tracker.ip.is_empty() {
                ip_to_mac.insert(tracker.ip.clone(), tracker.mac.clone());
            }
        }

        let mut total_routes = 0i64;
        let mut total_node_routes = 0i64;
        for route in routes {
            // IPv4 only; unreachable routes are never recorded.
            if !route.prefix.contains('.') || route.metric == METRIC_UNREACHABLE {
                continue;
            }
            let is_node_route = route.prefix_len == 32;

            if let Some(mac) = ip_to_mac.get(&route.nexthop) {
                let tracker = trackers.get_mut(mac).expect("index built from table");
                tracker.routable = true;
                tracker.babel_route_count += 1;
                if is_node_route {
                    tracker.node_route_count += 1;
                    total_node_routes += 1;
                }
                if route.metric < tracker.babel_metric {
                    tracker.babel_metric = route.metric;
                }
            }
            total_routes += 1;
        }

        self.total_route_count.store(total_routes, Ordering::Release);
        self.total_node_route_count
            .store(total_node_routes, Ordering::Release);

        for tracker in trackers.values_mut() {
            if tracker.babel_metric == METRIC_SENTINEL {
                tracker.babel_metric = 0;
            }
        }
    }

    // Phase 3: kernel counters.

    async fn update_stats(&self) {
        let stats = self.counters.link_stats();
        let mut trackers = self.trackers.write().await;

        for stat in &stats {
            if device_to_type(&stat.name).is_none() {
                continue;
            }
            for tracker in trackers.values_mut() {
                if tracker.device == stat.name {
                    tracker.tx_packets = stat.tx_packets;
                    tracker.tx_fail = stat.tx_errors;
                    break;
                }
            }
        }
    }

    // Phase 4: counter EMAs.

    async fn update_running_averages(&self) {
        fn fold(avg: &mut f64, last: &mut Option<u64>, current: u64) {
            match last {
                None => {
                    *avg = 0.0;
                    *last = Some(current);
                }
                Some(prev) => {
                    let diff = current.saturating_sub(*prev) as f64;
                    *avg = *avg * TX_QUALITY_RUN_AVG + diff * (1.0 - TX_QUALITY_RUN_AVG);
                    *last = Some(current);
                }
            }
        }

        let mut trackers = self.trackers.write().await;
        for tracker in trackers.values_mut() {
            let (tx_packets, tx_fail, tx_retries) =
                (tracker.tx_packets, tracker.tx_fail, tracker.tx_retries);
            fold(&mut tracker.avg_tx, &mut tracker.last_tx_packets, tx_packets);
            fold(&mut tracker.avg_tx_fail, &mut tracker.last_tx_fail, tx_fail);
            fold(
                &mut tracker.avg_tx_retries,
                &mut tracker.last_tx_retries,
                tx_retries,
            );

            if tracker.avg_tx > 0.0 {
                let bad = tracker.avg_tx_fail.max(tracker.avg_tx_retries);
                tracker.tx_quality = 100.0 * (1.0 - (bad / tracker.avg_tx).min(1.0));
            }
        }
    }

    // Phase 5: remote refresh.

    async fn remote_refresh(self: &Arc<Self>) {
        let now = Utc::now().timestamp();
        let due: Vec<String> = {
            let mut trackers = self.trackers.write().await;
            trackers
                .values_mut()
                .filter(|t| t.refresh == 0 || now > t.refresh)
                .map(|t| {
                    // Mark as refreshing now so a slow fetch is not
                    // re-scheduled by the next tick; success overwrites this
                    // retry deadline with the full interval.
                    t.refresh = now + REFRESH_RETRY_TIMEOUT;
                    t.mac.clone()
                })
                .collect()
        };

        // Fire and forget, bounded by the HTTP semaphore.
        for mac in due {
            let service = Arc::clone(self);
            tokio::spawn(async move {
                let Ok(_permit) = service.http_sem.clone().acquire_owned().await else {
                    return;
                };
                if let Err(err) = service.refresh_tracker(&mac).await {
                    warn!("lqm: failed to refresh tracker {mac}: {err}");
                }
            });
        }
    }

    async fn refresh_tracker(&self, mac: &str) -> anyhow::Result<()> {
        let (ipv6ll, device, dev_type) = {
            let trackers = self.trackers.read().await;
            let Some(tracker) = trackers.get(mac) else {
                return Ok(());
            };
            (
                tracker.ipv6ll.clone(),
                tracker.device.clone(),
                tracker.device_type,
            )
        };
        if ipv6ll.is_empty() {
            return Ok(());
        }

        let url = format!("http://[{ipv6ll}%25{device}]:8080/cgi-bin/sysinfo.json?lqm=1");
        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                // The retry deadline is already set; just drop the reverse
                // view until the neighbor answers again.
                let mut trackers = self.trackers.write().await;
                if let Some(tracker) = trackers.get_mut(mac) {
                    tracker.rev_ping_success_time = 0.0;
                    tracker.rev_ping_quality = 0;
                    tracker.rev_quality = 0;
                }
                return Err(err.into());
            }
        };

        let info: RemoteSysinfo = response.json().await?;

        let hostname = canonical_hostname(&info.node);
        let canonical_ip = mesh_ip_for_hostname(&hostname).await;
        let my_hostname = canonical_hostname(&self.config.node.name);
        let now = Utc::now().timestamp();

        let mut trackers = self.trackers.write().await;
        let Some(tracker) = trackers.get_mut(mac) else {
            return Ok(());
        };

        tracker.refresh = now + REFRESH_TIMEOUT_BASE + refresh_jitter();
        tracker.rev_last_seen = now;

        tracker.lat = lenient_coord(&info.lat);
        tracker.lon = lenient_coord(&info.lon);
        tracker.hostname = hostname;
        tracker.canonical_ip = canonical_ip;

        if dev_type == DeviceType::Wireguard {
            if tracker.ip.is_empty() {
                tracker.ip = derive_wireguard_peer_ip(self.addrs.as_ref(), &tracker.device);
            }
        } else {
            for iface in &info.interfaces {
                if iface.mac.eq_ignore_ascii_case(&tracker.mac) {
                    tracker.ip = iface.ip.clone();
                    break;
                }
            }
        }

        if let (Some(lat1), Some(lon1)) = (self.config.node.latitude, self.config.node.longitude) {
            if tracker.lat != 0.0 && tracker.lon != 0.0 {
                tracker.distance = calc_distance(lat1, lon1, tracker.lat, tracker.lon);
                tracker.localarea =
                    tracker.device_type == DeviceType::Dtd && tracker.distance < DTD_DISTANCE;
            }
        }

        tracker.model = info.node_details.model.clone();
        tracker.firmware_version = info.node_details.firmware_version.clone();

        // The neighbor's view of this node, from its own tracker table.
        for remote in info.lqm.info.trackers.values() {
            if canonical_hostname(&remote.hostname) == my_hostname {
                tracker.rev_ping_success_time = remote.ping_success_time;
                tracker.rev_ping_quality = remote.ping_quality;
                tracker.rev_quality = remote.quality;
                break;
            }
        }

        Ok(())
    }

    // Phase 6: reachability probing.

    async fn update_tracking_state(self: &Arc<Self>) {
        debug!("lqm: update_tracking_state started");
        let macs: Vec<String> = self.trackers.read().await.keys().cloned().collect();

        let mut probes = JoinSet::new();
        for mac in macs {
            // Take the permit before spawning so the fan-out cannot outrun
            // the bound.
            let Ok(permit) = self.ping_sem.clone().acquire_owned().await else {
                break;
            };
            let service = Arc::clone(self);
            probes.spawn(async move {
                let _permit = permit;
                service.ping_tracker(&mac).await;
                service.calculate_quality(&mac).await;
            });
        }
        while probes.join_next().await.is_some() {}
        debug!("lqm: update_tracking_state finished");
    }

    async fn ping_tracker(&self, mac: &str) {
        let (device, ipv6ll) = {
            let trackers = self.trackers.read().await;
            let Some(tracker) = trackers.get(mac) else {
                return;
            };
            (tracker.device.clone(), tracker.ipv6ll.clone())
        };
        if ipv6ll.is_empty() {
            return;
        }

        let outcome = self.prober.ping(&device, &ipv6ll).await;
        let now = Utc::now().timestamp();

        let mut trackers = self.trackers.write().await;
        let Some(tracker) = trackers.get_mut(mac) else {
            return;
        };

        let (success, ptime) = match outcome {
            Ok(seconds) => (true, seconds),
            Err(err) => {
                debug!("lqm: ping {mac} via {device} failed: {err}");
                (false, 0.0)
            }
        };

        if tracker.ping_quality == 0 {
            tracker.ping_quality = 100;
        } else {
            tracker.ping_quality += 1;
        }

        if success {
            if tracker.ping_success_time == 0.0 {
                tracker.ping_success_time = ptime;
            } else {
                tracker.ping_success_time =
                    tracker.ping_success_time * PING_TIME_RUN_AVG + ptime * (1.0 - PING_TIME_RUN_AVG);
            }
        } else {
            tracker.ping_quality -= PING_PENALTY;
        }

        tracker.ping_quality = tracker.ping_quality.clamp(0, 100);

        if success {
            let last_tick = self.last_tick.load(Ordering::Acquire);
            if last_tick != 0 && tracker.last_seen + LAST_UP_MARGIN < last_tick {
                tracker.last_up = now;
            }
            tracker.last_seen = now;
        }
    }

    async fn calculate_quality(&self, mac: &str) {
        let mut trackers = self.trackers.write().await;
        let Some(tracker) = trackers.get_mut(mac) else {
            return;
        };

        tracker.quality = if tracker.tx_quality > 0.0 {
            if tracker.ping_quality > 0 {
                ((tracker.tx_quality + f64::from(tracker.ping_quality)) / 2.0).round() as i32
            } else {
                tracker.tx_quality.round() as i32
            }
        } else if tracker.ping_quality > 0 {
            tracker.ping_quality
        } else {
            0
        };
    }

    // Phase 7: pruning.

    async fn prune_trackers(&self, now: i64) {
        let mut trackers = self.trackers.write().await;
        trackers.retain(|mac, tracker| {
            let keep = now - tracker.last_seen <= LAST_SEEN_TIMEOUT;
            if !keep {
                info!(
                    "lqm: pruning tracker {mac}, last seen {} ({}s ago)",
                    tracker.last_seen,
                    now - tracker.last_seen
                );
            }
            keep
        });
    }

    // Phase 8: publication.

    async fn write_state(&self) {
        let state = self.state_document().await;
        debug!("lqm: writing state, {} trackers", state.trackers.len());

        let file = match std::fs::File::create(&self.config.lqm.state_path) {
            Ok(file) => file,
            Err(_) => return,
        };
        if let Err(err) = serde_json::to_writer(file, &state) {
            warn!("lqm: failed to encode state: {err}");
        }
    }
}
