use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LoginOutcome {
    Ballot,
    AlreadyVoted,
    Invalid,
    HashFailure,
}

#[derive(Default)]
pub struct Metrics {
    login_total: HashMap<LoginOutcome, u64>,
    votes_recorded_total: u64,
    fast_write_failures_total: u64,
    durable_write_failures_total: u64,
}

static METRICS: OnceCell<Mutex<Metrics>> = OnceCell::new();

fn with_metrics<F: FnOnce(&mut Metrics)>(f: F) {
    let lock = METRICS.get_or_init(|| Mutex::new(Metrics::default()));
    // A poisoned lock only means a panic elsewhere mid-increment; keep counting.
    let mut m = lock.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut m);
}

pub fn record_login_outcome(outcome: LoginOutcome) {
    with_metrics(|m| *m.login_total.entry(outcome).or_insert(0) += 1);
}

pub fn record_vote_recorded() {
    with_metrics(|m| m.votes_recorded_total += 1);
}

pub fn record_fast_write_failure() {
    with_metrics(|m| m.fast_write_failures_total += 1);
}

pub fn record_durable_write_failure() {
    with_metrics(|m| m.durable_write_failures_total += 1);
}

pub fn durable_write_failures() -> u64 {
    let mut count = 0;
    with_metrics(|m| count = m.durable_write_failures_total);
    count
}

/// Counters plus storage usage of the durable store at `db_path`.
pub fn snapshot_as_json(db_path: &str) -> serde_json::Value {
    use serde_json::json;

    let mut logins = Vec::new();
    let mut counters = (0, 0, 0);
    with_metrics(|m| {
        logins = m
            .login_total
            .iter()
            .map(|(outcome, count)| {
                json!({
                    "outcome": match outcome {
                        LoginOutcome::Ballot => "ballot",
                        LoginOutcome::AlreadyVoted => "already_voted",
                        LoginOutcome::Invalid => "invalid",
                        LoginOutcome::HashFailure => "hash_failure",
                    },
                    "count": count
                })
            })
            .collect();
        counters = (
            m.votes_recorded_total,
            m.fast_write_failures_total,
            m.durable_write_failures_total,
        );
    });

    let db_bytes = std::fs::metadata(db_path)
        .ok()
        .and_then(|m| if m.is_file() { Some(m.len()) } else { None });
    let db_mb = db_bytes.map(|b| round2(bytes_to_mb(b)));
    let fs_free_mb = filesystem_free_mb_from_db_path(db_path);

    json!({
        "login_total": logins,
        "votes_recorded_total": counters.0,
        "fast_write_failures_total": counters.1,
        "durable_write_failures_total": counters.2,
        "storage": {
            "db_path": db_path,
            "db_size_mb": db_mb,
            "free_storage_mb": fs_free_mb,
        }
    })
}

fn bytes_to_mb(bytes: u64) -> f64 {
    let mb = 1024.0 * 1024.0;
    (bytes as f64) / mb
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn filesystem_free_mb_from_db_path(db_path: &str) -> Option<f64> {
    use sysinfo::Disks;
    let disks = Disks::new_with_refreshed_list();
    let path = std::path::Path::new(db_path);
    let mount = path.canonicalize().ok().and_then(|p| {
        disks
            .iter()
            .filter(|d| p.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
    });

    mount.map(|d| round2(bytes_to_mb(d.available_space())))
}
