//! # Process Resource Probing
//!
//! CPU and memory figures for the `cpu_usage` and `memory_usage` SLOs.
//!
//! [`ProcfsProbe`] reads Linux procfs. CPU is the share of one core the
//! process consumed since the previous sample (or since process start on
//! the first sample). Memory is the share of system memory in use, from
//! `MemTotal` and `MemAvailable`. On systems without procfs every sample is
//! `None` and the SLOs report compliant at their neutral value.

use std::path::PathBuf;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Kernel clock ticks per second (`USER_HZ`); 100 on every mainstream
/// Linux architecture.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

/// A point-in-time resource sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// Resident set size of this process, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rss_bytes: Option<u64>,
}

/// Source of resource samples.
pub trait ResourceProbe: Send + Sync {
    /// Take a sample; `None` when the platform offers no data.
    fn sample(&self) -> Option<ResourceUsage>;
}

/// Fixed values, for tests and platforms without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticProbe(pub Option<ResourceUsage>);

impl StaticProbe {
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self(Some(ResourceUsage {
            cpu_percent,
            memory_percent,
            rss_bytes: None,
        }))
    }

    /// A probe that never has data.
    pub fn unavailable() -> Self {
        Self(None)
    }
}

impl ResourceProbe for StaticProbe {
    fn sample(&self) -> Option<ResourceUsage> {
        self.0
    }
}

/// Linux procfs probe.
#[derive(Debug)]
pub struct ProcfsProbe {
    root: PathBuf,
    last_cpu: Mutex<Option<(Instant, u64)>>,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read procfs files under an alternative root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_cpu: Mutex::new(None),
        }
    }

    fn read(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(rel)).ok()
    }

    fn cpu_percent(&self) -> Option<f64> {
        let stat = parse_self_stat(&self.read("self/stat")?)?;
        let busy = stat.utime + stat.stime;
        let now = Instant::now();

        let mut last = self.last_cpu.lock();
        let percent = match *last {
            Some((at, prev_busy)) => {
                let elapsed = now.duration_since(at).as_secs_f64();
                if elapsed <= 0.0 {
                    0.0
                } else {
                    busy.saturating_sub(prev_busy) as f64 / CLOCK_TICKS_PER_SEC / elapsed * 100.0
                }
            }
            None => {
                let uptime = parse_uptime(&self.read("uptime")?)?;
                let alive = uptime - stat.starttime as f64 / CLOCK_TICKS_PER_SEC;
                if alive <= 0.0 {
                    0.0
                } else {
                    busy as f64 / CLOCK_TICKS_PER_SEC / alive * 100.0
                }
            }
        };
        *last = Some((now, busy));
        Some(percent.max(0.0))
    }
}

impl ResourceProbe for ProcfsProbe {
    fn sample(&self) -> Option<ResourceUsage> {
        let memory_percent = parse_meminfo(&self.read("meminfo")?)?;
        let cpu_percent = self.cpu_percent()?;
        let rss_bytes = self.read("self/status").and_then(|s| parse_vm_rss(&s));
        Some(ResourceUsage {
            cpu_percent,
            memory_percent,
            rss_bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelfStat {
    utime: u64,
    stime: u64,
    starttime: u64,
}

/// `/proc/self/stat`. The command name may contain spaces and parentheses,
/// so fields are counted from the last `)`.
fn parse_self_stat(raw: &str) -> Option<SelfStat> {
    let rest = &raw[raw.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // fields[0] is field 3 (state).
    Some(SelfStat {
        utime: fields.get(11)?.parse().ok()?,
        stime: fields.get(12)?.parse().ok()?,
        starttime: fields.get(19)?.parse().ok()?,
    })
}

fn parse_uptime(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

fn meminfo_kb(raw: &str, key: &str) -> Option<u64> {
    raw.lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(':'))
        .and_then(|v| v.split_whitespace().next()?.parse().ok())
}

/// Share of system memory in use, in percent.
fn parse_meminfo(raw: &str) -> Option<f64> {
    let total = meminfo_kb(raw, "MemTotal")?;
    let available = meminfo_kb(raw, "MemAvailable")?;
    if total == 0 {
        return None;
    }
    Some(total.saturating_sub(available) as f64 / total as f64 * 100.0)
}

fn parse_vm_rss(raw: &str) -> Option<u64> {
    meminfo_kb(raw, "VmRSS").map(|kb| kb * 1024)
}
