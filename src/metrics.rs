use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use sysinfo::{Disks, Networks, System};

/// Host information.
pub const OPTION_HOST_INFO: &str = "host/info";
/// Per-CPU identification and frequency.
pub const OPTION_CPU_INFO: &str = "cpu/info";
/// Overall CPU usage, sampled over a fixed one-second window.
pub const OPTION_CPU_PERCENT: &str = "cpu/percent";
/// Virtual memory usage.
pub const OPTION_VIRTUAL_MEMORY: &str = "mem/virtualMemory";
/// Swap usage.
pub const OPTION_SWAP_MEMORY: &str = "mem/swapMemory";
/// Per-partition disk usage.
pub const OPTION_DISK_USAGE: &str = "disk/usage";
/// Per-disk I/O byte counters.
pub const OPTION_DISK_IO: &str = "disk/ioCounters";
/// Per-interface network I/O counters.
pub const OPTION_NET_IO: &str = "net/ioCounters";
/// Network interface addresses.
pub const OPTION_NET_INTERFACES: &str = "net/interfaces";

/// Every collectible metric, in output order.
pub const ALL_OPTIONS: [&str; 9] = [
    OPTION_HOST_INFO,
    OPTION_CPU_INFO,
    OPTION_CPU_PERCENT,
    OPTION_VIRTUAL_MEMORY,
    OPTION_SWAP_MEMORY,
    OPTION_DISK_USAGE,
    OPTION_DISK_IO,
    OPTION_NET_IO,
    OPTION_NET_INTERFACES,
];

/// Collect the selected metrics into an option-name-keyed JSON map; an empty
/// selection collects everything. A metric that cannot be collected is
/// omitted rather than failing the snapshot, and selections that match no
/// known option simply produce no key.
pub fn snapshot(options: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    for option in ALL_OPTIONS {
        if !options.is_empty() && !options.iter().any(|selected| selected == option) {
            continue;
        }
        match collect(option) {
            Some(value) => {
                out.insert(option.to_string(), value);
            }
            None => debug!("metric {option} unavailable, omitting"),
        }
    }
    out
}

fn collect(option: &str) -> Option<Value> {
    match option {
        OPTION_HOST_INFO => to_json(host_info()),
        OPTION_CPU_INFO => to_json(cpu_info()),
        OPTION_CPU_PERCENT => to_json(cpu_percent()),
        OPTION_VIRTUAL_MEMORY => to_json(virtual_memory()),
        OPTION_SWAP_MEMORY => to_json(swap_memory()),
        OPTION_DISK_USAGE => to_json(disk_usage()),
        OPTION_DISK_IO => to_json(disk_io()),
        OPTION_NET_IO => to_json(net_io()),
        OPTION_NET_INTERFACES => to_json(net_interfaces()),
        _ => None,
    }
}

fn to_json<T: Serialize>(value: T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(json) => Some(json),
        Err(err) => {
            debug!("metric serialization failed: {err}");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub long_os_version: String,
    pub kernel_version: String,
    pub distribution_id: String,
    pub arch: String,
    /// Seconds since the epoch.
    pub boot_time: u64,
    /// Seconds since boot.
    pub uptime: u64,
    pub load_average: LoadAverageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadAverageInfo {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub name: String,
    pub vendor_id: String,
    pub brand: String,
    /// MHz.
    pub frequency: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsageInfo {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    pub kind: String,
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub used_percent: f64,
    pub removable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskIoInfo {
    /// Bytes read and written since boot.
    pub read_bytes: u64,
    pub written_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetIoInfo {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub name: String,
    pub mac_address: String,
    pub ip_networks: Vec<String>,
}

fn host_info() -> HostInfo {
    let load = System::load_average();
    HostInfo {
        hostname: System::host_name().unwrap_or_default(),
        os: System::name().unwrap_or_default(),
        os_version: System::os_version().unwrap_or_default(),
        long_os_version: System::long_os_version().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        distribution_id: System::distribution_id(),
        arch: std::env::consts::ARCH.to_string(),
        boot_time: System::boot_time(),
        uptime: System::uptime(),
        load_average: LoadAverageInfo {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        },
    }
}

fn cpu_info() -> Vec<CpuInfo> {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.cpus()
        .iter()
        .map(|cpu| CpuInfo {
            name: cpu.name().to_string(),
            vendor_id: cpu.vendor_id().to_string(),
            brand: cpu.brand().to_string(),
            frequency: cpu.frequency(),
        })
        .collect()
}

/// Overall CPU usage percentage. Usage is a delta measurement, so this
/// deliberately blocks for the one-second sampling window.
fn cpu_percent() -> f32 {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    thread::sleep(Duration::from_secs(1));
    sys.refresh_cpu_usage();
    sys.global_cpu_usage()
}

fn virtual_memory() -> MemoryInfo {
    let mut sys = System::new();
    sys.refresh_memory();
    MemoryInfo {
        total: sys.total_memory(),
        available: sys.available_memory(),
        used: sys.used_memory(),
        free: sys.free_memory(),
        used_percent: percent(sys.used_memory(), sys.total_memory()),
    }
}

fn swap_memory() -> SwapInfo {
    let mut sys = System::new();
    sys.refresh_memory();
    SwapInfo {
        total: sys.total_swap(),
        used: sys.used_swap(),
        free: sys.free_swap(),
        used_percent: percent(sys.used_swap(), sys.total_swap()),
    }
}

fn disk_usage() -> Vec<DiskUsageInfo> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .map(|disk| {
            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);
            DiskUsageInfo {
                name: disk.name().to_string_lossy().into_owned(),
                mount_point: disk.mount_point().display().to_string(),
                file_system: disk.file_system().to_string_lossy().into_owned(),
                kind: disk.kind().to_string(),
                total,
                available,
                used,
                used_percent: percent(used, total),
                removable: disk.is_removable(),
            }
        })
        .collect()
}

fn disk_io() -> BTreeMap<String, DiskIoInfo> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .map(|disk| {
            let usage = disk.usage();
            (
                disk.name().to_string_lossy().into_owned(),
                DiskIoInfo {
                    read_bytes: usage.total_read_bytes,
                    written_bytes: usage.total_written_bytes,
                },
            )
        })
        .collect()
}

fn net_io() -> Vec<NetIoInfo> {
    let networks = Networks::new_with_refreshed_list();
    networks
        .iter()
        .map(|(name, data)| NetIoInfo {
            name: name.clone(),
            bytes_sent: data.total_transmitted(),
            bytes_received: data.total_received(),
            packets_sent: data.total_packets_transmitted(),
            packets_received: data.total_packets_received(),
            errors_in: data.total_errors_on_received(),
            errors_out: data.total_errors_on_transmitted(),
        })
        .collect()
}

fn net_interfaces() -> Vec<InterfaceInfo> {
    let networks = Networks::new_with_refreshed_list();
    networks
        .iter()
        .map(|(name, data)| InterfaceInfo {
            name: name.clone(),
            mac_address: data.mac_address().to_string(),
            ip_networks: data
                .ip_networks()
                .iter()
                .map(|network| network.to_string())
                .collect(),
        })
        .collect()
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_selection_produces_exactly_that_key() {
        let result = snapshot(&[OPTION_VIRTUAL_MEMORY.to_string()]);
        assert_eq!(result.len(), 1);
        let memory = &result[OPTION_VIRTUAL_MEMORY];
        assert!(memory["total"].as_u64().is_some());
        assert!(memory["usedPercent"].as_f64().is_some());
    }

    #[test]
    fn unknown_selections_produce_no_keys() {
        let result = snapshot(&["gpu/info".to_string()]);
        assert!(result.is_empty());
    }

    #[test]
    fn host_info_has_identity_fields() {
        let result = snapshot(&[OPTION_HOST_INFO.to_string()]);
        let host = &result[OPTION_HOST_INFO];
        assert!(host["bootTime"].as_u64().is_some());
        assert!(host["loadAverage"]["one"].as_f64().is_some());
        assert!(host["arch"].is_string());
    }

    #[test]
    fn percent_guards_zero_totals() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 2), 50.0);
    }
}
