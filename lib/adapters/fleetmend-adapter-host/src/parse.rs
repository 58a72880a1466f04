//! Parsers for command output. Kept free of I/O so they can be tested on any
//! platform.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use serde::Deserialize;

use fleetmend_ports::ProcessInfo;

/// Parses `ps -eo pid=,ppid=,user=,etimes=,pcpu=,rss=,comm=`. The command
/// name is last and may contain spaces.
pub fn parse_ps(output: &str) -> Vec<ProcessInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            let user = fields.next()?.to_string();
            let uptime_seconds = fields.next()?.parse().ok()?;
            let cpu_pct = fields.next()?.parse().ok()?;
            let rss_kb = fields.next()?.parse().ok()?;
            let name = fields.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return None;
            }
            Some(ProcessInfo {
                pid,
                ppid,
                name,
                user,
                cpu_pct,
                rss_kb,
                uptime_seconds,
            })
        })
        .collect()
}

/// `ConvertTo-Json` emits a bare object for a single item.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn parse_json_list<T: for<'de> Deserialize<'de>>(raw: &str) -> anyhow::Result<Vec<T>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str::<OneOrMany<T>>(raw)?.into_vec())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WindowsProcess {
    id: u32,
    process_name: String,
    user_name: Option<String>,
    #[serde(rename = "CPU")]
    cpu: Option<f64>,
    working_set64: Option<u64>,
    uptime: Option<u64>,
}

/// Parses the process listing built by `WindowsHost`. CPU is reported by
/// PowerShell as total seconds, so the percentage is averaged over the
/// process lifetime and spread across `cores`.
pub fn parse_windows_processes(raw: &str, cores: usize) -> anyhow::Result<Vec<ProcessInfo>> {
    let cores = cores.max(1) as f64;
    let processes = parse_json_list::<WindowsProcess>(raw)?
        .into_iter()
        .map(|p| {
            let uptime_seconds = p.uptime.unwrap_or(0);
            let cpu_seconds = p.cpu.unwrap_or(0.0);
            let cpu_pct = if uptime_seconds == 0 {
                0.0
            } else {
                cpu_seconds / uptime_seconds as f64 * 100.0 / cores
            };
            ProcessInfo {
                pid: p.id,
                ppid: 0,
                name: p.process_name,
                user: p.user_name.unwrap_or_default(),
                cpu_pct,
                rss_kb: p.working_set64.unwrap_or(0) / 1024,
                uptime_seconds,
            }
        })
        .collect();
    Ok(processes)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WindowsAdapter {
    pub name: String,
    pub up: bool,
    #[serde(rename = "HasIPv4")]
    pub has_ipv4: bool,
    pub default_route: bool,
    #[serde(default)]
    pub bytes: i64,
}

pub fn parse_windows_adapters(raw: &str) -> anyhow::Result<Vec<WindowsAdapter>> {
    parse_json_list(raw)
}

/// `(name, is_up)` from `ip -o link show`. VLAN suffixes (`eth0.10@eth0`) are
/// reduced to the link name.
pub fn parse_ip_link(output: &str) -> Vec<(String, bool)> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            fields.next()?;
            let raw_name = fields.next()?.trim_end_matches(':');
            let name = raw_name.split('@').next()?.to_string();
            let flags = fields.next()?;
            let up = flags
                .trim_start_matches('<')
                .trim_end_matches('>')
                .split(',')
                .any(|flag| flag == "UP");
            Some((name, up))
        })
        .collect()
}

/// Interfaces carrying an IPv4 address, from `ip -o -4 addr show`.
pub fn parse_ipv4_interfaces(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            fields.next()?;
            let name = fields.next()?;
            (fields.next()? == "inet").then(|| name.to_string())
        })
        .collect()
}

/// Every `dev <name>` token in `ip route` output.
pub fn route_devices(output: &str) -> Vec<String> {
    let mut devices = Vec::new();
    let mut fields = output.split_whitespace();
    while let Some(field) = fields.next() {
        if field == "dev" {
            if let Some(name) = fields.next() {
                if !devices.iter().any(|d| d == name) {
                    devices.push(name.to_string());
                }
            }
        }
    }
    devices
}

/// Names of enabled block rules in `netsh advfirewall firewall show rule
/// name=all` whose remote address covers `target`.
pub fn netsh_block_rules_for(output: &str, target: &str) -> Vec<String> {
    let Ok(target) = target.parse::<Ipv4Addr>() else {
        return Vec::new();
    };

    let mut matches = Vec::new();
    let mut rule: Option<NetshRule> = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key == "rule name" {
            if let Some(done) = rule.take() {
                done.collect_if_blocks(target, &mut matches);
            }
            rule = Some(NetshRule::named(value));
            continue;
        }
        if let Some(current) = rule.as_mut() {
            match key.as_str() {
                "enabled" => current.enabled = value.eq_ignore_ascii_case("yes"),
                "action" => current.block = value.eq_ignore_ascii_case("block"),
                "remoteip" => current.remote = value.to_string(),
                _ => {}
            }
        }
    }
    if let Some(done) = rule {
        done.collect_if_blocks(target, &mut matches);
    }
    matches
}

struct NetshRule {
    name: String,
    enabled: bool,
    block: bool,
    remote: String,
}

impl NetshRule {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
            block: false,
            remote: String::new(),
        }
    }

    fn collect_if_blocks(self, target: Ipv4Addr, matches: &mut Vec<String>) {
        let covers = self
            .remote
            .split(',')
            .any(|spec| ipv4_spec_contains(spec.trim(), target));
        if self.enabled && self.block && covers {
            matches.push(self.name);
        }
    }
}

/// Matches a single address, a CIDR block or an `a-b` range. `Any` never
/// matches so a blanket rule is not deleted for one target.
pub fn ipv4_spec_contains(spec: &str, target: Ipv4Addr) -> bool {
    if let Some((start, end)) = spec.split_once('-') {
        let (Ok(start), Ok(end)) = (start.trim().parse::<Ipv4Addr>(), end.trim().parse::<Ipv4Addr>())
        else {
            return false;
        };
        return (u32::from(start)..=u32::from(end)).contains(&u32::from(target));
    }

    let (addr, prefix) = match spec.split_once('/') {
        Some((addr, prefix)) => (addr, prefix),
        None => (spec, "32"),
    };
    let Ok(addr) = addr.parse::<Ipv4Addr>() else {
        return false;
    };
    // netsh prints host rules as a.b.c.d/255.255.255.255
    let bits = match prefix.parse::<u32>() {
        Ok(bits) if bits <= 32 => bits,
        _ => match prefix.parse::<Ipv4Addr>() {
            Ok(mask) => u32::from(mask).count_ones(),
            Err(_) => return false,
        },
    };
    let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
    u32::from(addr) & mask == u32::from(target) & mask
}
