use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_ports::{
    ActuatorReport, DiskActuator, InterfaceInfo, NetworkActuator, NetworkProbe, ProcessActuator,
    ProcessInfo, ProcessSort, ServiceActuator,
};

use crate::command::{CommandRunner, on_path};
use crate::parse::{parse_ip_link, parse_ipv4_interfaces, parse_ps, route_devices};

const JOURNAL_VACUUM: &str = "--vacuum-size=500M";
const INODE_DIRS: [&str; 6] = [
    "/tmp",
    "/var/tmp",
    "/var/cache",
    "/var/spool",
    "/var/lib/docker",
    "/var/lib/systemd/coredump",
];
const INODE_MAX_AGE_DAYS: &str = "+3";
const LOG_MAX_AGE_DAYS: &str = "+7";
const TMP_MAX_AGE_DAYS: &str = "+3";
const IPTABLES_RULES: &str = "/etc/iptables/rules.v4";
const DNS_UNITS: [&str; 2] = ["NetworkManager", "systemd-resolved"];
const PRIMARY_PROBE: &str = "1.1.1.1";
const IDLE_BYTES: u64 = 1024;

fn under(dir: &str, mount: &str) -> bool {
    mount == "/" || dir == mount || dir.starts_with(&format!("{}/", mount.trim_end_matches('/')))
}

/// systemd/iproute2 host.
#[derive(Debug, Clone, Default)]
pub struct LinuxHost {
    runner: CommandRunner,
}

impl LinuxHost {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn unit_name(service: &str) -> String {
        if service.contains('.') {
            service.to_string()
        } else {
            format!("{service}.service")
        }
    }

    async fn unit_is_active(&self, unit: &str) -> bool {
        self.runner
            .succeeds("systemctl", &["is-active", "--quiet", unit])
            .await
    }

    /// Deletes files older than `age` under `dir`, then empty directories.
    /// Private systemd and snap tmp trees are left alone.
    async fn prune(&self, dir: &str, age: &str) -> Result<String, String> {
        if !Path::new(dir).exists() {
            return Ok(format!("{dir} absent"));
        }
        let files = [
            dir, "-xdev", "-type", "f", "-mtime", age,
            "!", "-path", "*/systemd-private-*",
            "!", "-path", "*/snap-private-tmp*",
            "-delete",
        ];
        let empty_dirs = [
            dir, "-xdev", "-mindepth", "1", "-type", "d", "-empty",
            "!", "-path", "*/systemd-private-*",
            "!", "-path", "*/snap-private-tmp*",
            "-delete",
        ];
        self.runner
            .run("find", &files)
            .await
            .map_err(|e| e.to_string())?;
        self.runner
            .run("find", &empty_dirs)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("{dir} pruned"))
    }

    async fn traffic_counters(&self, names: &[String]) -> HashMap<String, u64> {
        let mut counters = HashMap::new();
        for name in names {
            let mut total = 0u64;
            for stat in ["rx_bytes", "tx_bytes"] {
                let path = format!("/sys/class/net/{name}/statistics/{stat}");
                if let Ok(raw) = tokio::fs::read_to_string(&path).await {
                    total += raw.trim().parse::<u64>().unwrap_or(0);
                }
            }
            counters.insert(name.clone(), total);
        }
        counters
    }
}

#[async_trait]
impl ServiceActuator for LinuxHost {
    async fn restart(&self, service: &str) -> Result<ActuatorReport> {
        let unit = Self::unit_name(service);
        Ok(self
            .runner
            .report(&format!("restart {unit}"), "systemctl", &["restart", &unit])
            .await)
    }
}

#[async_trait]
impl ProcessActuator for LinuxHost {
    async fn list_processes(&self, sort: ProcessSort, limit: usize) -> Result<Vec<ProcessInfo>> {
        let order = match sort {
            ProcessSort::Cpu => "--sort=-pcpu",
            ProcessSort::Memory => "--sort=-rss",
        };
        let output = self
            .runner
            .run(
                "ps",
                &["-eo", "pid=,ppid=,user=,etimes=,pcpu=,rss=,comm=", order],
            )
            .await?;
        let mut processes = parse_ps(&output.stdout);
        match sort {
            ProcessSort::Cpu => processes.sort_by(|a, b| b.cpu_pct.total_cmp(&a.cpu_pct)),
            ProcessSort::Memory => processes.sort_by(|a, b| b.rss_kb.cmp(&a.rss_kb)),
        }
        processes.truncate(limit);
        Ok(processes)
    }

    #[cfg(unix)]
    async fn terminate(&self, pid: u32, force: bool) -> Result<ActuatorReport> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        let Ok(raw) = i32::try_from(pid) else {
            return Ok(ActuatorReport::failed(format!("pid {pid} out of range")));
        };
        Ok(match kill(Pid::from_raw(raw), signal) {
            Ok(()) => ActuatorReport::ok(format!("sent {signal} to {pid}")),
            Err(errno) => ActuatorReport::failed(format!("{signal} to {pid} failed: {errno}")),
        })
    }

    #[cfg(not(unix))]
    async fn terminate(&self, pid: u32, force: bool) -> Result<ActuatorReport> {
        let signal = if force { "-KILL" } else { "-TERM" };
        let pid = pid.to_string();
        Ok(self
            .runner
            .report(&format!("kill {signal} {pid}"), "kill", &[signal, &pid])
            .await)
    }
}

#[async_trait]
impl DiskActuator for LinuxHost {
    async fn remount_rw(&self, mount: &str) -> Result<ActuatorReport> {
        Ok(self
            .runner
            .report(
                &format!("remount {mount} rw"),
                "mount",
                &["-o", "remount,rw", mount],
            )
            .await)
    }

    async fn cleanup_inodes(&self, mount: &str) -> Result<ActuatorReport> {
        let mut done = Vec::new();
        let mut failed = Vec::new();
        for dir in INODE_DIRS.into_iter().filter(|dir| under(dir, mount)) {
            match self.prune(dir, INODE_MAX_AGE_DAYS).await {
                Ok(note) => done.push(note),
                Err(e) => failed.push(e),
            }
        }
        if done.is_empty() && failed.is_empty() {
            return Ok(ActuatorReport::failed(format!(
                "no inode-heavy directories on {mount}"
            )));
        }
        Ok(if failed.is_empty() {
            ActuatorReport::ok(done.join(", "))
        } else {
            ActuatorReport::failed(failed.join("; "))
        })
    }

    async fn cleanup_disk(&self, mount: &str) -> Result<ActuatorReport> {
        let mut notes = Vec::new();
        let mut failed = Vec::new();

        if under("/var/log", mount) {
            if on_path("journalctl") {
                match self.runner.run("journalctl", &[JOURNAL_VACUUM]).await {
                    Ok(_) => notes.push("journal vacuumed".to_string()),
                    Err(e) => failed.push(e.to_string()),
                }
            }
            for pattern in ["*.gz", "*.img", "*.[0-9]"] {
                let args = [
                    "/var/log", "-xdev", "-type", "f", "-name", pattern,
                    "-mtime", LOG_MAX_AGE_DAYS, "-delete",
                ];
                if let Err(e) = self.runner.run("find", &args).await {
                    failed.push(e.to_string());
                }
            }
            notes.push("rotated logs pruned".to_string());
        }

        for dir in ["/tmp", "/var/tmp"].into_iter().filter(|dir| under(dir, mount)) {
            match self.prune(dir, TMP_MAX_AGE_DAYS).await {
                Ok(note) => notes.push(note),
                Err(e) => failed.push(e),
            }
        }

        if notes.is_empty() && failed.is_empty() {
            return Ok(ActuatorReport::failed(format!(
                "no cleanup targets on {mount}"
            )));
        }
        Ok(if failed.is_empty() {
            ActuatorReport::ok(notes.join(", "))
        } else {
            ActuatorReport::failed(failed.join("; "))
        })
    }
}

#[async_trait]
impl NetworkActuator for LinuxHost {
    async fn reload_firewall(&self, _target: &str) -> Result<ActuatorReport> {
        if on_path("firewall-cmd") && self.unit_is_active("firewalld").await {
            return Ok(self
                .runner
                .report("firewalld reload", "firewall-cmd", &["--reload"])
                .await);
        }
        if on_path("ufw") {
            return Ok(self.runner.report("ufw reload", "ufw", &["reload"]).await);
        }
        if on_path("iptables-restore") && Path::new(IPTABLES_RULES).exists() {
            return Ok(self
                .runner
                .report("iptables restore", "iptables-restore", &[IPTABLES_RULES])
                .await);
        }
        Ok(ActuatorReport::failed(
            "no firewall manager found (firewalld, ufw, iptables)",
        ))
    }

    async fn restart_dns_cache(&self) -> Result<ActuatorReport> {
        for unit in DNS_UNITS {
            let unit = format!("{unit}.service");
            if self.unit_is_active(&unit).await {
                return Ok(self
                    .runner
                    .report(&format!("restart {unit}"), "systemctl", &["restart", &unit])
                    .await);
            }
        }
        Ok(ActuatorReport::failed("no DNS resolver unit is active"))
    }

    async fn bounce_interface(&self, interface: &str) -> Result<ActuatorReport> {
        if let Err(e) = self
            .runner
            .run("ip", &["link", "set", interface, "down"])
            .await
        {
            return Ok(ActuatorReport::failed(format!("{interface} down failed: {e}")));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(self
            .runner
            .report(
                &format!("bounce {interface}"),
                "ip",
                &["link", "set", interface, "up"],
            )
            .await)
    }
}

#[async_trait]
impl NetworkProbe for LinuxHost {
    async fn ping(&self, target: &str, interface: Option<&str>) -> Result<bool> {
        let mut args = vec!["-c", "2", "-W", "2"];
        if let Some(interface) = interface {
            args.extend(["-I", interface]);
        }
        args.push(target);
        Ok(self.runner.succeeds("ping", &args).await)
    }

    async fn resolves(&self, name: &str) -> Result<bool> {
        Ok(self.runner.succeeds("getent", &["hosts", name]).await)
    }

    async fn has_default_route(&self) -> Result<bool> {
        let output = self.runner.run("ip", &["route", "show", "default"]).await?;
        Ok(!route_devices(&output.stdout).is_empty())
    }

    async fn interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let links = self.runner.run("ip", &["-o", "link", "show"]).await?;
        let addrs = self.runner.run("ip", &["-o", "-4", "addr", "show"]).await?;
        let defaults = self.runner.run("ip", &["route", "show", "default"]).await?;
        let primary = self
            .runner
            .output("ip", &["route", "get", PRIMARY_PROBE])
            .await?;

        let links: Vec<(String, bool)> = parse_ip_link(&links.stdout)
            .into_iter()
            .filter(|(name, _)| name != "lo")
            .collect();
        let with_ipv4 = parse_ipv4_interfaces(&addrs.stdout);
        let default_devs = route_devices(&defaults.stdout);
        let primary_devs = route_devices(&primary.stdout);

        let names: Vec<String> = links.iter().map(|(name, _)| name.clone()).collect();
        let before = self.traffic_counters(&names).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let after = self.traffic_counters(&names).await;

        Ok(links
            .into_iter()
            .map(|(name, is_up)| {
                let delta = after
                    .get(&name)
                    .copied()
                    .unwrap_or(0)
                    .saturating_sub(before.get(&name).copied().unwrap_or(0));
                InterfaceInfo {
                    is_up,
                    has_ipv4: with_ipv4.contains(&name),
                    is_primary: primary_devs.contains(&name),
                    has_default_route: default_devs.contains(&name),
                    low_traffic: delta <= IDLE_BYTES,
                    name,
                }
            })
            .collect())
    }
}
