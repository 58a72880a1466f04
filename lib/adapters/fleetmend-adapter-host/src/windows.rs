use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_ports::{
    ActuatorReport, DiskActuator, InterfaceInfo, NetworkActuator, NetworkProbe, ProcessActuator,
    ProcessInfo, ProcessSort, ServiceActuator,
};

use crate::command::CommandRunner;
use crate::error::ActuatorError;
use crate::parse::{
    WindowsAdapter, netsh_block_rules_for, parse_windows_adapters, parse_windows_processes,
};

const PROCESSES_SCRIPT: &str = "Get-Process -IncludeUserName | Select-Object Id, ProcessName, \
    UserName, CPU, WorkingSet64, @{n='Uptime';e={ if ($_.StartTime) { \
    [int64]((Get-Date) - $_.StartTime).TotalSeconds } else { 0 } }} | ConvertTo-Json -Compress";

const ADAPTERS_SCRIPT: &str = "Get-NetAdapter | ForEach-Object { $i = $_.ifIndex; \
    $s = Get-NetAdapterStatistics -Name $_.Name -ErrorAction SilentlyContinue; \
    [pscustomobject]@{ Name = $_.Name; Up = ($_.Status -eq 'Up'); \
    HasIPv4 = [bool](Get-NetIPAddress -InterfaceIndex $i -AddressFamily IPv4 -ErrorAction SilentlyContinue); \
    DefaultRoute = [bool](Get-NetRoute -InterfaceIndex $i -DestinationPrefix '0.0.0.0/0' -ErrorAction SilentlyContinue); \
    Bytes = [int64]($s.ReceivedBytes + $s.SentBytes) } } | ConvertTo-Json -Compress";

const CLEANUP_SCRIPT: &str = "Remove-Item -Path \"$env:TEMP\\*\" -Recurse -Force -ErrorAction SilentlyContinue; \
    Remove-Item -Path \"$env:SystemRoot\\Temp\\*\" -Recurse -Force -ErrorAction SilentlyContinue; \
    Clear-RecycleBin -Force -ErrorAction SilentlyContinue";

const IDLE_BYTES: i64 = 1024;

/// PowerShell/netsh host.
#[derive(Debug, Clone, Default)]
pub struct WindowsHost {
    runner: CommandRunner,
}

impl WindowsHost {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    async fn powershell(&self, script: &str) -> Result<String, ActuatorError> {
        let output = self
            .runner
            .run(
                "powershell",
                &["-NoProfile", "-NonInteractive", "-Command", script],
            )
            .await?;
        Ok(output.stdout)
    }

    async fn powershell_report(&self, what: &str, script: &str) -> ActuatorReport {
        self.runner
            .report(
                what,
                "powershell",
                &["-NoProfile", "-NonInteractive", "-Command", script],
            )
            .await
    }

    async fn adapters(&self) -> Result<Vec<WindowsAdapter>> {
        let raw = self.powershell(ADAPTERS_SCRIPT).await?;
        parse_windows_adapters(&raw)
    }
}

/// Single-quoted PowerShell literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl ServiceActuator for WindowsHost {
    async fn restart(&self, service: &str) -> Result<ActuatorReport> {
        let script = format!("Restart-Service -Name {} -Force -ErrorAction Stop", quote(service));
        Ok(self
            .powershell_report(&format!("restart {service}"), &script)
            .await)
    }
}

#[async_trait]
impl ProcessActuator for WindowsHost {
    async fn list_processes(&self, sort: ProcessSort, limit: usize) -> Result<Vec<ProcessInfo>> {
        let raw = self.powershell(PROCESSES_SCRIPT).await?;
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut processes = parse_windows_processes(&raw, cores)?;
        processes.retain(|p| p.pid > 4);
        match sort {
            ProcessSort::Cpu => processes.sort_by(|a, b| b.cpu_pct.total_cmp(&a.cpu_pct)),
            ProcessSort::Memory => processes.sort_by(|a, b| b.rss_kb.cmp(&a.rss_kb)),
        }
        processes.truncate(limit);
        Ok(processes)
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<ActuatorReport> {
        let pid = pid.to_string();
        let mut args = vec!["/PID", pid.as_str()];
        if force {
            args.push("/F");
        }
        Ok(self
            .runner
            .report(&format!("taskkill {pid}"), "taskkill", &args)
            .await)
    }
}

#[async_trait]
impl DiskActuator for WindowsHost {
    async fn remount_rw(&self, mount: &str) -> Result<ActuatorReport> {
        Ok(ActuatorReport::failed(
            ActuatorError::Unsupported(format!("remount of {mount}")).to_string(),
        ))
    }

    async fn cleanup_inodes(&self, mount: &str) -> Result<ActuatorReport> {
        Ok(ActuatorReport::failed(
            ActuatorError::Unsupported(format!("inode cleanup of {mount}")).to_string(),
        ))
    }

    async fn cleanup_disk(&self, mount: &str) -> Result<ActuatorReport> {
        Ok(self
            .powershell_report(&format!("cleanup {mount}"), CLEANUP_SCRIPT)
            .await)
    }
}

#[async_trait]
impl NetworkActuator for WindowsHost {
    /// Deletes enabled block rules covering `target`. Nothing is reset when no
    /// rule matches.
    async fn reload_firewall(&self, target: &str) -> Result<ActuatorReport> {
        let rules = self
            .runner
            .run("netsh", &["advfirewall", "firewall", "show", "rule", "name=all"])
            .await?;
        let matching = netsh_block_rules_for(&rules.stdout, target);
        if matching.is_empty() {
            return Ok(ActuatorReport::failed(format!(
                "no block rule found for {target}"
            )));
        }

        let mut deleted = Vec::new();
        for name in &matching {
            let selector = format!("name={name}");
            match self
                .runner
                .run("netsh", &["advfirewall", "firewall", "delete", "rule", &selector])
                .await
            {
                Ok(_) => deleted.push(name.clone()),
                Err(e) => tracing::warn!(rule = %name, "Failed to delete firewall rule: {}", e),
            }
        }
        Ok(if deleted.is_empty() {
            ActuatorReport::failed(format!("could not delete rules {}", matching.join(", ")))
        } else {
            ActuatorReport::ok(format!("deleted rules {}", deleted.join(", ")))
        })
    }

    async fn restart_dns_cache(&self) -> Result<ActuatorReport> {
        Ok(self
            .powershell_report(
                "restart Dnscache",
                "Restart-Service -Name 'Dnscache' -Force -ErrorAction Stop",
            )
            .await)
    }

    async fn bounce_interface(&self, interface: &str) -> Result<ActuatorReport> {
        let name = quote(interface);
        let script = format!(
            "Disable-NetAdapter -Name {name} -Confirm:$false -ErrorAction Stop; \
             Start-Sleep -Seconds 1; \
             Enable-NetAdapter -Name {name} -Confirm:$false -ErrorAction Stop"
        );
        Ok(self
            .powershell_report(&format!("bounce {interface}"), &script)
            .await)
    }
}

#[async_trait]
impl NetworkProbe for WindowsHost {
    async fn ping(&self, target: &str, interface: Option<&str>) -> Result<bool> {
        if let Some(interface) = interface {
            let script = format!(
                "$a = (Get-NetIPAddress -InterfaceAlias {} -AddressFamily IPv4 -ErrorAction Stop | \
                 Select-Object -First 1).IPAddress; ping -n 2 -w 2000 -S $a {}; exit $LASTEXITCODE",
                quote(interface),
                quote(target)
            );
            return Ok(self.powershell(&script).await.is_ok());
        }
        Ok(self
            .runner
            .succeeds("ping", &["-n", "2", "-w", "2000", target])
            .await)
    }

    async fn resolves(&self, name: &str) -> Result<bool> {
        let script = format!("Resolve-DnsName -Name {} -ErrorAction Stop | Out-Null", quote(name));
        Ok(self.powershell(&script).await.is_ok())
    }

    async fn has_default_route(&self) -> Result<bool> {
        Ok(self.adapters().await?.iter().any(|a| a.default_route))
    }

    async fn interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let before: HashMap<String, i64> = self
            .adapters()
            .await?
            .into_iter()
            .map(|a| (a.name, a.bytes))
            .collect();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let after = self.adapters().await?;

        Ok(after
            .into_iter()
            .map(|a| {
                let delta = a.bytes - before.get(&a.name).copied().unwrap_or(a.bytes);
                InterfaceInfo {
                    is_up: a.up,
                    has_ipv4: a.has_ipv4,
                    // Windows has no `ip route get`; the default-route adapter is primary.
                    is_primary: a.default_route,
                    has_default_route: a.default_route,
                    low_traffic: delta.abs() <= IDLE_BYTES,
                    name: a.name,
                }
            })
            .collect())
    }
}
