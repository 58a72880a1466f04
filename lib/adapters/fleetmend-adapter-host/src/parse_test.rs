use std::net::Ipv4Addr;

use pretty_assertions::assert_eq;

use crate::parse::{
    WindowsAdapter, ipv4_spec_contains, netsh_block_rules_for, parse_ip_link,
    parse_ipv4_interfaces, parse_ps, parse_windows_adapters, parse_windows_processes,
    route_devices,
};

#[test]
fn ps_output_keeps_command_names_with_spaces() {
    let output = "\
    1     0 root        86400  0.0  12000 systemd
 4242     1 app           600 99.5   2048 stress worker
  bad line
";
    let processes = parse_ps(output);
    assert_eq!(processes.len(), 2);
    assert_eq!(processes[1].pid, 4242);
    assert_eq!(processes[1].ppid, 1);
    assert_eq!(processes[1].user, "app");
    assert_eq!(processes[1].uptime_seconds, 600);
    assert_eq!(processes[1].cpu_pct, 99.5);
    assert_eq!(processes[1].rss_kb, 2048);
    assert_eq!(processes[1].name, "stress worker");
}

#[test]
fn windows_processes_accept_a_single_object() {
    let raw = r#"{"Id":812,"ProcessName":"sqlservr","UserName":"NT AUTHORITY\\SYSTEM","CPU":60.0,"WorkingSet64":4194304,"Uptime":120}"#;
    let processes = parse_windows_processes(raw, 2).unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].name, "sqlservr");
    assert_eq!(processes[0].user, "NT AUTHORITY\\SYSTEM");
    assert_eq!(processes[0].rss_kb, 4096);
    assert_eq!(processes[0].cpu_pct, 25.0);
}

#[test]
fn windows_processes_tolerate_missing_fields() {
    let raw = r#"[{"Id":4,"ProcessName":"System","UserName":null,"CPU":null,"WorkingSet64":null,"Uptime":0}]"#;
    let processes = parse_windows_processes(raw, 4).unwrap();
    assert_eq!(processes[0].cpu_pct, 0.0);
    assert_eq!(processes[0].user, "");
    assert!(parse_windows_processes("  ", 4).unwrap().is_empty());
}

#[test]
fn windows_adapters_parse() {
    let raw = r#"[{"Name":"Ethernet","Up":true,"HasIPv4":true,"DefaultRoute":true,"Bytes":900},
                  {"Name":"Ethernet 2","Up":true,"HasIPv4":true,"DefaultRoute":false,"Bytes":10}]"#;
    let adapters = parse_windows_adapters(raw).unwrap();
    assert_eq!(
        adapters[1],
        WindowsAdapter {
            name: "Ethernet 2".to_string(),
            up: true,
            has_ipv4: true,
            default_route: false,
            bytes: 10,
        }
    );
}

#[test]
fn ip_link_reports_state_and_strips_vlan_parent() {
    let output = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT
3: eth1: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN mode DEFAULT
4: eth0.10@eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP
";
    assert_eq!(
        parse_ip_link(output),
        vec![
            ("lo".to_string(), true),
            ("eth0".to_string(), true),
            ("eth1".to_string(), false),
            ("eth0.10".to_string(), true),
        ]
    );
}

#[test]
fn ipv4_interfaces_and_route_devices() {
    let addrs = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever
";
    let with_ipv4 = parse_ipv4_interfaces(addrs);
    assert!(with_ipv4.contains("eth0"));
    assert!(!with_ipv4.contains("eth1"));

    let routes = "default via 10.0.0.1 dev eth0 proto dhcp metric 100\n\
                  default via 192.168.1.1 dev wlan0 metric 600\n";
    assert_eq!(route_devices(routes), vec!["eth0", "wlan0"]);
    assert!(route_devices("").is_empty());
}

#[test]
fn netsh_rules_match_only_enabled_blocks_covering_target() {
    let output = "\
Rule Name:                            TestBlock
----------------------------------------------------------------------
Enabled:                              Yes
Direction:                            Out
Action:                               Block
RemoteIP:                             192.168.56.14/255.255.255.255

Rule Name:                            Subnet
Enabled:                              Yes
Action:                               Block
RemoteIP:                             10.0.0.0/8,172.16.0.1-172.16.0.9

Rule Name:                            Disabled
Enabled:                              No
Action:                               Block
RemoteIP:                             192.168.56.0/24

Rule Name:                            Everything
Enabled:                              Yes
Action:                               Block
RemoteIP:                             Any
";
    assert_eq!(netsh_block_rules_for(output, "192.168.56.14"), vec!["TestBlock"]);
    assert_eq!(netsh_block_rules_for(output, "172.16.0.5"), vec!["Subnet"]);
    assert!(netsh_block_rules_for(output, "8.8.8.8").is_empty());
    assert!(netsh_block_rules_for(output, "example.com").is_empty());
}

#[test]
fn ipv4_specs() {
    let target: Ipv4Addr = "10.1.2.3".parse().unwrap();
    assert!(ipv4_spec_contains("10.1.2.3", target));
    assert!(ipv4_spec_contains("10.0.0.0/8", target));
    assert!(ipv4_spec_contains("0.0.0.0/0", target));
    assert!(!ipv4_spec_contains("10.1.3.0/24", target));
    assert!(ipv4_spec_contains("10.1.2.1-10.1.2.9", target));
    assert!(!ipv4_spec_contains("Any", target));
}
