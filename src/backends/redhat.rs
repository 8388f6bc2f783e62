// Instance Agent - Red Hat Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Red Hat, CentOS, Fedora and Oracle (`network-scripts`).
//!
//! One `ifcfg-<if>` per (sub-)interface, one `route-<if>` per interface
//! with static routes, global switches in `/etc/sysconfig/network`.


use super::{
    guest_path, hostname_op, read_or_empty, Backend, FailurePolicy, InterfaceOp, Rendered,
};
use crate::models::{InterfaceConfig, NetworkConfig, OsFamily, Result, GENERATED_HEADER};
use crate::shellvars::ShellConfig;
use crate::storage::ConfigSource;

pub const NETWORK_FILE: &str = "/etc/sysconfig/network";
pub const SCRIPTS_DIR: &str = "/etc/sysconfig/network-scripts";

#[derive(Debug, Default, Clone, Copy)]
pub struct RedHatBackend;

impl Backend for RedHatBackend {
    fn family(&self) -> OsFamily {
        OsFamily::RedHat
    }

    fn render(&self, cfg: &NetworkConfig, existing: &dyn ConfigSource) -> Result<Rendered> {
        let mut rendered = Rendered::default();

        // Retire every interface file we don't rewrite below
        for entry in existing.list_dir(std::path::Path::new(SCRIPTS_DIR))? {
            let managed = entry.name.starts_with("ifcfg-") || entry.name.starts_with("route-");
            if managed && !entry.name.contains('.') && entry.name != "ifcfg-lo" && !entry.is_dir {
                rendered.retire(guest_path(SCRIPTS_DIR, &entry.name));
            }
        }

        for iface in &cfg.interfaces {
            for (name, content) in ifcfg_files(iface) {
                rendered.write(guest_path(SCRIPTS_DIR, &format!("ifcfg-{}", name)), content);
            }
            if let Some(routes) = route_file(iface) {
                rendered.write(guest_path(SCRIPTS_DIR, &format!("route-{}", iface.name)), routes);
            }
        }

        let mut network = ShellConfig::parse(&read_or_empty(existing, NETWORK_FILE)?);
        network.update_scalar_variable("NETWORKING_IPV6", if cfg.has_ipv6() { "yes" } else { "no" });
        network.update_scalar_variable("HOSTNAME", &cfg.hostname);
        rendered.write(NETWORK_FILE, network.serialize());

        rendered.op(hostname_op(&cfg.hostname));
        rendered.op(
            InterfaceOp::up("network", &["/etc/init.d/network", "restart"], FailurePolicy::Abort)
                .with_action("restart network"),
        );

        Ok(rendered)
    }
}

/// `ifcfg-*` content per (sub-)interface, primary first.
pub fn ifcfg_files(iface: &InterfaceConfig) -> Vec<(String, String)> {
    let mut gateway4 = iface.gateway4.as_deref();
    let mut gateway6 = iface.gateway6.as_deref();
    let mut dns = Some(&iface.dns).filter(|d| !d.is_empty());

    iface
        .slots()
        .map(|slot| {
            let name = iface.alias_name(slot.index);
            let mut out = format!(
                "{}\nDEVICE={}\nBOOTPROTO=static\nHWADDR={}\n",
                GENERATED_HEADER, name, iface.mac
            );

            if let Some(ip) = slot.ipv4 {
                out.push_str(&format!("IPADDR={}\nNETMASK={}\n", ip.address, ip.netmask));
                if let Some(gw) = gateway4.take() {
                    out.push_str(&format!("DEFROUTE=yes\nGATEWAY={}\n", gw));
                }
            }

            if let Some(ip) = slot.ipv6 {
                out.push_str(&format!(
                    "IPV6INIT=yes\nIPV6_AUTOCONF=no\nIPV6ADDR={}/{}\n",
                    ip.address, ip.prefix_len
                ));
                if let Some(gw) = gateway6.take() {
                    out.push_str(&format!("IPV6_DEFAULTGW={}%{}\n", gw, name));
                }
            }

            if let Some(servers) = dns.take() {
                for (i, server) in servers.iter().enumerate() {
                    out.push_str(&format!("DNS{}={}\n", i + 1, server));
                }
            }

            out.push_str("ONBOOT=yes\nNM_CONTROLLED=no\n");
            (name, out)
        })
        .collect()
}

/// `route-<if>` content, `None` without static routes.
pub fn route_file(iface: &InterfaceConfig) -> Option<String> {
    if iface.routes.is_empty() {
        return None;
    }

    let mut out = String::new();
    for (i, route) in iface.routes.iter().enumerate() {
        out.push_str(&format!(
            "ADDRESS{i}={}\nNETMASK{i}={}\nGATEWAY{i}={}\n",
            route.network,
            route.netmask,
            route.gateway,
            i = i
        ));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::super::testing::*;
    use super::*;

    #[test]
    fn test_ifcfg_with_alias_and_ipv6() {
        let mut cfg = with_ipv6(two_interfaces("eth0", "eth1"), &[("ffff::2", 96)]);
        cfg.interfaces[0].ipv4.push(ipv4("10.127.32.38", "255.255.255.0"));

        let files = ifcfg_files(&cfg.interfaces[0]);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, "eth0");
        assert_eq!(
            files[0].1,
            "\
# Automatically generated, do not edit
DEVICE=eth0
BOOTPROTO=static
HWADDR=40:40:8f:1e:a0:0a
IPADDR=10.127.31.38
NETMASK=255.255.255.0
DEFROUTE=yes
GATEWAY=10.127.31.1
IPV6INIT=yes
IPV6_AUTOCONF=no
IPV6ADDR=ffff::2/96
IPV6_DEFAULTGW=ffff::1%eth0
DNS1=10.6.24.4
DNS2=10.6.24.5
ONBOOT=yes
NM_CONTROLLED=no
"
        );
        assert_eq!(files[1].0, "eth0:1");
        assert_eq!(
            files[1].1,
            "\
# Automatically generated, do not edit
DEVICE=eth0:1
BOOTPROTO=static
HWADDR=40:40:8f:1e:a0:0a
IPADDR=10.127.32.38
NETMASK=255.255.255.0
ONBOOT=yes
NM_CONTROLLED=no
"
        );
    }

    #[test]
    fn test_hwaddr_on_every_file() {
        let mut cfg = two_interfaces("eth0", "eth1");
        cfg.interfaces[1].ipv4.push(ipv4("192.168.3.30", "255.255.255.0"));

        for iface in &cfg.interfaces {
            let files = ifcfg_files(iface);
            assert!(!files.is_empty());
            for (name, content) in files {
                let expected = format!("BOOTPROTO=static\nHWADDR={}\n", iface.mac);
                assert!(content.contains(&expected), "{} lacks HWADDR", name);
            }
        }
    }

    #[test]
    fn test_route_file() {
        let cfg = two_interfaces("eth0", "eth1");
        assert!(route_file(&cfg.interfaces[0]).is_none());
        assert_eq!(
            route_file(&cfg.interfaces[1]).unwrap(),
            "\
ADDRESS0=10.176.0.0
NETMASK0=255.248.0.0
GATEWAY0=10.177.96.1
ADDRESS1=10.191.192.0
NETMASK1=255.255.192.0
GATEWAY1=10.177.96.1
"
        );
    }

    #[test]
    fn test_render_retires_stale_files() {
        let source = MemorySource::new()
            .with_file("/etc/sysconfig/network", "NETWORKING=yes\nHOSTNAME=old\n")
            .with_file("/etc/sysconfig/network-scripts/ifcfg-lo", "DEVICE=lo\n")
            .with_file("/etc/sysconfig/network-scripts/ifcfg-eth0", "DEVICE=eth0\n")
            .with_file("/etc/sysconfig/network-scripts/ifcfg-eth2", "DEVICE=eth2\n")
            .with_file("/etc/sysconfig/network-scripts/route-eth2", "ADDRESS0=1.2.3.0\n")
            .with_file("/etc/sysconfig/network-scripts/ifcfg-eth0.bak", "x\n")
            .with_file("/etc/sysconfig/network-scripts/ifup-eth", "#!/bin/sh\n");

        let rendered = RedHatBackend
            .render(&two_interfaces("eth0", "eth1"), &source)
            .unwrap();

        let removed: Vec<&Path> = rendered.remove.iter().map(|p| p.as_path()).collect();
        assert_eq!(
            removed,
            vec![
                Path::new("/etc/sysconfig/network-scripts/ifcfg-eth2"),
                Path::new("/etc/sysconfig/network-scripts/route-eth2"),
            ]
        );
        assert!(rendered
            .files
            .contains_key(Path::new("/etc/sysconfig/network-scripts/route-eth1")));
        assert_eq!(
            rendered.files[Path::new(NETWORK_FILE)],
            "NETWORKING=yes\nHOSTNAME=myhostname\nNETWORKING_IPV6=no\n"
        );

        let ops: Vec<String> = rendered.ops.iter().map(|o| o.command_line()).collect();
        assert_eq!(ops, vec!["/bin/hostname myhostname", "/etc/init.d/network restart"]);
        assert!(rendered.ops.iter().all(|o| o.policy == FailurePolicy::Abort));
    }
}
