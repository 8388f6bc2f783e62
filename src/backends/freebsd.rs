// Instance Agent - FreeBSD Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! FreeBSD (`/etc/rc.conf`).
//!
//! Network settings are merged into the global `rc.conf`: every network
//! key the agent owns is dropped and the full set re-appended, so the rest
//! of the file survives untouched. Routes and gateways are global.

use std::path::Path;

use super::{hostname_op, resolv_conf, Backend, FailurePolicy, InterfaceOp, Rendered, RESOLV_CONF};
use crate::models::{Error, NetworkConfig, OsFamily, Result};
use crate::shellvars::ShellConfig;
use crate::storage::ConfigSource;

pub const RC_CONF: &str = "/etc/rc.conf";

/// Keys rewritten on every run.
const OWNED_PREFIXES: &[&str] = &[
    "ifconfig",
    "defaultrouter",
    "ipv6_ifconfig",
    "ipv6_defaultrouter",
    "ipv6_enable",
    "ipv6_network_interfaces",
    "static_routes",
    "route_",
    "dhcpd_",
    "hostname",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct FreeBsdBackend;

impl Backend for FreeBsdBackend {
    fn family(&self) -> OsFamily {
        OsFamily::FreeBsd
    }

    fn render(&self, cfg: &NetworkConfig, existing: &dyn ConfigSource) -> Result<Rendered> {
        let current = existing
            .read(Path::new(RC_CONF))?
            .ok_or_else(|| Error::render(OsFamily::FreeBsd.as_str(), format!("{} is missing", RC_CONF)))?;

        let mut rendered = Rendered::default();
        rendered.write(RC_CONF, merge_rc_conf(&current, cfg));
        if let Some(resolv) = resolv_conf(cfg) {
            rendered.write(RESOLV_CONF, resolv);
        }

        rendered.op(hostname_op(&cfg.hostname));
        rendered.op(
            InterfaceOp::up("netif", &["/etc/rc.d/netif", "restart"], FailurePolicy::Abort)
                .with_action("restart IPv4 networking"),
        );
        rendered.op(
            InterfaceOp::up("network_ipv6", &["/etc/rc.d/network_ipv6", "restart"], FailurePolicy::Abort)
                .with_action("restart IPv6 networking"),
        );

        Ok(rendered)
    }
}

/// Merge the network settings of `cfg` into an existing `rc.conf`.
pub fn merge_rc_conf(current: &str, cfg: &NetworkConfig) -> String {
    let mut rc = ShellConfig::parse(current);
    rc.remove_lines_with_prefix(OWNED_PREFIXES);

    rc.append_line("dhcpd_enable=\"NO\"");
    rc.append_line(format!("hostname={}", cfg.hostname));

    let mut routes = Vec::new();
    let mut ipv6_interfaces = Vec::new();

    for iface in &cfg.interfaces {
        if !iface.ipv6.is_empty() {
            ipv6_interfaces.push(iface.name.as_str());
        }

        for slot in iface.slots() {
            let name = match slot.index {
                0 => iface.name.clone(),
                n => format!("{}_alias{}", iface.name, n - 1),
            };
            let up = if slot.index == 0 { " up" } else { "" };

            if let Some(ip) = slot.ipv4 {
                rc.append_line(format!(
                    "ifconfig_{}=\"{} netmask {}{}\"",
                    name, ip.address, ip.netmask, up
                ));
            }
            if let Some(ip) = slot.ipv6 {
                rc.append_line(format!("ipv6_ifconfig_{}=\"{}/{}\"", name, ip.address, ip.prefix_len));
            }
        }

        for route in &iface.routes {
            routes.push(if route.network.contains(':') {
                format!("-net {}/{} {}", route.network, route.prefix_len, route.gateway)
            } else {
                format!("-net {} -netmask {} {}", route.network, route.netmask, route.gateway)
            });
        }
    }

    if !routes.is_empty() {
        let names: Vec<String> = (0..routes.len()).map(|i| format!("lan{}", i)).collect();
        for (name, route) in names.iter().zip(&routes) {
            rc.append_line(format!("route_{}=\"{}\"", name, route));
        }
        rc.append_line(format!("static_routes=\"{}\"", names.join(",")));
    }

    if !ipv6_interfaces.is_empty() {
        rc.append_line("ipv6_enable=\"YES\"");
        rc.append_line(format!("ipv6_network_interfaces=\"{}\"", ipv6_interfaces.join(",")));
    }

    if let Some(gw) = cfg.gateway4() {
        rc.append_line(format!("defaultrouter=\"{}\"", gw));
    }
    if let Some(gw) = cfg.gateway6() {
        rc.append_line(format!("ipv6_defaultrouter=\"{}\"", gw));
    }

    rc.serialize()
}
