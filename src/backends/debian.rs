// Instance Agent - Debian Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Debian and Ubuntu (`ifupdown`).
//!
//! Everything lives in `/etc/network/interfaces`. A `networking restart`
//! doesn't take down interfaces that disappeared from the file and doesn't
//! always bring every interface back up, so every interface of the old
//! file is `ifdown`ed first and every interface of the new one `ifup`ed
//! last. `ifup`/`ifdown` fail on interfaces they don't manage, so their
//! status is ignored.


use super::{
    hostname_op, read_or_empty, resolv_conf, Backend, FailurePolicy, InterfaceOp, Rendered,
    RESOLV_CONF,
};
use crate::models::{NetworkConfig, OsFamily, Result};
use crate::storage::ConfigSource;

pub const INTERFACES_FILE: &str = "/etc/network/interfaces";
pub const HOSTNAME_FILE: &str = "/etc/hostname";

const INTERFACES_HEADER: &str = "\
# Used by ifup(8) and ifdown(8). See the interfaces(5) manpage or
# /usr/share/doc/ifupdown/examples for more information.
# The loopback network interface
auto lo
iface lo inet loopback
";

#[derive(Debug, Default, Clone, Copy)]
pub struct DebianBackend;

impl Backend for DebianBackend {
    fn family(&self) -> OsFamily {
        OsFamily::Debian
    }

    fn render(&self, cfg: &NetworkConfig, existing: &dyn ConfigSource) -> Result<Rendered> {
        let mut rendered = Rendered::default();

        let interfaces = interfaces_file(cfg);
        let current = read_or_empty(existing, INTERFACES_FILE)?;

        for name in configured_interfaces(&current) {
            rendered.op(InterfaceOp::down(&name, &["/sbin/ifdown", &name]));
        }

        rendered.op(hostname_op(&cfg.hostname));
        rendered.op(
            InterfaceOp::up("networking", &["/etc/init.d/networking", "restart"], FailurePolicy::Collect)
                .with_action("restart network"),
        );
        for name in configured_interfaces(&interfaces) {
            rendered.op(InterfaceOp::up(&name, &["/sbin/ifup", &name], FailurePolicy::Ignore));
        }

        rendered.write(INTERFACES_FILE, interfaces);
        rendered.write(HOSTNAME_FILE, format!("{}\n", cfg.hostname));
        if let Some(resolv) = resolv_conf(cfg) {
            rendered.write(RESOLV_CONF, resolv);
        }

        Ok(rendered)
    }
}

/// Render `/etc/network/interfaces`.
pub fn interfaces_file(cfg: &NetworkConfig) -> String {
    let mut out = String::from(INTERFACES_HEADER);

    for iface in &cfg.interfaces {
        let mut gateway4 = iface.gateway4.as_deref();
        let mut gateway6 = iface.gateway6.as_deref();
        let mut dns = (!iface.dns.is_empty()).then(|| iface.dns.join(" "));

        for slot in iface.slots() {
            let name = iface.alias_name(slot.index);
            out.push_str(&format!("\nauto {}\n", name));

            if let Some(ip) = slot.ipv4 {
                out.push_str(&format!(
                    "iface {} inet static\n    address {}\n    netmask {}\n",
                    name, ip.address, ip.netmask
                ));
                if let Some(gw) = gateway4.take() {
                    out.push_str(&format!("    gateway {}\n", gw));
                }
            }

            if let Some(ip) = slot.ipv6 {
                out.push_str(&format!(
                    "iface {} inet6 static\n    address {}\n    netmask {}\n",
                    name, ip.address, ip.prefix_len
                ));
                if let Some(gw) = gateway6.take() {
                    out.push_str(&format!("    gateway {}\n", gw));
                }
            }

            if let Some(servers) = dns.take() {
                out.push_str(&format!("    dns-nameservers {}\n", servers));
            }
        }

        for route in &iface.routes {
            out.push_str(&format!(
                "up route add -net {} netmask {} gw {}\n",
                route.network, route.netmask, route.gateway
            ));
            out.push_str(&format!(
                "down route del -net {} netmask {} gw {}\n",
                route.network, route.netmask, route.gateway
            ));
        }
    }

    out
}

/// Interfaces named by `auto`, `iface` and `allow-hotplug` lines, loopback
/// excluded, in first-seen order.
pub fn configured_interfaces(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let keyword = fields.next();
        if !matches!(keyword, Some("auto") | Some("iface") | Some("allow-hotplug")) {
            continue;
        }
        if let Some(name) = fields.next() {
            if !name.starts_with("lo") && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}
