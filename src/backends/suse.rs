// Instance Agent - SUSE Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! openSUSE and SLES (`/etc/sysconfig/network`).
//!
//! One `ifcfg-<if>` per interface carrying every address (numbered
//! `_N` keys for the secondary ones), one `ifroute-<if>` with static
//! routes and default gateways, DNS servers in the netconfig file.

use std::path::Path;

use super::{
    guest_path, hostname_op, read_or_empty, Backend, FailurePolicy, InterfaceOp, Rendered,
};
use crate::models::{InterfaceConfig, NetworkConfig, OsFamily, Result, GENERATED_HEADER};
use crate::shellvars::ShellConfig;
use crate::storage::ConfigSource;

pub const NETCONFIG_DIR: &str = "/etc/sysconfig/network";
pub const DNS_CONFIG_FILE: &str = "/etc/sysconfig/network/config";
pub const HOSTNAME_FILE: &str = "/etc/HOSTNAME";

#[derive(Debug, Default, Clone, Copy)]
pub struct SuseBackend;

impl Backend for SuseBackend {
    fn family(&self) -> OsFamily {
        OsFamily::Suse
    }

    fn render(&self, cfg: &NetworkConfig, existing: &dyn ConfigSource) -> Result<Rendered> {
        let mut rendered = Rendered::default();

        for entry in existing.list_dir(Path::new(NETCONFIG_DIR))? {
            let name = entry.name.as_str();
            let managed = ["ifcfg-", "ifroute-", "route-"]
                .iter()
                .any(|prefix| name.starts_with(prefix));
            if entry.is_dir || name == "ifcfg-lo" {
                continue;
            }
            if (managed && !name.contains('.')) || name == "routes" {
                rendered.retire(guest_path(NETCONFIG_DIR, name));
            }
        }

        for iface in &cfg.interfaces {
            rendered.write(
                guest_path(NETCONFIG_DIR, &format!("ifcfg-{}", iface.name)),
                ifcfg_file(iface),
            );
            if let Some(routes) = ifroute_file(iface) {
                rendered.write(guest_path(NETCONFIG_DIR, &format!("ifroute-{}", iface.name)), routes);
            }
        }

        let servers = cfg.nameservers();
        if !servers.is_empty() {
            let mut dns = ShellConfig::parse(&read_or_empty(existing, DNS_CONFIG_FILE)?);
            dns.update_scalar_variable(
                "NETCONFIG_DNS_STATIC_SERVERS",
                &format!("\"{}\"", servers.join(" ")),
            );
            rendered.write(DNS_CONFIG_FILE, dns.serialize());
        }

        rendered.write(HOSTNAME_FILE, format!("{}\n", cfg.hostname));

        rendered.op(hostname_op(&cfg.hostname));
        rendered.op(
            InterfaceOp::up("network", &["/etc/init.d/network", "restart"], FailurePolicy::Abort)
                .with_action("restart network"),
        );

        Ok(rendered)
    }
}

/// `ifcfg-<if>`: the first address unnumbered, the rest as `_N` entries.
pub fn ifcfg_file(iface: &InterfaceConfig) -> String {
    let mut out = format!("{}\nBOOTPROTO='static'\n", GENERATED_HEADER);
    let mut next: Option<usize> = None;

    for ip in &iface.ipv4 {
        match next {
            None => {
                out.push_str(&format!("IPADDR='{}'\nNETMASK='{}'\n", ip.address, ip.netmask));
                next = Some(0);
            }
            Some(n) => {
                out.push_str(&format!(
                    "IPADDR_{n}='{}'\nNETMASK_{n}='{}'\nLABEL_{n}='{n}'\n",
                    ip.address,
                    ip.netmask,
                    n = n
                ));
                next = Some(n + 1);
            }
        }
    }

    for ip in &iface.ipv6 {
        match next {
            None => {
                out.push_str(&format!("IPADDR='{}'\nPREFIXLEN='{}'\n", ip.address, ip.prefix_len));
                next = Some(0);
            }
            Some(n) => {
                out.push_str(&format!(
                    "IPADDR_{n}='{}'\nPREFIXLEN_{n}='{}'\nLABEL_{n}='{n}'\n",
                    ip.address,
                    ip.prefix_len,
                    n = n
                ));
                next = Some(n + 1);
            }
        }
    }

    out.push_str("STARTMODE='auto'\nUSERCONTROL='no'\n");
    out
}

/// `ifroute-<if>`, `None` when the interface has neither routes nor a gateway.
pub fn ifroute_file(iface: &InterfaceConfig) -> Option<String> {
    let mut out = String::new();
    for route in &iface.routes {
        out.push_str(&format!(
            "{} {} {} {}\n",
            route.network, route.gateway, route.netmask, iface.name
        ));
    }
    if let Some(gw) = &iface.gateway4 {
        out.push_str(&format!("default {} - -\n", gw));
    }
    if let Some(gw) = &iface.gateway6 {
        out.push_str(&format!("default {} - -\n", gw));
    }

    (!out.is_empty()).then_some(out)
}
