// Instance Agent - Gentoo Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Gentoo (`/etc/conf.d/net`).
//!
//! Both init systems read the same file; legacy baselayout wants bash
//! arrays, OpenRC wants newline-separated strings. Each interface gets its
//! own `net.<if>` init script, a symlink to `net.lo`.

use std::path::{Path, PathBuf};

use super::{
    guest_path, hostname_op, resolv_conf, Backend, FailurePolicy, InterfaceOp, Rendered,
    RESOLV_CONF,
};
use crate::models::{InterfaceConfig, NetworkConfig, OsFamily, Result, GENERATED_HEADER};
use crate::storage::ConfigSource;

pub const NET_FILE: &str = "/etc/conf.d/net";
pub const HOSTNAME_FILE: &str = "/etc/conf.d/hostname";
pub const INIT_DIR: &str = "/etc/init.d";

/// Present as a symlink only on OpenRC systems.
const OPENRC_MARKER: &str = "/sbin/runscript";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GentooMode {
    Legacy,
    OpenRc,
}

impl GentooMode {
    pub fn detect(existing: &dyn ConfigSource) -> Self {
        if existing.is_symlink(Path::new(OPENRC_MARKER)) {
            Self::OpenRc
        } else {
            Self::Legacy
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GentooBackend {
    mode: GentooMode,
}

impl GentooBackend {
    pub fn new(mode: GentooMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> GentooMode {
        self.mode
    }
}

impl Backend for GentooBackend {
    fn family(&self) -> OsFamily {
        OsFamily::Gentoo
    }

    fn describe(&self) -> String {
        match self.mode {
            GentooMode::Legacy => "Gentoo (legacy)".to_string(),
            GentooMode::OpenRc => "Gentoo (OpenRC)".to_string(),
        }
    }

    fn render(&self, cfg: &NetworkConfig, _existing: &dyn ConfigSource) -> Result<Rendered> {
        let mut rendered = Rendered::default();

        rendered.write(NET_FILE, net_file(cfg, self.mode));
        if let Some(resolv) = resolv_conf(cfg) {
            rendered.write(RESOLV_CONF, resolv);
        }
        rendered.write(
            HOSTNAME_FILE,
            format!("{}\nHOSTNAME=\"{}\"\n", GENERATED_HEADER, cfg.hostname),
        );

        rendered.op(hostname_op(&cfg.hostname));
        for iface in &cfg.interfaces {
            let script = guest_path(INIT_DIR, &format!("net.{}", iface.name));
            rendered.symlinks.push((script.clone(), PathBuf::from("net.lo")));

            let script = script.to_string_lossy().into_owned();
            rendered.op(
                InterfaceOp::up(&iface.name, &[&script, "restart"], FailurePolicy::Abort)
                    .with_action(format!("restart network {}", iface.name)),
            );
        }

        Ok(rendered)
    }
}

fn address_lines(iface: &InterfaceConfig) -> Vec<String> {
    let v4 = iface
        .ipv4
        .iter()
        .map(|ip| format!("{} netmask {}", ip.address, ip.netmask));
    let v6 = iface
        .ipv6
        .iter()
        .map(|ip| format!("{}/{}", ip.address, ip.prefix_len));
    v4.chain(v6).collect()
}

fn route_lines(iface: &InterfaceConfig) -> Vec<String> {
    let mut lines: Vec<String> = iface
        .routes
        .iter()
        .map(|r| format!("{} netmask {} via {}", r.network, r.netmask, r.gateway))
        .collect();
    lines.extend(iface.gateway4.iter().map(|gw| format!("default via {}", gw)));
    lines.extend(iface.gateway6.iter().map(|gw| format!("default via {}", gw)));
    lines
}

/// Render `/etc/conf.d/net` in the syntax `mode` expects.
pub fn net_file(cfg: &NetworkConfig, mode: GentooMode) -> String {
    let mut out = format!("{}\n", GENERATED_HEADER);
    out.push_str(match mode {
        GentooMode::Legacy => "modules=( \"ifconfig\" )\n\n",
        GentooMode::OpenRc => "modules=\"ifconfig\"\n\n",
    });

    for iface in &cfg.interfaces {
        let addresses = address_lines(iface);
        let routes = route_lines(iface);

        match mode {
            GentooMode::Legacy => {
                write_array(&mut out, &format!("config_{}", iface.name), &addresses);
                if !routes.is_empty() {
                    write_array(&mut out, &format!("routes_{}", iface.name), &routes);
                }
            }
            GentooMode::OpenRc => {
                out.push_str(&format!("config_{}=\"{}\"\n", iface.name, addresses.join("\n")));
                if !routes.is_empty() {
                    out.push_str(&format!("routes_{}=\"{}\"\n", iface.name, routes.join("\n")));
                }
            }
        }
    }

    out
}

fn write_array(out: &mut String, name: &str, items: &[String]) {
    out.push_str(&format!("{}=(\n", name));
    for item in items {
        out.push_str(&format!("    \"{}\"\n", item));
    }
    out.push_str(")\n");
}
