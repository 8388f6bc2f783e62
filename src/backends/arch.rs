// Instance Agent - Arch Linux Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Arch Linux, in either of its two layouts.
//!
//! Legacy: everything in `/etc/rc.conf`. `INTERFACES=(...)` and
//! `ROUTES=(...)` list the names of other variables holding one
//! (sub-)interface or route each; gateways are global.
//!
//! netcfg: one profile per (sub-)interface under `/etc/network.d`, listed
//! in `NETWORKS=(...)` in `/etc/rc.conf`, brought up by the
//! `net-profiles` daemon instead of `network`.
//!
//! Which layout applies is decided by whether the `netcfg` package is
//! installed, asked again on every request.

use std::path::Path;

use tracing::debug;

use super::{
    guest_path, hostname_op, read_or_empty, resolv_conf, Backend, FailurePolicy, InterfaceOp,
    Rendered, RESOLV_CONF,
};
use crate::models::{InterfaceConfig, NetworkConfig, OsFamily, Result};
use crate::services::{argv, CommandRunner};
use crate::shellvars::ShellConfig;
use crate::storage::ConfigSource;

pub const RC_CONF: &str = "/etc/rc.conf";
pub const PROFILES_DIR: &str = "/etc/network.d";

const NETWORK_DAEMON: &str = "network";
const PROFILES_DAEMON: &str = "@net-profiles";

/// Network configuration layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchMode {
    Legacy,
    Netcfg,
}

impl ArchMode {
    /// netcfg when `pacman -Q netcfg` succeeds.
    pub fn detect(runner: &dyn CommandRunner) -> Result<Self> {
        let output = runner.run(&argv(&["/usr/bin/pacman", "-Q", "netcfg"]))?;
        let mode = if output.success() { Self::Netcfg } else { Self::Legacy };
        debug!("Arch network layout: {:?}", mode);
        Ok(mode)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArchBackend {
    mode: ArchMode,
}

impl ArchBackend {
    pub fn new(mode: ArchMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ArchMode {
        self.mode
    }
}

impl Backend for ArchBackend {
    fn family(&self) -> OsFamily {
        OsFamily::Arch
    }

    fn describe(&self) -> String {
        match self.mode {
            ArchMode::Legacy => "Arch Linux (rc.conf)".to_string(),
            ArchMode::Netcfg => "Arch Linux (netcfg)".to_string(),
        }
    }

    fn render(&self, cfg: &NetworkConfig, existing: &dyn ConfigSource) -> Result<Rendered> {
        let mut rendered = Rendered::default();
        let mut rc_conf = ShellConfig::parse(&read_or_empty(existing, RC_CONF)?);

        rendered.op(hostname_op(&cfg.hostname));

        match self.mode {
            ArchMode::Legacy => {
                update_rc_conf_legacy(&mut rc_conf, cfg);
                if let Some(resolv) = resolv_conf(cfg) {
                    rendered.write(RESOLV_CONF, resolv);
                }
                rendered.op(
                    InterfaceOp::up("network", &["/etc/rc.d/network", "restart"], FailurePolicy::Abort)
                        .with_action("restart network"),
                );
            }
            ArchMode::Netcfg => {
                for entry in existing.list_dir(Path::new(PROFILES_DIR))? {
                    if !entry.name.ends_with('~') && !entry.is_dir {
                        rendered.retire(guest_path(PROFILES_DIR, &entry.name));
                    }
                }

                let mut profiles = Vec::new();
                for iface in &cfg.interfaces {
                    for (name, content) in netcfg_profiles(iface) {
                        rendered.write(guest_path(PROFILES_DIR, &name), content);
                        profiles.push(name);
                    }
                }

                update_rc_conf_netcfg(&mut rc_conf, &profiles);
                for name in &profiles {
                    rendered.op(
                        InterfaceOp::up(name, &["/usr/bin/netcfg", "-r", name], FailurePolicy::Collect)
                            .with_retries(1),
                    );
                }
            }
        }

        rc_conf.update_scalar_variable("HOSTNAME", &format!("\"{}\"", cfg.hostname));
        rendered.write(RC_CONF, rc_conf.serialize());

        Ok(rendered)
    }
}

/// Rewrite `INTERFACES`, `ROUTES`, `NETWORKS` and `DAEMONS` for the legacy layout.
pub fn update_rc_conf_legacy(rc_conf: &mut ShellConfig, cfg: &NetworkConfig) {
    let mut interfaces = Vec::new();
    let mut routes = Vec::new();

    for iface in &cfg.interfaces {
        for slot in iface.slots() {
            let name = iface.alias_name(slot.index);
            let mut line = name.clone();
            if let Some(ip) = slot.ipv4 {
                line.push_str(&format!(" {} netmask {}", ip.address, ip.netmask));
            }
            if let Some(ip) = slot.ipv6 {
                line.push_str(&format!(" add {}/{}", ip.address, ip.prefix_len));
            }
            interfaces.push((name.replace(':', "_"), line));
        }

        for (i, route) in iface.routes.iter().enumerate() {
            routes.push((
                format!("{}_route{}", iface.name, i),
                format!("-net {} netmask {} gw {}", route.network, route.netmask, route.gateway),
            ));
        }
    }

    if let Some(gw) = cfg.gateway4() {
        routes.push(("gateway".to_string(), format!("default gw {}", gw)));
    }
    if let Some(gw) = cfg.gateway6() {
        routes.push(("gateway6".to_string(), format!("default gw {}", gw)));
    }

    rc_conf.replace_array_variable("INTERFACES", &interfaces);
    rc_conf.replace_array_variable("ROUTES", &routes);
    rc_conf.comment_out_variable("NETWORKS");

    if let Some(mut daemons) = rc_conf.array_values("DAEMONS") {
        if let Some(pos) = daemons.iter().position(|d| d == "!network") {
            daemons[pos] = NETWORK_DAEMON.to_string();
            daemons.retain(|d| d != PROFILES_DAEMON);
            rc_conf.set_array_variable("DAEMONS", &daemons);
        }
    }
}

/// Point `NETWORKS` at the profiles and hand networking to `net-profiles`.
pub fn update_rc_conf_netcfg(rc_conf: &mut ShellConfig, profiles: &[String]) {
    let networks = format!("({})", profiles.join(" "));
    rc_conf.update_scalar_variable("NETWORKS", &networks);

    rc_conf.comment_out_variable("INTERFACES");
    rc_conf.comment_out_variable("ROUTES");

    if let Some(mut daemons) = rc_conf.array_values("DAEMONS") {
        if let Some(pos) = daemons.iter().position(|d| d == NETWORK_DAEMON) {
            daemons[pos] = format!("!{}", NETWORK_DAEMON);
            if !daemons.iter().any(|d| d == PROFILES_DAEMON) {
                daemons.insert(pos + 1, PROFILES_DAEMON.to_string());
            }
            rc_conf.set_array_variable("DAEMONS", &daemons);
        }
    }
}

/// netcfg profiles for one interface as `(file name, content)`.
///
/// Routes and DNS go into the primary profile only.
pub fn netcfg_profiles(iface: &InterfaceConfig) -> Vec<(String, String)> {
    let mut gateway4 = iface.gateway4.as_deref();
    let mut gateway6 = iface.gateway6.as_deref();

    iface
        .slots()
        .map(|slot| {
            let name = iface.alias_name(slot.index);
            let mut out = format!("CONNECTION=\"ethernet\"\nINTERFACE={}\n", name);

            if let Some(ip) = slot.ipv4 {
                out.push_str(&format!("IP=\"static\"\nADDR=\"{}\"\nNETMASK=\"{}\"\n", ip.address, ip.netmask));
                if let Some(gw) = gateway4.take() {
                    out.push_str(&format!("GATEWAY=\"{}\"\n", gw));
                }
            }

            if let Some(ip) = slot.ipv6 {
                out.push_str(&format!("IP6=\"static\"\nADDR6=\"{}/{}\"\n", ip.address, ip.prefix_len));
                if let Some(gw) = gateway6.take() {
                    out.push_str(&format!("GATEWAY6=\"{}\"\n", gw));
                }
            }

            if slot.index == 0 {
                if !iface.routes.is_empty() {
                    let routes: Vec<String> = iface
                        .routes
                        .iter()
                        .map(|r| format!("\"{}/{} via {}\"", r.network, r.prefix_len, r.gateway))
                        .collect();
                    out.push_str(&format!("ROUTES=({})\n", routes.join(" ")));
                }
                if !iface.dns.is_empty() {
                    out.push_str(&format!("DNS=({})\n", iface.dns.join(" ")));
                }
            }

            (name.replace(':', "_"), out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::Phase;
    use super::*;

    const LEGACY_RC_CONF: &str = "\
# /etc/rc.conf - Main Configuration for Arch Linux
LOCALE=\"en_US.UTF-8\"
HOSTNAME=\"oldhost\"

eth0=\"dhcp\"
INTERFACES=(eth0)
gateway=\"default gw 192.168.0.1\"
ROUTES=(!gateway)
NETWORKS=(main)
main=\"ignored\"

DAEMONS=(syslog-ng !network @net-profiles netfs crond)
";

    #[test]
    fn test_legacy_rc_conf() {
        let cfg = with_ipv6(two_interfaces("eth0", "eth1"), &[("ffff::2", 96)]);
        let mut rc_conf = ShellConfig::parse(LEGACY_RC_CONF);
        update_rc_conf_legacy(&mut rc_conf, &cfg);
        rc_conf.update_scalar_variable("HOSTNAME", "\"myhostname\"");

        let expected = "\
# /etc/rc.conf - Main Configuration for Arch Linux
LOCALE=\"en_US.UTF-8\"
HOSTNAME=\"myhostname\"

eth0=\"eth0 10.127.31.38 netmask 255.255.255.0 add ffff::2/96\"
eth1=\"eth1 192.168.2.30 netmask 255.255.224.0\"
INTERFACES=(eth0 eth1)
eth1_route0=\"-net 10.176.0.0 netmask 255.248.0.0 gw 10.177.96.1\"
eth1_route1=\"-net 10.191.192.0 netmask 255.255.192.0 gw 10.177.96.1\"
gateway=\"default gw 10.127.31.1\"
gateway6=\"default gw ffff::1\"
ROUTES=(eth1_route0 eth1_route1 gateway gateway6)
#NETWORKS=(main)
#main=\"ignored\"

DAEMONS=(syslog-ng network netfs crond)
";
        assert_eq!(rc_conf.serialize(), expected);

        // A second pass over its own output changes nothing
        let mut again = ShellConfig::parse(expected);
        update_rc_conf_legacy(&mut again, &cfg);
        again.update_scalar_variable("HOSTNAME", "\"myhostname\"");
        assert_eq!(again.serialize(), expected);
    }

    #[test]
    fn test_netcfg_rc_conf() {
        let mut rc_conf = ShellConfig::parse(LEGACY_RC_CONF);
        update_rc_conf_netcfg(&mut rc_conf, &["eth0".into(), "eth0_1".into()]);

        let expected = "\
# /etc/rc.conf - Main Configuration for Arch Linux
LOCALE=\"en_US.UTF-8\"
HOSTNAME=\"oldhost\"

#eth0=\"dhcp\"
#INTERFACES=(eth0)
#gateway=\"default gw 192.168.0.1\"
#ROUTES=(!gateway)
NETWORKS=(eth0 eth0_1)
main=\"ignored\"

DAEMONS=(syslog-ng !network @net-profiles netfs crond)
";
        assert_eq!(rc_conf.serialize(), expected);
    }

    #[test]
    fn test_netcfg_daemons_toggle() {
        let mut rc_conf = ShellConfig::parse("DAEMONS=(syslog-ng network crond)\n");
        update_rc_conf_netcfg(&mut rc_conf, &["eth0".into()]);
        assert_eq!(
            rc_conf.serialize(),
            "DAEMONS=(syslog-ng !network @net-profiles crond)\nNETWORKS=(eth0)\n"
        );
    }

    #[test]
    fn test_netcfg_profiles() {
        let mut cfg = with_ipv6(two_interfaces("eth0", "eth1"), &[("ffff::2", 96)]);
        cfg.interfaces[0].ipv4.push(ipv4("10.127.32.38", "255.255.255.0"));

        let profiles = netcfg_profiles(&cfg.interfaces[0]);
        assert_eq!(profiles.len(), 2);
        assert_eq!(
            profiles[0],
            (
                "eth0".to_string(),
                "\
CONNECTION=\"ethernet\"
INTERFACE=eth0
IP=\"static\"
ADDR=\"10.127.31.38\"
NETMASK=\"255.255.255.0\"
GATEWAY=\"10.127.31.1\"
IP6=\"static\"
ADDR6=\"ffff::2/96\"
GATEWAY6=\"ffff::1\"
DNS=(10.6.24.4 10.6.24.5)
"
                .to_string()
            )
        );
        assert_eq!(profiles[1].0, "eth0_1");
        assert!(profiles[1].1.starts_with("CONNECTION=\"ethernet\"\nINTERFACE=eth0:1\n"));
        assert!(!profiles[1].1.contains("DNS"));

        let private = netcfg_profiles(&cfg.interfaces[1]);
        assert!(private[0]
            .1
            .contains("ROUTES=(\"10.176.0.0/13 via 10.177.96.1\" \"10.191.192.0/18 via 10.177.96.1\")\n"));
    }

    #[test]
    fn test_netcfg_render() {
        let source = MemorySource::new()
            .with_file("/etc/rc.conf", "DAEMONS=(network)\n")
            .with_file("/etc/network.d/eth0", "old\n")
            .with_file("/etc/network.d/stale", "old\n")
            .with_file("/etc/network.d/eth0.1300000000~", "backup\n")
            .with_dir("/etc/network.d/examples");

        let backend = ArchBackend::new(ArchMode::Netcfg);
        let rendered = backend.render(&two_interfaces("eth0", "eth1"), &source).unwrap();

        let removed: Vec<String> = rendered.remove.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(removed, vec!["/etc/network.d/stale"]);
        assert!(!rendered.files.contains_key(Path::new(RESOLV_CONF)));
        assert_eq!(
            rendered.files[Path::new(RC_CONF)],
            "DAEMONS=(!network @net-profiles)\nNETWORKS=(eth0 eth1)\nHOSTNAME=\"myhostname\"\n"
        );

        let up: Vec<(String, u8)> = rendered
            .ops_in(Phase::Up)
            .map(|o| (o.command_line(), o.retries))
            .collect();
        assert_eq!(
            up,
            vec![
                ("/bin/hostname myhostname".to_string(), 0),
                ("/usr/bin/netcfg -r eth0".to_string(), 1),
                ("/usr/bin/netcfg -r eth1".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_legacy_render_writes_resolv_conf() {
        let backend = ArchBackend::new(ArchMode::Legacy);
        let rendered = backend
            .render(&two_interfaces("eth0", "eth1"), &MemorySource::new())
            .unwrap();
        assert!(rendered.files.contains_key(Path::new(RESOLV_CONF)));
        assert_eq!(
            rendered.ops.last().unwrap().command_line(),
            "/etc/rc.d/network restart"
        );
    }
}
