// Instance Agent - OS Backends
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Per-OS-family renderers.
//!
//! A [`Backend`] turns a [`NetworkConfig`] plus the current on-disk state
//! into a [`Rendered`] change set: full file contents to write, files to
//! retire, and the ordered commands that take the change live. Backends
//! never touch the filesystem or run commands themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::models::{NetworkConfig, OsFamily, Result, GENERATED_HEADER};
use crate::services::{argv, CommandRunner};
use crate::storage::ConfigSource;

pub mod arch;
pub mod debian;
pub mod freebsd;
pub mod gentoo;
pub mod redhat;
pub mod suse;

pub use arch::{ArchBackend, ArchMode};
pub use debian::DebianBackend;
pub use freebsd::FreeBsdBackend;
pub use gentoo::{GentooBackend, GentooMode};
pub use redhat::RedHatBackend;
pub use suse::SuseBackend;

/// Resolver configuration shared by several families.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// When an interface operation runs relative to the file commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Down,
    Up,
}

/// What a failing operation does to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log and carry on.
    Ignore,
    /// Carry on, but report the failure at the end.
    Collect,
    /// Stop immediately.
    Abort,
}

/// One external command of the restart sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceOp {
    pub phase: Phase,
    /// Interface, profile or service the command acts on.
    pub target: String,
    pub argv: Vec<String>,
    pub policy: FailurePolicy,
    /// Extra attempts after a failure.
    pub retries: u8,
    /// Completes "Couldn't ..." in failure messages.
    pub action: String,
}

impl InterfaceOp {
    fn new(phase: Phase, target: &str, parts: &[&str], policy: FailurePolicy) -> Self {
        Self {
            phase,
            target: target.to_string(),
            argv: argv(parts),
            policy,
            retries: 0,
            action: format!("restart {}", target),
        }
    }

    /// A down-phase command; failures are ignored.
    pub fn down(target: &str, parts: &[&str]) -> Self {
        Self::new(Phase::Down, target, parts, FailurePolicy::Ignore)
    }

    /// An up-phase command with the given failure policy.
    pub fn up(target: &str, parts: &[&str], policy: FailurePolicy) -> Self {
        Self::new(Phase::Up, target, parts, policy)
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Command line for logs and messages.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Everything a backend wants changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rendered {
    /// Guest path → full desired content.
    pub files: BTreeMap<PathBuf, String>,
    /// Guest paths to rename aside.
    pub remove: BTreeSet<PathBuf>,
    /// Commands, down phase first.
    pub ops: Vec<InterfaceOp>,
    /// `(link, target)` pairs created after commit when missing.
    pub symlinks: Vec<(PathBuf, PathBuf)>,
}

impl Rendered {
    /// Set the desired content of a file.
    pub fn write(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        self.remove.remove(&path);
        self.files.insert(path, content.into());
    }

    /// Retire a file unless it is also being written.
    pub fn retire(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.files.contains_key(&path) {
            self.remove.insert(path);
        }
    }

    /// Append a command.
    pub fn op(&mut self, op: InterfaceOp) {
        self.ops.push(op);
    }

    pub fn ops_in(&self, phase: Phase) -> impl Iterator<Item = &InterfaceOp> {
        self.ops.iter().filter(move |op| op.phase == phase)
    }
}

/// OS-family-specific renderer and restart strategy.
pub trait Backend {
    /// Family this backend serves.
    fn family(&self) -> OsFamily;

    /// Short description including the layout variant, for logs.
    fn describe(&self) -> String {
        self.family().display_name().to_string()
    }

    /// Compute the change set for `cfg` against the current files.
    fn render(&self, cfg: &NetworkConfig, existing: &dyn ConfigSource) -> Result<Rendered>;
}

/// Pick the backend for `family`, probing the layout variant where the
/// family has two.
pub fn select_backend(
    family: OsFamily,
    existing: &dyn ConfigSource,
    runner: &dyn CommandRunner,
) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match family {
        OsFamily::Debian => Box::new(DebianBackend),
        OsFamily::RedHat => Box::new(RedHatBackend),
        OsFamily::Arch => Box::new(ArchBackend::new(ArchMode::detect(runner)?)),
        OsFamily::Suse => Box::new(SuseBackend),
        OsFamily::Gentoo => Box::new(GentooBackend::new(GentooMode::detect(existing))),
        OsFamily::FreeBsd => Box::new(FreeBsdBackend),
    };
    debug!("Selected {} backend", backend.describe());
    Ok(backend)
}

/// `/etc/resolv.conf` listing every interface's DNS servers, or `None`
/// when there are none.
pub fn resolv_conf(cfg: &NetworkConfig) -> Option<String> {
    let servers = cfg.nameservers();
    if servers.is_empty() {
        return None;
    }

    let mut out = format!("{}\n", GENERATED_HEADER);
    for server in servers {
        out.push_str(&format!("nameserver {}\n", server));
    }
    Some(out)
}

/// Set the running hostname.
pub fn hostname_op(hostname: &str) -> InterfaceOp {
    InterfaceOp::up(hostname, &["/bin/hostname", hostname], FailurePolicy::Abort)
        .with_action("set hostname")
}

/// Read a file, treating a missing one as empty.
pub(crate) fn read_or_empty(existing: &dyn ConfigSource, path: &str) -> Result<String> {
    Ok(existing.read(Path::new(path))?.unwrap_or_default())
}

/// Join a directory and a file name into a guest path.
pub(crate) fn guest_path(dir: &str, name: &str) -> PathBuf {
    Path::new(dir).join(name)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the backend tests.

    use std::collections::{BTreeMap, BTreeSet};
    use std::path::Path;

    use crate::models::{InterfaceConfig, Ipv4Address, Ipv6Address, NetworkConfig, Result, Route};
    use crate::storage::{ConfigSource, DirEntryInfo};

    /// In-memory configuration tree.
    #[derive(Debug, Default)]
    pub struct MemorySource {
        pub files: BTreeMap<String, String>,
        pub dirs: BTreeSet<String>,
        pub symlinks: BTreeSet<String>,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(mut self, path: &str, content: &str) -> Self {
            self.files.insert(path.to_string(), content.to_string());
            self
        }

        pub fn with_dir(mut self, path: &str) -> Self {
            self.dirs.insert(path.to_string());
            self
        }

        pub fn with_symlink(mut self, path: &str) -> Self {
            self.symlinks.insert(path.to_string());
            self
        }
    }

    impl ConfigSource for MemorySource {
        fn read(&self, path: &Path) -> Result<Option<String>> {
            Ok(self.files.get(path.to_string_lossy().as_ref()).cloned())
        }

        fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
            let prefix = format!("{}/", path.to_string_lossy());
            let files = self.files.keys().map(|p| (p, false));
            let dirs = self.dirs.iter().map(|p| (p, true));
            let mut listing: Vec<DirEntryInfo> = files
                .chain(dirs)
                .filter_map(|(p, is_dir)| {
                    p.strip_prefix(&prefix)
                        .filter(|rest| !rest.contains('/'))
                        .map(|name| DirEntryInfo {
                            name: name.to_string(),
                            is_dir,
                        })
                })
                .collect();
            listing.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(listing)
        }

        fn exists(&self, path: &Path) -> bool {
            let path = path.to_string_lossy();
            self.files.contains_key(path.as_ref())
                || self.dirs.contains(path.as_ref())
                || self.symlinks.contains(path.as_ref())
        }

        fn is_symlink(&self, path: &Path) -> bool {
            self.symlinks.contains(path.to_string_lossy().as_ref())
        }
    }

    pub fn ipv4(address: &str, netmask: &str) -> Ipv4Address {
        Ipv4Address {
            address: address.into(),
            netmask: netmask.into(),
            prefix_len: crate::models::validation::netmask_to_prefix_len(netmask).unwrap(),
        }
    }

    pub fn ipv6(address: &str, prefix_len: u8) -> Ipv6Address {
        Ipv6Address {
            address: address.into(),
            prefix_len,
            gateway: None,
        }
    }

    pub fn route(network: &str, netmask: &str, gateway: &str) -> Route {
        Route {
            network: network.into(),
            netmask: netmask.into(),
            prefix_len: crate::models::validation::netmask_to_prefix_len(netmask).unwrap(),
            gateway: gateway.into(),
        }
    }

    /// Public/private interface pair shared by the backend fixtures.
    pub fn two_interfaces(name0: &str, name1: &str) -> NetworkConfig {
        NetworkConfig {
            hostname: "myhostname".into(),
            interfaces: vec![
                InterfaceConfig {
                    name: name0.into(),
                    label: Some("public".into()),
                    mac: "40:40:8f:1e:a0:0a".into(),
                    ipv4: vec![ipv4("10.127.31.38", "255.255.255.0")],
                    ipv6: Vec::new(),
                    gateway4: Some("10.127.31.1".into()),
                    gateway6: None,
                    dns: vec!["10.6.24.4".into(), "10.6.24.5".into()],
                    routes: Vec::new(),
                    is_up: true,
                },
                InterfaceConfig {
                    name: name1.into(),
                    label: Some("private".into()),
                    mac: "40:40:a2:87:6e:26".into(),
                    ipv4: vec![ipv4("192.168.2.30", "255.255.224.0")],
                    ipv6: Vec::new(),
                    gateway4: None,
                    gateway6: None,
                    dns: Vec::new(),
                    routes: vec![
                        route("10.176.0.0", "255.248.0.0", "10.177.96.1"),
                        route("10.191.192.0", "255.255.192.0", "10.177.96.1"),
                    ],
                    is_up: true,
                },
            ],
        }
    }

    /// Add IPv6 (and optional aliases) to the public interface.
    pub fn with_ipv6(mut cfg: NetworkConfig, addresses: &[(&str, u8)]) -> NetworkConfig {
        let public = &mut cfg.interfaces[0];
        public.ipv6 = addresses.iter().map(|(a, p)| ipv6(a, *p)).collect();
        public.gateway6 = Some("ffff::1".into());
        cfg
    }
}
