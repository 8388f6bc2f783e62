// Instance Agent - Network Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Live interface detection and operating system detection.
//!
//! On Linux interfaces are read from sysfs (`/sys/class/net`); on FreeBSD
//! the output of `ifconfig -a` is parsed. Both sit behind
//! [`InterfaceProbe`] so reconciliation can be tested with a fixed list.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::{OsFamily, Result};
use crate::services::{argv, CommandRunner};

/// `IFF_UP` bit of the sysfs `flags` file.
const IFF_UP: u32 = 0x1;

/// One interface present on the running system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInterface {
    pub name: String,
    /// Lowercase hardware address.
    pub mac: String,
    pub is_up: bool,
}

impl LiveInterface {
    pub fn new(name: impl Into<String>, mac: impl Into<String>, is_up: bool) -> Self {
        Self {
            name: name.into(),
            mac: mac.into().to_lowercase(),
            is_up,
        }
    }
}

/// Source of the live interface list.
pub trait InterfaceProbe {
    /// Non-loopback interfaces with a hardware address, sorted by name.
    fn list_interfaces(&self) -> Result<Vec<LiveInterface>>;
}

/// Reads interfaces from Linux sysfs.
#[derive(Debug, Clone)]
pub struct SysfsProbe {
    base: PathBuf,
}

impl Default for SysfsProbe {
    fn default() -> Self {
        Self::new("/sys/class/net")
    }
}

impl SysfsProbe {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn is_up(path: &Path) -> bool {
        if let Ok(flags) = fs::read_to_string(path.join("flags")) {
            let flags = flags.trim().trim_start_matches("0x");
            if let Ok(flags) = u32::from_str_radix(flags, 16) {
                return flags & IFF_UP != 0;
            }
        }

        fs::read_to_string(path.join("operstate"))
            .map(|state| state.trim() == "up")
            .unwrap_or(false)
    }
}

impl InterfaceProbe for SysfsProbe {
    fn list_interfaces(&self) -> Result<Vec<LiveInterface>> {
        let mut interfaces = Vec::new();

        for entry in fs::read_dir(&self.base)?.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();

            // Skip loopback
            if name == "lo" {
                continue;
            }

            let path = entry.path();
            let mac = match fs::read_to_string(path.join("address")) {
                Ok(mac) => mac.trim().to_lowercase(),
                Err(_) => continue,
            };
            if mac.is_empty() || mac == "00:00:00:00:00:00" {
                continue;
            }

            let is_up = Self::is_up(&path);
            debug!(interface = %name, mac = %mac, is_up, "Found interface");
            interfaces.push(LiveInterface::new(name, mac, is_up));
        }

        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }
}

/// Parses `ifconfig -a` (FreeBSD).
pub struct IfconfigProbe<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> IfconfigProbe<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl InterfaceProbe for IfconfigProbe<'_> {
    fn list_interfaces(&self) -> Result<Vec<LiveInterface>> {
        let output = self.runner.run(&argv(&["/sbin/ifconfig", "-a"]))?;
        let mut interfaces = parse_ifconfig(&output.stdout);
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }
}

/// Parse BSD `ifconfig -a` output into interfaces with an `ether` address.
pub fn parse_ifconfig(output: &str) -> Vec<LiveInterface> {
    let mut interfaces = Vec::new();
    let mut current: Option<(String, bool, bool)> = None;

    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            if let Some((name, rest)) = line.split_once(':') {
                let flags = rest
                    .split_once('<')
                    .and_then(|(_, f)| f.split_once('>'))
                    .map(|(f, _)| f)
                    .unwrap_or("");
                let is_up = flags.split(',').any(|f| f == "UP");
                let loopback = flags.split(',').any(|f| f == "LOOPBACK");
                current = Some((name.to_string(), is_up, loopback));
            }
            continue;
        }

        let mut fields = line.split_whitespace();
        if fields.next() == Some("ether") {
            if let (Some((name, is_up, false)), Some(mac)) = (&current, fields.next()) {
                interfaces.push(LiveInterface::new(name.clone(), mac, *is_up));
            }
        }
    }

    interfaces
}

/// Release marker files, checked when `/etc/os-release` doesn't settle it.
const RELEASE_MARKERS: [(&str, &str); 5] = [
    ("etc/arch-release", "arch"),
    ("etc/gentoo-release", "gentoo"),
    ("etc/SuSE-release", "suse"),
    ("etc/redhat-release", "redhat"),
    ("etc/debian_version", "debian"),
];

/// Detected operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedOs {
    pub family: OsFamily,
    /// Distribution name; doubles as the default hostname.
    pub name: String,
}

/// Detect the operating system family of the tree under `root`.
pub fn detect_os(root: &Path) -> Option<DetectedOs> {
    if cfg!(target_os = "freebsd") {
        return Some(DetectedOs {
            family: OsFamily::FreeBsd,
            name: "freebsd".to_string(),
        });
    }

    if let Ok(content) = fs::read_to_string(root.join("etc/os-release")) {
        if let Some(detected) = parse_os_release(&content) {
            return Some(detected);
        }
    }

    RELEASE_MARKERS
        .iter()
        .find(|(marker, _)| root.join(marker).exists())
        .and_then(|(_, name)| {
            OsFamily::from_distribution(name).map(|family| DetectedOs {
                family,
                name: name.to_string(),
            })
        })
}

/// Resolve `/etc/os-release` content: `ID` first, then each `ID_LIKE` entry.
pub fn parse_os_release(content: &str) -> Option<DetectedOs> {
    let value = |key: &str| {
        content.lines().find_map(|line| {
            line.trim()
                .strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.trim().trim_matches('"').trim_matches('\'').to_lowercase())
        })
    };

    let id = value("ID")?;
    if let Some(family) = OsFamily::from_distribution(&id) {
        return Some(DetectedOs { family, name: id });
    }

    let like = value("ID_LIKE").unwrap_or_default();
    like.split_whitespace()
        .find_map(OsFamily::from_distribution)
        .map(|family| DetectedOs { family, name: id })
}
