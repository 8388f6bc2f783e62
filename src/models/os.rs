// Instance Agent - Operating System Families
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Supported operating system families and the distribution name table.

use serde::{Deserialize, Serialize};

/// Operating system family; one backend per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Debian and Ubuntu (ifupdown).
    Debian,
    /// Red Hat, CentOS, Fedora, Oracle (network-scripts).
    RedHat,
    /// Arch Linux (rc.conf or netcfg).
    Arch,
    /// openSUSE and SLES (sysconfig).
    Suse,
    /// Gentoo (conf.d/net, legacy or OpenRC).
    Gentoo,
    /// FreeBSD (rc.conf).
    FreeBsd,
}

impl OsFamily {
    /// All supported families.
    pub const ALL: [OsFamily; 6] = [
        Self::Debian,
        Self::RedHat,
        Self::Arch,
        Self::Suse,
        Self::Gentoo,
        Self::FreeBsd,
    ];

    /// Map a distribution identifier (os-release `ID`, uname) to a family.
    pub fn from_distribution(name: &str) -> Option<Self> {
        let name = name.trim().trim_matches('"').to_lowercase();
        match name.as_str() {
            "debian" | "ubuntu" => Some(Self::Debian),
            "redhat" | "rhel" | "centos" | "fedora" | "oracle" | "ol" => Some(Self::RedHat),
            "arch" | "archlinux" => Some(Self::Arch),
            "suse" | "sles" | "sled" => Some(Self::Suse),
            n if n.starts_with("opensuse") => Some(Self::Suse),
            "gentoo" => Some(Self::Gentoo),
            "freebsd" => Some(Self::FreeBsd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debian => "debian",
            Self::RedHat => "redhat",
            Self::Arch => "arch",
            Self::Suse => "suse",
            Self::Gentoo => "gentoo",
            Self::FreeBsd => "freebsd",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Debian => "Debian/Ubuntu",
            Self::RedHat => "Red Hat/CentOS",
            Self::Arch => "Arch Linux",
            Self::Suse => "SUSE",
            Self::Gentoo => "Gentoo",
            Self::FreeBsd => "FreeBSD",
        }
    }

    /// Interface name for a control-plane label on this family.
    pub fn label_interface(&self, label: &str) -> Option<&'static str> {
        match (self, label) {
            (Self::FreeBsd, "public") => Some("xn0"),
            (Self::FreeBsd, "private") => Some("xn1"),
            (_, "public") => Some("eth0"),
            (_, "private") => Some("eth1"),
            _ => None,
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OsFamily {
    type Err = crate::models::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_distribution(s).ok_or_else(|| crate::models::Error::UnsupportedOs(s.to_string()))
    }
}
