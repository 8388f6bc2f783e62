// Instance Agent - Raw Descriptor
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Raw network descriptor as delivered by the control plane.
//!
//! The control plane has used several slightly different shapes over time
//! (`ip` vs `address`, `route` vs `network`, string vs numeric flags), so
//! every field here is optional and loosely typed. Nothing in this module
//! validates; see [`crate::normalize`] for that.

use serde::{Deserialize, Serialize};

/// A scalar that may arrive as a string, a number or a boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Text(String),
    Number(i64),
    Flag(bool),
}

impl Loose {
    /// Render the value as text, the way the configuration files expect it.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
            Self::Flag(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }

    /// Interpret the value as an `enabled` flag ("0" means disabled).
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Text(s) => s.trim() != "0",
            Self::Number(n) => *n != 0,
            Self::Flag(b) => *b,
        }
    }
}

impl From<&str> for Loose {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Top-level descriptor for one reconciliation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Descriptor {
    /// Desired hostname (falls back to the distribution name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Interface records.
    #[serde(default)]
    pub interfaces: Vec<RawInterface>,
}

impl Descriptor {
    /// Parse a descriptor from JSON text.
    pub fn from_json(json: &str) -> crate::models::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One interface record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawInterface {
    /// Legacy interface selector ("public" / "private").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Hardware address of the target interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// IPv4 addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips: Option<Vec<RawAddress>>,
    /// IPv6 addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip6s: Option<Vec<RawAddress>>,
    /// IPv4 default gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// IPv6 default gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway6: Option<String>,
    /// DNS servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    /// Static routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RawRoute>>,
}

/// One address record (IPv4 or IPv6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Dotted netmask for IPv4, prefix length for IPv6.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<Loose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefixlen: Option<Loose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Loose>,
    /// Per-address gateway (seen on some IPv6 records).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl RawAddress {
    /// Addresses without an `enabled` key are treated as disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.as_ref().map(Loose::is_enabled).unwrap_or(false)
    }
}

/// One static route record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<Loose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Loose>,
}

impl RawRoute {
    /// Routes are kept unless explicitly disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.as_ref().map(Loose::is_enabled).unwrap_or(true)
    }
}
