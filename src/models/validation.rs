// Instance Agent - Validation Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Input validation utilities for descriptor fields.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::error::{Error, Result};

/// Dotted-quad netmasks indexed by prefix length.
const NETMASKS: [&str; 33] = [
    "0.0.0.0",
    "128.0.0.0",
    "192.0.0.0",
    "224.0.0.0",
    "240.0.0.0",
    "248.0.0.0",
    "252.0.0.0",
    "254.0.0.0",
    "255.0.0.0",
    "255.128.0.0",
    "255.192.0.0",
    "255.224.0.0",
    "255.240.0.0",
    "255.248.0.0",
    "255.252.0.0",
    "255.254.0.0",
    "255.255.0.0",
    "255.255.128.0",
    "255.255.192.0",
    "255.255.224.0",
    "255.255.240.0",
    "255.255.248.0",
    "255.255.252.0",
    "255.255.254.0",
    "255.255.255.0",
    "255.255.255.128",
    "255.255.255.192",
    "255.255.255.224",
    "255.255.255.240",
    "255.255.255.248",
    "255.255.255.252",
    "255.255.255.254",
    "255.255.255.255",
];

/// Validate an IPv4 address string.
pub fn validate_ipv4(s: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(s).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Validate an IPv6 address string.
pub fn validate_ipv6(s: &str) -> Result<Ipv6Addr> {
    Ipv6Addr::from_str(s).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Validate an IP address string (v4 or v6).
pub fn validate_ip(s: &str) -> Result<IpAddr> {
    IpAddr::from_str(s).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Convert a dotted-quad netmask to its prefix length.
///
/// Only the 33 contiguous masks are accepted.
pub fn netmask_to_prefix_len(netmask: &str) -> Result<u8> {
    NETMASKS
        .iter()
        .position(|m| *m == netmask)
        .map(|p| p as u8)
        .ok_or_else(|| Error::InvalidNetmask(netmask.to_string()))
}

/// Validate an IPv6 prefix length given as text (e.g. "64").
pub fn validate_ipv6_prefix(s: &str) -> Result<u8> {
    let prefix: u8 = s
        .trim()
        .parse()
        .map_err(|_| Error::InvalidNetmask(format!("Invalid IPv6 prefix: {}", s)))?;
    if prefix > 128 {
        return Err(Error::InvalidNetmask(format!(
            "Prefix {} exceeds maximum 128 for IPv6",
            prefix
        )));
    }
    Ok(prefix)
}

/// Validate a MAC address string and return it lowercased with colons.
pub fn validate_mac_address(s: &str) -> Result<String> {
    // Accept formats: AA:BB:CC:DD:EE:FF or AA-BB-CC-DD-EE-FF
    let normalized = s.trim().replace('-', ":").to_lowercase();
    let parts: Vec<&str> = normalized.split(':').collect();

    if parts.len() != 6 {
        return Err(Error::InvalidMacAddress(s.to_string()));
    }

    for part in &parts {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMacAddress(s.to_string()));
        }
    }

    Ok(normalized)
}

/// Validate a hostname.
pub fn validate_hostname(s: &str) -> Result<String> {
    if s.is_empty() || s.len() > 253 {
        return Err(Error::InvalidHostname(format!(
            "Hostname must be 1-253 characters: {}",
            s
        )));
    }

    // Check each label
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::InvalidHostname(format!(
                "Label must be 1-63 characters: {}",
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(Error::InvalidHostname(format!(
                "Invalid characters in label: {}",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::InvalidHostname(format!(
                "Label cannot start or end with hyphen: {}",
                label
            )));
        }
    }

    Ok(s.to_string())
}

/// Validate a DNS server address.
pub fn validate_dns_server(s: &str) -> Result<IpAddr> {
    validate_ip(s).map_err(|_| Error::validation(format!("Invalid DNS server: {}", s)))
}
