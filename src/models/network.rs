// Instance Agent - Canonical Network Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Canonical interface model produced by the normalizer.
//!
//! Every backend renders from these types only. Addresses are kept as the
//! text the control plane sent (after validation) so that rendered files
//! carry exactly what was asked for.

use serde::{Deserialize, Serialize};

/// IPv4 address with its netmask in both notations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Address {
    /// IP address.
    pub address: String,
    /// Dotted-quad netmask (e.g. "255.255.255.0").
    pub netmask: String,
    /// Prefix length (e.g. 24 for /24).
    pub prefix_len: u8,
}

/// IPv6 address with prefix length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Address {
    /// IP address.
    pub address: String,
    /// Prefix length (e.g. 64 for /64).
    pub prefix_len: u8,
    /// Gateway attached to this address record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// Static route definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Destination network.
    pub network: String,
    /// Netmask as sent (dotted quad for IPv4, prefix length for IPv6).
    pub netmask: String,
    /// Prefix length.
    pub prefix_len: u8,
    /// Gateway address.
    pub gateway: String,
}

impl Route {
    /// Whether the destination is an IPv6 network.
    pub fn is_ipv6(&self) -> bool {
        self.network.contains(':')
    }
}

/// One slot of an interface: the Nth IPv4 and the Nth IPv6 address.
///
/// Backends that describe one address of each family per (sub-)interface
/// walk these slots; slot 0 is the primary interface, later slots are
/// aliases.
#[derive(Debug, Clone, Copy)]
pub struct AddressSlot<'a> {
    pub index: usize,
    pub ipv4: Option<&'a Ipv4Address>,
    pub ipv6: Option<&'a Ipv6Address>,
}

/// Normalized configuration of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name resolved from MAC or label (e.g. "eth0").
    pub name: String,
    /// Label the control plane used, if any ("public" / "private").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Lowercase hardware address.
    pub mac: String,
    /// Enabled IPv4 addresses, primary first.
    #[serde(default)]
    pub ipv4: Vec<Ipv4Address>,
    /// Enabled IPv6 addresses, primary first.
    #[serde(default)]
    pub ipv6: Vec<Ipv6Address>,
    /// IPv4 default gateway carried by this interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway4: Option<String>,
    /// IPv6 default gateway carried by this interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway6: Option<String>,
    /// DNS servers, in order.
    #[serde(default)]
    pub dns: Vec<String>,
    /// Static routes.
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Whether the interface was up when the request arrived.
    #[serde(default)]
    pub is_up: bool,
}

impl InterfaceConfig {
    /// Number of (sub-)interfaces needed to carry every address.
    pub fn slot_count(&self) -> usize {
        self.ipv4.len().max(self.ipv6.len())
    }

    /// Walk the address slots, primary first.
    pub fn slots(&self) -> impl Iterator<Item = AddressSlot<'_>> {
        (0..self.slot_count()).map(move |index| AddressSlot {
            index,
            ipv4: self.ipv4.get(index),
            ipv6: self.ipv6.get(index),
        })
    }

    /// Name of the (sub-)interface for a slot, `eth0`, `eth0:1`, ...
    pub fn alias_name(&self, index: usize) -> String {
        if index == 0 {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, index)
        }
    }

    /// First address of each family; the ones `/etc/hosts` tracks.
    pub fn primary_addresses(&self) -> Vec<&str> {
        self.ipv4
            .first()
            .map(|ip| ip.address.as_str())
            .into_iter()
            .chain(self.ipv6.first().map(|ip| ip.address.as_str()))
            .collect()
    }
}

/// Complete normalized configuration for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hostname to set.
    pub hostname: String,
    /// Interfaces sorted by name.
    pub interfaces: Vec<InterfaceConfig>,
}

impl NetworkConfig {
    /// The global IPv4 default gateway, if any interface carries one.
    pub fn gateway4(&self) -> Option<&str> {
        self.interfaces.iter().find_map(|i| i.gateway4.as_deref())
    }

    /// The global IPv6 default gateway, if any interface carries one.
    pub fn gateway6(&self) -> Option<&str> {
        self.interfaces.iter().find_map(|i| i.gateway6.as_deref())
    }

    /// Every DNS server of every interface, in interface order.
    pub fn nameservers(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .flat_map(|i| i.dns.iter().map(String::as_str))
            .collect()
    }

    /// Whether any interface carries an IPv6 address.
    pub fn has_ipv6(&self) -> bool {
        self.interfaces.iter().any(|i| !i.ipv6.is_empty())
    }

    /// Look up an interface by name.
    pub fn interface(&self, name: &str) -> Option<&InterfaceConfig> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface() -> InterfaceConfig {
        InterfaceConfig {
            name: "eth0".into(),
            label: Some("public".into()),
            mac: "aa:bb:cc:dd:ee:ff".into(),
            ipv4: vec![
                Ipv4Address {
                    address: "10.0.0.5".into(),
                    netmask: "255.255.255.0".into(),
                    prefix_len: 24,
                },
                Ipv4Address {
                    address: "10.0.0.6".into(),
                    netmask: "255.255.255.0".into(),
                    prefix_len: 24,
                },
            ],
            ipv6: vec![Ipv6Address {
                address: "ffff::2".into(),
                prefix_len: 96,
                gateway: None,
            }],
            gateway4: Some("10.0.0.1".into()),
            gateway6: None,
            dns: vec!["8.8.8.8".into()],
            routes: Vec::new(),
            is_up: true,
        }
    }

    #[test]
    fn test_slots_pair_families() {
        let iface = iface();
        let slots: Vec<_> = iface.slots().collect();
        assert_eq!(slots.len(), 2);
        assert!(slots[0].ipv4.is_some() && slots[0].ipv6.is_some());
        assert!(slots[1].ipv4.is_some() && slots[1].ipv6.is_none());
        assert_eq!(iface.alias_name(0), "eth0");
        assert_eq!(iface.alias_name(1), "eth0:1");
    }

    #[test]
    fn test_primary_addresses() {
        assert_eq!(iface().primary_addresses(), vec!["10.0.0.5", "ffff::2"]);
    }
}
