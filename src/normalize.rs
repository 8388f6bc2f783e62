// Instance Agent - Descriptor Normalizer
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Turns a raw [`Descriptor`] into a validated [`NetworkConfig`].
//!
//! Interfaces are identified by MAC address (resolved against the live
//! interface list) or by the legacy `public` / `private` label. Disabled
//! addresses and routes are dropped, key spellings are unified, netmasks
//! are converted to prefix lengths, and the result is sorted by interface
//! name so every backend renders in the same order.

use std::collections::HashSet;

use tracing::debug;

use crate::models::validation::{
    netmask_to_prefix_len, validate_dns_server, validate_hostname, validate_ip, validate_ipv4,
    validate_ipv6, validate_ipv6_prefix, validate_mac_address,
};
use crate::models::{
    Descriptor, Error, InterfaceConfig, Ipv4Address, Ipv6Address, NetworkConfig, RawAddress,
    RawInterface, RawRoute, Result, Route,
};
use crate::network_utils::LiveInterface;
use crate::reconcile::ReconcileContext;

/// Label of the interface that carries the default route.
pub const PUBLIC_LABEL: &str = "public";

/// Validate and canonicalize a descriptor.
pub fn normalize(
    descriptor: &Descriptor,
    live: &[LiveInterface],
    ctx: &ReconcileContext,
) -> Result<NetworkConfig> {
    let hostname = match descriptor.hostname.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => ctx.default_hostname.clone(),
    };
    let hostname = validate_hostname(&hostname)?;

    let mut seen = HashSet::new();
    let mut interfaces = Vec::with_capacity(descriptor.interfaces.len());

    for raw in &descriptor.interfaces {
        let iface = normalize_interface(raw, live, ctx)?;
        if !seen.insert(iface.name.clone()) {
            return Err(Error::validation(format!(
                "Interface {} configured more than once",
                iface.name
            )));
        }
        interfaces.push(iface);
    }

    if interfaces.iter().filter(|i| i.gateway4.is_some()).count() > 1 {
        return Err(Error::DuplicateGateway { family: "IPv4" });
    }
    if interfaces.iter().filter(|i| i.gateway6.is_some()).count() > 1 {
        return Err(Error::DuplicateGateway { family: "IPv6" });
    }

    interfaces.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(NetworkConfig {
        hostname,
        interfaces,
    })
}

fn normalize_interface(
    raw: &RawInterface,
    live: &[LiveInterface],
    ctx: &ReconcileContext,
) -> Result<InterfaceConfig> {
    let (name, mac) = resolve_interface(raw, live, ctx)?;
    debug!(interface = %name, mac = %mac, "Resolved interface");

    let raw_ip4s = raw.ips.as_deref().unwrap_or_default();
    let raw_ip6s = raw.ip6s.as_deref().unwrap_or_default();
    if raw_ip4s.is_empty() && raw_ip6s.is_empty() {
        return Err(Error::validation(format!("No IPs found for interface {}", name)));
    }

    let ipv4 = raw_ip4s
        .iter()
        .filter(|ip| ip.is_enabled())
        .map(normalize_ipv4)
        .collect::<Result<Vec<_>>>()?;
    let ipv6 = raw_ip6s
        .iter()
        .filter(|ip| ip.is_enabled())
        .map(normalize_ipv6)
        .collect::<Result<Vec<_>>>()?;
    if ipv4.is_empty() && ipv6.is_empty() {
        return Err(Error::validation(format!(
            "No enabled IPs found for interface {}",
            name
        )));
    }

    let gateway4 = match present(raw.gateway.as_deref()) {
        Some(gw) => Some(validate_ipv4(gw)?.to_string()),
        None => None,
    };
    let gateway6 = match present(raw.gateway6.as_deref()) {
        Some(gw) => Some(validate_ipv6(gw)?.to_string()),
        None => ipv6.iter().find_map(|ip| ip.gateway.clone()),
    };

    let routes = raw
        .routes
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|route| route.is_enabled())
        .map(normalize_route)
        .collect::<Result<Vec<_>>>()?;

    let mut dns = Vec::new();
    for server in raw.dns.as_deref().unwrap_or_default() {
        let server = server.trim();
        if server.is_empty() {
            continue;
        }
        validate_dns_server(server)?;
        dns.push(server.to_string());
    }

    let label = raw.label.as_deref().map(str::trim).map(str::to_string);
    if label.as_deref() == Some(PUBLIC_LABEL) {
        if gateway4.is_none() && gateway6.is_none() {
            return Err(Error::validation("No gateway found for public interface"));
        }
        if dns.is_empty() {
            return Err(Error::validation("No DNS servers found for public interface"));
        }
    }

    let is_up = live.iter().any(|l| l.name == name && l.is_up);

    Ok(InterfaceConfig {
        name,
        label,
        mac,
        ipv4,
        ipv6,
        gateway4,
        gateway6,
        dns,
        routes,
        is_up,
    })
}

/// Resolve the interface name and MAC. A MAC takes precedence over a label.
fn resolve_interface(
    raw: &RawInterface,
    live: &[LiveInterface],
    ctx: &ReconcileContext,
) -> Result<(String, String)> {
    if let Some(mac) = present(raw.mac.as_deref()) {
        let mac = validate_mac_address(mac)?;
        return live
            .iter()
            .find(|l| l.mac.eq_ignore_ascii_case(&mac))
            .map(|l| (l.name.clone(), mac.clone()))
            .ok_or(Error::UnknownMac(mac));
    }

    let label = present(raw.label.as_deref())
        .ok_or_else(|| Error::validation("No 'label' or 'mac' found for interface"))?;
    let name = ctx
        .resolve_label(label)
        .ok_or_else(|| Error::UnknownLabel(label.to_string()))?;

    // Pick up the hardware address when the interface exists
    let mac = live
        .iter()
        .find(|l| l.name == name)
        .map(|l| l.mac.to_lowercase())
        .unwrap_or_default();

    Ok((name, mac))
}

fn normalize_ipv4(raw: &RawAddress) -> Result<Ipv4Address> {
    let address = present(raw.ip.as_deref())
        .or_else(|| present(raw.address.as_deref()))
        .ok_or_else(|| Error::missing("ip", "IPv4 address"))?;
    validate_ipv4(address)?;

    let netmask = raw
        .netmask
        .as_ref()
        .map(|n| n.as_text())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::missing("netmask", "IPv4 address"))?;
    let prefix_len = netmask_to_prefix_len(&netmask)?;

    Ok(Ipv4Address {
        address: address.to_string(),
        netmask,
        prefix_len,
    })
}

fn normalize_ipv6(raw: &RawAddress) -> Result<Ipv6Address> {
    let address = present(raw.ip.as_deref())
        .or_else(|| present(raw.address.as_deref()))
        .ok_or_else(|| Error::missing("ip' or 'address", "IPv6 address"))?;
    validate_ipv6(address)?;

    let prefix = raw
        .netmask
        .as_ref()
        .or(raw.prefixlen.as_ref())
        .map(|n| n.as_text())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::missing("netmask", "IPv6 address"))?;
    let prefix_len = validate_ipv6_prefix(&prefix)?;

    let gateway = match present(raw.gateway.as_deref()) {
        Some(gw) => Some(validate_ipv6(gw)?.to_string()),
        None => None,
    };

    Ok(Ipv6Address {
        address: address.to_string(),
        prefix_len,
        gateway,
    })
}

fn normalize_route(raw: &RawRoute) -> Result<Route> {
    let network = present(raw.route.as_deref())
        .or_else(|| present(raw.network.as_deref()))
        .ok_or_else(|| Error::missing("route", "route"))?;
    let netmask = raw
        .netmask
        .as_ref()
        .map(|n| n.as_text())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::missing("netmask", "route"))?;
    let gateway =
        present(raw.gateway.as_deref()).ok_or_else(|| Error::missing("gateway", "route"))?;

    validate_ip(network)?;
    validate_ip(gateway)?;

    let prefix_len = if network.contains(':') {
        validate_ipv6_prefix(&netmask)?
    } else {
        netmask_to_prefix_len(&netmask)?
    };

    Ok(Route {
        network: network.to_string(),
        netmask,
        prefix_len,
        gateway: gateway.to_string(),
    })
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
