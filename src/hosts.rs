// Instance Agent - Hosts File Patcher
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Keeps `/etc/hosts` pointing the instance's own addresses at its hostname.
//!
//! Only lines whose first field is one of the instance's primary addresses
//! are considered, and only two shapes are rewritten: a single short
//! hostname, or a short hostname next to a fully qualified one. A rewritten
//! line stays in the file as a comment above its replacement. Everything
//! else passes through untouched. Addresses not covered by an existing line
//! get a new line at the end.

use tracing::{debug, warn};

use crate::models::NetworkConfig;

/// Location of the hosts file.
pub const HOSTS_FILE: &str = "/etc/hosts";

/// Appended to the commented-out copy of every rewritten line.
pub const REMOVED_MARKER: &str = "# Removed by instance-agent";

/// Addresses the agent owns in `/etc/hosts`: the first address of each
/// family on every interface, in interface order.
pub fn owned_addresses(cfg: &NetworkConfig) -> Vec<String> {
    let mut owned: Vec<String> = Vec::new();
    for iface in &cfg.interfaces {
        for address in iface.primary_addresses() {
            if !owned.iter().any(|a| a == address) {
                owned.push(address.to_string());
            }
        }
    }
    owned
}

/// Produce the new hosts file from the current one.
pub fn patch_hosts(existing: &str, cfg: &NetworkConfig) -> String {
    let hostname = cfg.hostname.as_str();
    let owned = owned_addresses(cfg);
    let mut covered: Vec<&str> = Vec::new();
    let mut out = String::with_capacity(existing.len() + 64);

    for line in existing.lines() {
        let (config, comment) = match line.split_once('#') {
            Some((config, rest)) => (config.trim(), format!("\t#{}", rest)),
            None => (line.trim(), String::new()),
        };

        let mut fields = config.split_whitespace();
        let address = match fields.next() {
            Some(a) if owned.iter().any(|o| o == a) && !covered.contains(&a) => a,
            _ => {
                out.push_str(line);
                out.push('\n');
                continue;
            }
        };
        let names: Vec<&str> = fields.collect();

        match names.as_slice() {
            [name] if *name == hostname => {
                out.push_str(line);
                out.push('\n');
                covered.push(address);
            }
            [name] if !name.contains('.') => {
                debug!(address, old = %name, "Replacing hostname in hosts entry");
                push_removed(&mut out, line);
                out.push_str(&format!("{}\t{}{}\n", address, hostname, comment));
                covered.push(address);
            }
            [first, second] if first.contains('.') != second.contains('.') => {
                let names: Vec<&str> = [*first, *second]
                    .iter()
                    .map(|n| if n.contains('.') { *n } else { hostname })
                    .collect();
                push_removed(&mut out, line);
                out.push_str(&format!("{}\t{}{}\n", address, names.join(" "), comment));
                covered.push(address);
            }
            _ => {
                warn!(line, "Leaving unrecognised hosts entry untouched");
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    for address in &owned {
        if !covered.contains(&address.as_str()) {
            out.push_str(&format!("{}\t{}\n", address, hostname));
        }
    }

    out
}

fn push_removed(out: &mut String, line: &str) {
    out.push_str(&format!("# {}\t{}\n", line.trim(), REMOVED_MARKER));
}
