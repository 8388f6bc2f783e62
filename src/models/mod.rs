// Instance Agent - Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Instance Agent Models
//!
//! Shared types used by every stage of a reconciliation:
//!
//! - **Descriptor**: raw, loosely typed request from the control plane
//! - **Network**: canonical interface model the backends render from
//! - **Config**: agent configuration file
//! - **Result**: status pair and step records reported back
//! - **Error**: shared error types
//!
//! ## Design Principles
//!
//! 1. **Idempotent**: applying the same descriptor twice changes nothing
//! 2. **Declarative**: the descriptor describes desired state, not steps
//! 3. **Minimal**: unrelated lines of existing files survive untouched

pub mod config;
pub mod descriptor;
pub mod error;
pub mod network;
pub mod os;
pub mod result;
pub mod validation;

// Re-export main types for convenience
pub use config::{AgentConfig, FileOwner};
pub use descriptor::{Descriptor, Loose, RawAddress, RawInterface, RawRoute};
pub use error::{Error, Result};
pub use network::{AddressSlot, InterfaceConfig, Ipv4Address, Ipv6Address, NetworkConfig, Route};
pub use os::OsFamily;
pub use result::{ReconcileResult, StepStatus, STATUS_FAILED, STATUS_OK};

/// Configuration directory name (under /etc or XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "instance-agent";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "agent.toml";

/// System-wide configuration directory.
pub const SYSTEM_CONFIG_DIR: &str = "/etc";

/// Header written at the top of every fully generated file.
pub const GENERATED_HEADER: &str = "# Automatically generated, do not edit";
