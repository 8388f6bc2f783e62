// Instance Agent - Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Services the reconciliation engine calls out to:
//! - Runner: external command execution

pub mod runner;

pub use runner::{argv, CommandOutput, CommandRunner, SystemRunner};
