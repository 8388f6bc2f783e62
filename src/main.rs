// Instance Agent - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Instance Agent
//!
//! Reconciles a VM guest's network configuration, hostname and
//! `/etc/hosts` with a descriptor from the hypervisor control plane.
//!
//! The descriptor is read as JSON from a file (or stdin with `-`) and the
//! result, including the `(status, message)` pair, is printed as JSON.

use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use uuid::Uuid;

mod backends;
mod hosts;
mod models;
mod network_utils;
mod normalize;
mod reconcile;
mod services;
mod shellvars;
mod storage;

use models::{AgentConfig, Descriptor, Error, OsFamily, ReconcileResult, Result};
use network_utils::{detect_os, IfconfigProbe, InterfaceProbe, SysfsProbe};
use reconcile::{ReconcileContext, Reconciler};
use services::SystemRunner;
use storage::FileStore;

/// Human-readable application name.
pub const APP_NAME: &str = "Instance Agent";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
    println!();
    println!("In-guest network reconciliation agent for virtual machine instances.");
}

/// Print help information and exit.
fn print_help() {
    println!(
        "Usage: {} [OPTIONS] <DESCRIPTOR|->",
        env::args().next().unwrap_or_else(|| "instance-agent".to_string())
    );
    println!();
    println!("Reconcile network interfaces, routes, DNS, hostname and /etc/hosts");
    println!("with a JSON network descriptor ('-' reads it from stdin).");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>  Read agent configuration from FILE");
    println!("  -r, --root <DIR>     Resolve every configuration path under DIR");
    println!("  -o, --os <FAMILY>    Force the OS family (debian, redhat, arch, suse, gentoo, freebsd)");
    println!("  -n, --dry-run        Print the files that would be written and exit");
    println!("  -d, --debug          Enable debug logging");
    println!("  -h, --help           Show this help message and exit");
    println!("  -v, --version        Show version information and exit");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG             Set log level (trace, debug, info, warn, error)");
}

/// Parsed command line.
#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    root: Option<PathBuf>,
    os: Option<OsFamily>,
    dry_run: bool,
    debug: bool,
    descriptor: Option<String>,
}

enum Command {
    Run(Options),
    Exit(ExitCode),
}

fn parse_args(args: &[String]) -> Command {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Command::Exit(ExitCode::SUCCESS);
            }
            "-v" | "--version" => {
                print_version();
                return Command::Exit(ExitCode::SUCCESS);
            }
            "-n" | "--dry-run" => options.dry_run = true,
            "-d" | "--debug" => options.debug = true,
            "-c" | "--config" | "-r" | "--root" | "-o" | "--os" => {
                let Some(value) = iter.next() else {
                    eprintln!("Option '{}' requires a value", arg);
                    eprintln!("Try '--help' for more information.");
                    return Command::Exit(ExitCode::FAILURE);
                };
                match arg.as_str() {
                    "-c" | "--config" => options.config = Some(PathBuf::from(value)),
                    "-r" | "--root" => options.root = Some(PathBuf::from(value)),
                    _ => match value.parse::<OsFamily>() {
                        Ok(family) => options.os = Some(family),
                        Err(e) => {
                            eprintln!("{}", e);
                            return Command::Exit(ExitCode::FAILURE);
                        }
                    },
                }
            }
            "-" => options.descriptor = Some(arg.clone()),
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Try '--help' for more information.");
                return Command::Exit(ExitCode::FAILURE);
            }
            _ => options.descriptor = Some(arg.clone()),
        }
    }

    if options.descriptor.is_none() {
        eprintln!("Missing descriptor argument");
        eprintln!("Try '--help' for more information.");
        return Command::Exit(ExitCode::FAILURE);
    }

    Command::Run(options)
}

fn read_descriptor(source: &str) -> Result<Descriptor> {
    let json = if source == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };
    Descriptor::from_json(&json)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(options: &Options, config: &AgentConfig) -> Result<ExitCode> {
    let descriptor = read_descriptor(options.descriptor.as_deref().unwrap_or("-"))?;

    let root = options.root.clone().unwrap_or_else(|| config.root.clone());
    let detected = detect_os(&root);
    let family = options
        .os
        .or(config.os_family)
        .or_else(|| detected.as_ref().map(|d| d.family))
        .ok_or_else(|| Error::UnsupportedOs(root.display().to_string()))?;
    let default_hostname = detected
        .as_ref()
        .filter(|d| d.family == family)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| family.as_str().to_string());

    tracing::info!("Configuring {} network under {}", family.display_name(), root.display());

    let store = FileStore::new(root, config.owner());
    let runner = SystemRunner;
    let ifconfig;
    let sysfs;
    let probe: &dyn InterfaceProbe = if family == OsFamily::FreeBsd {
        ifconfig = IfconfigProbe::new(&runner);
        &ifconfig
    } else {
        sysfs = SysfsProbe::default();
        &sysfs
    };

    let ctx = ReconcileContext::from_config(config, family, &default_hostname);
    let reconciler = Reconciler::new(&store, probe, &runner);

    if options.dry_run {
        let plan = reconciler.plan(&descriptor, &ctx)?;
        print_json(&plan)?;
        return Ok(ExitCode::SUCCESS);
    }

    let result = reconciler.reconcile(&descriptor, &ctx);
    print_json(&result)?;
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Command::Run(options) => options,
        Command::Exit(code) => return code,
    };

    let config = match AgentConfig::load(options.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging with appropriate level; stdout carries the result
    let log_level = if options.debug {
        tracing::Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_level.into()),
        )
        .init();

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    match run(&options, &config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            let result = ReconcileResult::new(Uuid::new_v4()).fail(e.to_string());
            if let Err(e) = print_json(&result) {
                eprintln!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}
