// Instance Agent - Restart Orchestrator
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! One reconciliation request, end to end.
//!
//! Probe the live interfaces, normalize the descriptor, render the
//! backend's change set plus `/etc/hosts`, stage it, take interfaces down,
//! commit, and bring networking back up. Whatever happens, the caller gets
//! a [`ReconcileResult`] carrying `(status, message)`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::backends::{select_backend, FailurePolicy, InterfaceOp, Phase, Rendered};
use crate::hosts::{patch_hosts, HOSTS_FILE};
use crate::models::{
    AgentConfig, Descriptor, Error, NetworkConfig, OsFamily, ReconcileResult, Result, StepStatus,
};
use crate::network_utils::{InterfaceProbe, LiveInterface};
use crate::normalize::normalize;
use crate::services::CommandRunner;
use crate::storage::{ConfigSource, FileStore};

/// Per-request state handed to every stage.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    /// Family whose backend renders the configuration.
    pub family: OsFamily,
    /// Hostname used when the descriptor carries none.
    pub default_hostname: String,
    /// Attached to every log line of the request.
    pub request_id: Uuid,
    /// Label → interface name overrides, consulted before the built-in table.
    pub interface_labels: BTreeMap<String, String>,
    /// Restart networking even when no file changed.
    pub restart_when_unchanged: bool,
}

impl ReconcileContext {
    pub fn new(family: OsFamily, default_hostname: &str) -> Self {
        Self {
            family,
            default_hostname: default_hostname.to_string(),
            request_id: Uuid::new_v4(),
            interface_labels: BTreeMap::new(),
            restart_when_unchanged: false,
        }
    }

    /// Context for a request, with the overrides from the agent configuration.
    pub fn from_config(config: &AgentConfig, family: OsFamily, default_hostname: &str) -> Self {
        Self {
            interface_labels: config.interface_labels.clone(),
            restart_when_unchanged: config.restart_when_unchanged,
            ..Self::new(family, default_hostname)
        }
    }

    /// Interface name for a legacy `public` / `private` label.
    pub fn resolve_label(&self, label: &str) -> Option<String> {
        self.interface_labels
            .get(label)
            .cloned()
            .or_else(|| self.family.label_interface(label).map(str::to_string))
    }
}

/// Everything a request would change, before anything is touched.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Backend description, layout variant included.
    pub backend: String,
    pub network: NetworkConfig,
    #[serde(flatten)]
    pub rendered: Rendered,
    #[serde(skip)]
    pub live: Vec<LiveInterface>,
}

impl Plan {
    fn is_down(&self, target: &str) -> bool {
        let base = target.split_once(':').map_or(target, |(base, _)| base);
        self.live.iter().any(|l| l.name == base && !l.is_up)
    }
}

/// Drives one request against a root filesystem, a probe and a runner.
pub struct Reconciler<'a> {
    store: &'a FileStore,
    probe: &'a dyn InterfaceProbe,
    runner: &'a dyn CommandRunner,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a FileStore, probe: &'a dyn InterfaceProbe, runner: &'a dyn CommandRunner) -> Self {
        Self {
            store,
            probe,
            runner,
        }
    }

    /// Normalize and render without writing anything or restarting.
    ///
    /// May still run the probe commands a backend needs to pick its layout.
    pub fn plan(&self, descriptor: &Descriptor, ctx: &ReconcileContext) -> Result<Plan> {
        let live = self.probe.list_interfaces()?;
        debug!("Found {} live interfaces", live.len());

        let network = normalize(descriptor, &live, ctx)?;
        let backend = select_backend(ctx.family, self.store, self.runner)?;
        let mut rendered = backend.render(&network, self.store)?;

        let hosts = self.store.read(Path::new(HOSTS_FILE))?.unwrap_or_default();
        rendered.write(HOSTS_FILE, patch_hosts(&hosts, &network));

        Ok(Plan {
            backend: backend.describe(),
            network,
            rendered,
            live,
        })
    }

    /// Reconcile the system with `descriptor`.
    pub fn reconcile(&self, descriptor: &Descriptor, ctx: &ReconcileContext) -> ReconcileResult {
        let span = info_span!("reconcile", request_id = %ctx.request_id, family = %ctx.family);
        let _guard = span.enter();

        let mut result = ReconcileResult::new(ctx.request_id);
        match self.execute(descriptor, ctx, &mut result) {
            Ok(failures) if failures.is_empty() => {
                info!("Network configuration applied");
                result.succeed()
            }
            Ok(failures) => {
                let message = failures.join("; ");
                error!("Network configuration applied with failures: {}", message);
                result.fail(message)
            }
            Err(e) => {
                error!("Network reconfiguration failed: {}", e);
                result.fail(e.to_string())
            }
        }
    }

    /// Returns the collected (non-fatal) failures, or the error that stopped
    /// the request.
    fn execute(
        &self,
        descriptor: &Descriptor,
        ctx: &ReconcileContext,
        result: &mut ReconcileResult,
    ) -> Result<Vec<String>> {
        let plan = checked(result, "render", self.plan(descriptor, ctx))?;
        info!(
            "Rendered {} files for {}, {} to retire",
            plan.rendered.files.len(),
            plan.backend,
            plan.rendered.remove.len()
        );
        result.record("render", StepStatus::Success, plan.backend.as_str());

        let staged = checked(result, "stage", self.store.stage(&plan.rendered.files))?;
        result.record(
            "stage",
            StepStatus::Success,
            format!("{} changed, {} unchanged", staged.paths().len(), staged.unchanged().len()),
        );

        let missing_links = plan
            .rendered
            .symlinks
            .iter()
            .any(|(link, _)| !self.store.exists(link));
        if staged.is_empty()
            && plan.rendered.remove.is_empty()
            && !missing_links
            && !ctx.restart_when_unchanged
        {
            info!("Configuration already up to date, leaving networking alone");
            result.record("restart", StepStatus::Skipped, "no changes");
            return Ok(Vec::new());
        }

        for op in plan.rendered.ops_in(Phase::Down) {
            if plan.is_down(&op.target) {
                debug!("Not taking down {}, already down", op.target);
                result.record(op.command_line(), StepStatus::Skipped, "interface is down");
                continue;
            }
            if let Err(reason) = self.run_op(op, result) {
                warn!("Ignoring failure of {}: {}", op.command_line(), reason);
            }
        }

        let report = checked(
            result,
            "commit",
            self.store
                .commit(staged, &plan.rendered.remove, &plan.rendered.symlinks),
        )?;
        result.record(
            "commit",
            StepStatus::Success,
            format!("{} written, {} retired", report.written.len(), report.retired.len()),
        );
        result.written = report.written;
        result.retired = report.retired;

        let mut failures = Vec::new();
        for op in plan.rendered.ops_in(Phase::Up) {
            let Err(reason) = self.run_op(op, result) else {
                continue;
            };
            let failure = Error::RestartFailed {
                action: op.action.clone(),
                reason,
            };
            match op.policy {
                FailurePolicy::Ignore => warn!("Ignoring failure of {}: {}", op.command_line(), failure),
                FailurePolicy::Collect => failures.push(failure.to_string()),
                FailurePolicy::Abort => return Err(failure),
            }
        }

        Ok(failures)
    }

    /// Run an operation with its retries. The error is the last exit status
    /// (or spawn error) seen.
    fn run_op(&self, op: &InterfaceOp, result: &mut ReconcileResult) -> std::result::Result<(), String> {
        let command = op.command_line();
        let mut reason = String::new();

        for attempt in 0..=op.retries {
            if attempt > 0 {
                info!("Retrying {}", command);
            }
            debug!("Executing {}", command);

            match self.runner.run(&op.argv) {
                Ok(output) if output.success() => {
                    result.record(command.as_str(), StepStatus::Success, "");
                    return Ok(());
                }
                Ok(output) => {
                    debug!(status = output.status, stderr = %output.stderr.trim(), "{} failed", command);
                    reason = output.status.to_string();
                }
                Err(e) => reason = e.to_string(),
            }

            let status = if attempt < op.retries || op.policy == FailurePolicy::Ignore {
                StepStatus::Warning
            } else {
                StepStatus::Error
            };
            result.record(command.as_str(), status, format!("failed: {}", reason));
        }

        Err(reason)
    }
}

/// Record a failed step before handing the error on.
fn checked<T>(result: &mut ReconcileResult, step: &str, outcome: Result<T>) -> Result<T> {
    if let Err(e) = &outcome {
        result.record(step, StepStatus::Error, e.to_string());
    }
    outcome
}
