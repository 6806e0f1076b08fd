//! Canned executor for demos and tests.
//!
//! Never spawns anything. Every call is recorded so tests can check what
//! would have run, and individual intents can be told to fail.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::builder::BuiltCommand;
use crate::error::PipelineError;
use crate::executor::{CommandExecutor, ExecutionResult};
use crate::intent::IntentKind;
use crate::output_parser::OutputData;

const FIREFOX_FAMILY: &[&str] = &[
    "firefox",
    "firefox-esr",
    "firefox-beta",
    "firefox-devedition",
    "firefox-wayland",
];

const INSTALLED: &[&str] = &["nodejs-18.17.0", "git-2.42.0", "vim-9.0.1897"];

const UPDATES: &[&str] = &[
    "firefox: 119.0 -> 120.0",
    "nodejs: 18.17.0 -> 18.18.0",
    "git: 2.42.0 -> 2.43.0",
];

#[derive(Default)]
pub struct MockExecutor {
    failures: HashMap<IntentKind, ExecutionResult>,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command for `intent` fail with `err`
    pub fn fail_with(mut self, intent: IntentKind, err: PipelineError) -> Self {
        self.failures.insert(intent, ExecutionResult::failed(&err, None));
        self
    }

    /// Raw command lines executed so far
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn canned(command: &BuiltCommand) -> OutputData {
        let argument = command.argument.as_deref().unwrap_or("package");
        match command.intent {
            IntentKind::Search => {
                let packages: Vec<String> = if argument.contains("firefox") {
                    FIREFOX_FAMILY.iter().map(|p| p.to_string()).collect()
                } else {
                    vec![argument.to_string(), format!("{}-unwrapped", argument)]
                };
                OutputData::Search {
                    count: packages.len(),
                    packages,
                }
            }
            IntentKind::List => OutputData::List {
                count: INSTALLED.len(),
                packages: INSTALLED.iter().map(|p| p.to_string()).collect(),
            },
            IntentKind::SystemInfo => OutputData::Info {
                info: "system: \"x86_64-linux\", multi-user?: yes, version: nix-env (Nix) 2.18.1, channels(root): \"nixos-24.05\"".to_string(),
            },
            IntentKind::Check => OutputData::Health {
                healthy: true,
                issues: 0,
                warnings: 0,
                summary: "[PASS] PATH contains only one version of nix.\n[PASS] All profiles are gcroots.".to_string(),
            },
            IntentKind::PackageInfo => OutputData::Info {
                info: format!("/nix/store/0000000000000000000000000000000-{}-2.0.0", argument),
            },
            IntentKind::Install => OutputData::Install {
                dry_run: true,
                message: "This would install the package (dry-run mode)".to_string(),
                packages: format!("{}-2.0.0", argument),
            },
            IntentKind::Remove => OutputData::Remove {
                dry_run: true,
                message: "This would remove the package (dry-run mode)".to_string(),
                details: format!("Removing {}...", argument),
            },
            IntentKind::Update => OutputData::Update {
                message: "Channel update completed".to_string(),
                details: "nixos-24.05 channel updated".to_string(),
            },
            IntentKind::ListUpdates => OutputData::Updates {
                count: UPDATES.len(),
                updates: UPDATES.iter().map(|u| u.to_string()).collect(),
                message: format!("{} updates available", UPDATES.len()),
            },
            IntentKind::GarbageCollect => OutputData::GarbageCollect {
                dry_run: true,
                message: "Garbage collection would free space (dry-run mode)".to_string(),
                space_freed: "2.3 GiB".to_string(),
            },
            IntentKind::ServiceStatus => OutputData::ServiceStatus {
                active: true,
                status_line: "Active: active (running)".to_string(),
            },
            IntentKind::Unknown => OutputData::Raw {
                raw: "Mock execution successful".to_string(),
            },
        }
    }
}

impl CommandExecutor for MockExecutor {
    async fn execute(&self, command: &BuiltCommand) -> ExecutionResult {
        if !command.safe {
            warn!(intent = %command.intent, "refusing to execute unvalidated command");
            return ExecutionResult::refused();
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.raw.clone());
        }
        info!(intent = %command.intent, command = %command.raw, "mock execution");

        if let Some(failure) = self.failures.get(&command.intent) {
            return failure.clone();
        }

        ExecutionResult::succeeded(Self::canned(command), None, false)
    }
}
