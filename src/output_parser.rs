//! Output parsing
//!
//! Turns a successful command's stdout into structured [`OutputData`], one
//! parser per intent, and classifies a failed command's stderr. Parsers are
//! best effort: anything they cannot make sense of comes back as `Raw`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::builder::BuiltCommand;
use crate::error::RuntimeErrorKind;
use crate::intent::IntentKind;

const MAX_SEARCH_RESULTS: usize = 10;
const MAX_LISTED_PACKAGES: usize = 20;
const MAX_LISTED_UPDATES: usize = 10;
const INFO_CHARS: usize = 500;
const SUMMARY_CHARS: usize = 300;
const DETAIL_CHARS: usize = 200;

lazy_static! {
    static ref NIXPKGS_ATTR: Regex = Regex::new(r"nixpkgs\.(\S+)").unwrap();
    static ref SEARCH_BULLET: Regex = Regex::new(r"^\*\s+(\S+)").unwrap();
    static ref INSTALLING: Regex = Regex::new(r"installing '([^']+)'").unwrap();
    static ref WOULD_INSTALL: Regex = Regex::new(r"would be installed:(.+)").unwrap();
    static ref SIZE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*(MiB|GiB|KiB)").unwrap();
    static ref FAIL_MARK: Regex = Regex::new(r"\[FAIL\]").unwrap();
    static ref WARN_MARK: Regex = Regex::new(r"\[WARN\]").unwrap();
}

/// Structured result of a command, by intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum OutputData {
    Search {
        count: usize,
        packages: Vec<String>,
    },
    List {
        count: usize,
        packages: Vec<String>,
    },
    Info {
        info: String,
    },
    Health {
        healthy: bool,
        issues: usize,
        warnings: usize,
        summary: String,
    },
    Install {
        dry_run: bool,
        message: String,
        packages: String,
    },
    Remove {
        dry_run: bool,
        message: String,
        details: String,
    },
    Update {
        message: String,
        details: String,
    },
    Updates {
        count: usize,
        updates: Vec<String>,
        message: String,
    },
    GarbageCollect {
        dry_run: bool,
        message: String,
        space_freed: String,
    },
    ServiceStatus {
        active: bool,
        status_line: String,
    },
    Raw {
        raw: String,
    },
}

impl OutputData {
    /// Package names carried by this result, if any
    pub fn packages(&self) -> &[String] {
        match self {
            OutputData::Search { packages, .. } | OutputData::List { packages, .. } => packages,
            _ => &[],
        }
    }
}

/// Parse stdout according to the command's intent
pub fn parse_output(command: &BuiltCommand, stdout: &str) -> OutputData {
    match command.intent {
        IntentKind::Search => parse_search(stdout, command.argument.as_deref()),
        IntentKind::List => parse_list(stdout),
        IntentKind::SystemInfo | IntentKind::PackageInfo => OutputData::Info {
            info: truncate_chars(stdout, INFO_CHARS),
        },
        IntentKind::Check => parse_check(stdout),
        IntentKind::Install => parse_install(stdout, command.dry_run),
        IntentKind::Remove => OutputData::Remove {
            dry_run: command.dry_run,
            message: if command.dry_run {
                "This would remove the package (dry-run mode)".to_string()
            } else {
                "Package removed".to_string()
            },
            details: truncate_chars(stdout, DETAIL_CHARS),
        },
        IntentKind::Update => OutputData::Update {
            message: "Channel update completed".to_string(),
            details: truncate_chars(stdout, DETAIL_CHARS),
        },
        IntentKind::ListUpdates => parse_list_updates(stdout),
        IntentKind::GarbageCollect => parse_garbage_collect(stdout),
        IntentKind::ServiceStatus => parse_service_status(stdout),
        IntentKind::Unknown => OutputData::Raw {
            raw: stdout.to_string(),
        },
    }
}

/// Search results: JSON keys, `nixpkgs.<attr>` lines, `* <attr>` bullets,
/// and finally bare lines mentioning the query.
pub fn parse_search(stdout: &str, query: Option<&str>) -> OutputData {
    let trimmed = stdout.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            let names: Vec<String> = match value {
                serde_json::Value::Object(map) => map.keys().map(|k| attr_name(k)).collect(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
                _ => Vec::new(),
            };
            return OutputData::Search {
                count: names.len(),
                packages: names.into_iter().take(MAX_SEARCH_RESULTS).collect(),
            };
        }
    }

    let lines: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut packages: Vec<String> = lines
        .iter()
        .filter_map(|line| {
            NIXPKGS_ATTR
                .captures(line)
                .or_else(|| SEARCH_BULLET.captures(line))
                .map(|c| attr_name(&c[1]))
        })
        .collect();

    if packages.is_empty() {
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            packages = lines
                .iter()
                .filter(|line| line.contains(query) && !line.contains(' '))
                .map(|line| line.to_string())
                .collect();
        }
    }

    OutputData::Search {
        count: packages.len(),
        packages: packages.into_iter().take(MAX_SEARCH_RESULTS).collect(),
    }
}

/// `legacyPackages.x86_64-linux.firefox` → `firefox`
fn attr_name(key: &str) -> String {
    let mut parts = key.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("legacyPackages" | "packages"), Some(_system), Some(attr)) => attr.to_string(),
        _ => key.to_string(),
    }
}

pub fn parse_list(stdout: &str) -> OutputData {
    let lines: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    OutputData::List {
        count: lines.len(),
        packages: lines.into_iter().take(MAX_LISTED_PACKAGES).collect(),
    }
}

pub fn parse_check(stdout: &str) -> OutputData {
    let issues = FAIL_MARK.find_iter(stdout).count();
    OutputData::Health {
        healthy: issues == 0,
        issues,
        warnings: WARN_MARK.find_iter(stdout).count(),
        summary: truncate_chars(stdout, SUMMARY_CHARS),
    }
}

pub fn parse_install(stdout: &str, dry_run: bool) -> OutputData {
    let installing: Vec<&str> = INSTALLING
        .captures_iter(stdout)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    let packages = if !installing.is_empty() {
        installing.join(", ")
    } else if let Some(c) = WOULD_INSTALL.captures(stdout) {
        c[1].trim().to_string()
    } else {
        "Package installation simulated".to_string()
    };

    OutputData::Install {
        dry_run,
        message: if dry_run {
            "This would install the package (dry-run mode)".to_string()
        } else {
            "Package installed".to_string()
        },
        packages,
    }
}

pub fn parse_list_updates(stdout: &str) -> OutputData {
    let updates: Vec<String> = stdout
        .lines()
        .filter(|l| l.contains("->"))
        .map(|l| l.trim().to_string())
        .collect();
    let count = updates.len();
    OutputData::Updates {
        count,
        updates: updates.into_iter().take(MAX_LISTED_UPDATES).collect(),
        message: format!("{} updates available", count),
    }
}

pub fn parse_garbage_collect(stdout: &str) -> OutputData {
    let space_freed = SIZE
        .captures(stdout)
        .map(|c| format!("{} {}", &c[1], &c[2]))
        .unwrap_or_else(|| "Unknown amount".to_string());
    OutputData::GarbageCollect {
        dry_run: true,
        message: "Garbage collection would free space (dry-run mode)".to_string(),
        space_freed,
    }
}

pub fn parse_service_status(stdout: &str) -> OutputData {
    let status_line = stdout
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("Active:"))
        .unwrap_or("")
        .to_string();
    OutputData::ServiceStatus {
        active: status_line.contains("active (running)"),
        status_line,
    }
}

/// Best-effort classification of a failed command's stderr
pub fn classify_stderr(stderr: &str) -> Option<RuntimeErrorKind> {
    let lower = stderr.to_lowercase();
    if lower.contains("not found")
        || lower.contains("could not be found")
        || lower.contains("does not provide attribute")
        || lower.contains("matches no derivations")
    {
        Some(RuntimeErrorKind::NotFound)
    } else if lower.contains("permission denied") || lower.contains("operation not permitted") {
        Some(RuntimeErrorKind::PermissionDenied)
    } else if lower.contains("network")
        || lower.contains("could not resolve host")
        || lower.contains("unable to download")
    {
        Some(RuntimeErrorKind::Network)
    } else {
        None
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_json_keys() {
        let stdout = r#"{"legacyPackages.x86_64-linux.firefox":{"pname":"firefox"},"legacyPackages.x86_64-linux.firefox-esr":{"pname":"firefox-esr"}}"#;
        let data = parse_search(stdout, Some("firefox"));
        assert_eq!(
            data,
            OutputData::Search {
                count: 2,
                packages: vec!["firefox".into(), "firefox-esr".into()],
            }
        );
    }

    #[test]
    fn test_search_text_lines() {
        let stdout = "* nixpkgs.firefox (120.0)\n  A web browser\n* nixpkgs.firefox-bin (120.0)\n";
        assert_eq!(
            parse_search(stdout, None).packages(),
            &["firefox".to_string(), "firefox-bin".to_string()]
        );

        let stdout = "* legacyPackages.x86_64-linux.htop (3.2.2)\n  Interactive process viewer\n";
        assert_eq!(parse_search(stdout, None).packages(), &["htop".to_string()]);
    }

    #[test]
    fn test_search_bare_lines_mention_query() {
        let stdout = "firefox\nfirefox-esr\nsomething else entirely\n";
        assert_eq!(parse_search(stdout, Some("firefox")).packages().len(), 2);
    }

    #[test]
    fn test_search_caps_results() {
        let stdout: String = (0..25).map(|i| format!("nixpkgs.pkg{}\n", i)).collect();
        match parse_search(&stdout, None) {
            OutputData::Search { count, packages } => {
                assert_eq!(count, 25);
                assert_eq!(packages.len(), MAX_SEARCH_RESULTS);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_counts_all_keeps_twenty() {
        let stdout: String = (0..30).map(|i| format!("pkg-{}\n\n", i)).collect();
        match parse_list(&stdout) {
            OutputData::List { count, packages } => {
                assert_eq!(count, 30);
                assert_eq!(packages.len(), 20);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_check_counts_markers() {
        let stdout = "[PASS] PATH contains only one nix version.\n[FAIL] multiple versions\n[WARN] x\n[WARN] y\n";
        assert_eq!(
            parse_check(stdout),
            OutputData::Health {
                healthy: false,
                issues: 1,
                warnings: 2,
                summary: stdout.to_string(),
            }
        );
        assert!(matches!(parse_check("[PASS] ok"), OutputData::Health { healthy: true, .. }));
    }

    #[test]
    fn test_install_dry_run() {
        let data = parse_install("(dry run; not doing anything)\ninstalling 'vim-9.0.1897'\n", true);
        assert_eq!(
            data,
            OutputData::Install {
                dry_run: true,
                message: "This would install the package (dry-run mode)".into(),
                packages: "vim-9.0.1897".into(),
            }
        );
    }

    #[test]
    fn test_list_updates() {
        let stdout = "upgrading 'firefox-119.0' to 'firefox-120.0'\nfirefox: 119.0 -> 120.0\n";
        match parse_list_updates(stdout) {
            OutputData::Updates { count, updates, message } => {
                assert_eq!(count, 1);
                assert_eq!(updates, vec!["firefox: 119.0 -> 120.0".to_string()]);
                assert_eq!(message, "1 updates available");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_garbage_collect_size() {
        let data = parse_garbage_collect("finding garbage collector roots...\n1532 store paths deleted, 2.3 GiB freed\n");
        assert!(matches!(data, OutputData::GarbageCollect { ref space_freed, .. } if space_freed == "2.3 GiB"));
        assert!(matches!(
            parse_garbage_collect("nothing"),
            OutputData::GarbageCollect { ref space_freed, .. } if space_freed == "Unknown amount"
        ));
    }

    #[test]
    fn test_service_status() {
        let stdout = "● sshd.service - SSH Daemon\n     Loaded: loaded\n     Active: active (running) since Mon\n";
        assert_eq!(
            parse_service_status(stdout),
            OutputData::ServiceStatus {
                active: true,
                status_line: "Active: active (running) since Mon".into(),
            }
        );
    }

    #[test]
    fn test_info_truncated_to_char_budget() {
        let command = BuiltCommand::from_raw("nix-info -m", IntentKind::SystemInfo);
        let long = "é".repeat(1000);
        match parse_output(&command, &long) {
            OutputData::Info { info } => assert_eq!(info.chars().count(), INFO_CHARS),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            classify_stderr("error: attribute 'nope' in selection path 'nope' not found"),
            Some(RuntimeErrorKind::NotFound)
        );
        assert_eq!(
            classify_stderr("error: opening lock file: Permission denied"),
            Some(RuntimeErrorKind::PermissionDenied)
        );
        assert_eq!(
            classify_stderr("unable to download 'https://cache.nixos.org'"),
            Some(RuntimeErrorKind::Network)
        );
        assert_eq!(
            classify_stderr("Unit nginx.service could not be found."),
            Some(RuntimeErrorKind::NotFound)
        );
        assert_eq!(classify_stderr("segfault"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let data = OutputData::GarbageCollect {
            dry_run: true,
            message: "m".into(),
            space_freed: "2.3 GiB".into(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["kind"], "garbage-collect");
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["spaceFreed"], "2.3 GiB");
    }
}
