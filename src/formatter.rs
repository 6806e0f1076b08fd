//! Response formatter
//!
//! Turns an [`ExecutionResult`] (or a failure before execution) into a
//! sentence for the user, plus a short list of suggested phrasings when the
//! request did not work out.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::ResponseConfig;
use crate::error::{ErrorCode, PipelineError};
use crate::executor::ExecutionResult;
use crate::intent::{Intent, IntentKind};
use crate::output_parser::OutputData;

/// Canned replies for input we could not classify
pub const CLARIFICATIONS: &[&str] = &[
    "I'm not quite sure what you mean. Could you rephrase that?",
    "I didn't catch that. Could you say it another way?",
    "Sorry, I don't understand that yet. Could you try different words?",
    "I'm not sure how to help with that. Could you be more specific?",
];

/// Suggested phrasings, most useful first
pub const GENERAL_SUGGESTIONS: &[&str] = &[
    "search [package name] - Find available packages",
    "list installed - Show what's installed",
    "system info - Display system information",
    "check system - Run health diagnostics",
    "show updates - List available updates",
    "clean up - See how much space garbage collection would free",
];

/// What the user sees
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl Response {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestions: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResponseFormatter {
    config: ResponseConfig,
}

impl ResponseFormatter {
    pub fn new(config: ResponseConfig) -> Self {
        Self { config }
    }

    /// Sentence for an executed command
    pub fn format(&self, result: &ExecutionResult, intent: &Intent) -> Response {
        if !result.success {
            let error = result.error.as_deref().unwrap_or("Please try again.");
            let message = match result.error_code {
                // Never phrase a refusal as a failed attempt
                Some(ErrorCode::UnsafeCommand) => error.to_string(),
                _ => format!("I couldn't {}. {}", action_phrase(intent), error),
            };
            let suggestions = match result.data {
                Some(_) => None,
                None => Some(self.failure_suggestions(result.error_code, intent)),
            };
            return Response {
                message,
                suggestions,
            };
        }

        let package = subject(intent);
        let message = match &result.data {
            Some(OutputData::Search { count, .. }) => match package {
                Some(p) => format!("I found {} packages matching \"{}\".", count, p),
                None => format!("I found {} packages.", count),
            },
            Some(OutputData::List { count, .. }) => {
                format!("You have {} packages installed.", count)
            }
            Some(OutputData::Info { .. }) => match (intent.kind, package) {
                (IntentKind::PackageInfo, Some(p)) => format!("Here's information about {}.", p),
                _ => "Here's information about your system.".to_string(),
            },
            Some(OutputData::Health {
                healthy,
                issues,
                warnings,
                ..
            }) => {
                if *healthy && *warnings == 0 {
                    "Your system looks healthy.".to_string()
                } else if *healthy {
                    format!("Your system is healthy, with {} warnings.", warnings)
                } else {
                    format!(
                        "I found {} problems and {} warnings with your system.",
                        issues, warnings
                    )
                }
            }
            Some(OutputData::Install { dry_run, .. }) => {
                let p = package.unwrap_or("that package");
                if *dry_run {
                    format!(
                        "I would install {} for you. (This is a simulation; nothing was changed.)",
                        p
                    )
                } else {
                    format!("Installing {}...", p)
                }
            }
            Some(OutputData::Remove { dry_run, .. }) => {
                let p = package.unwrap_or("that package");
                if *dry_run {
                    format!(
                        "I would remove {} for you. (This is a simulation; nothing was changed.)",
                        p
                    )
                } else {
                    format!("Removing {}...", p)
                }
            }
            Some(OutputData::Update { message, .. }) => format!("{}.", message.trim_end_matches('.')),
            Some(OutputData::Updates { count, .. }) => {
                if *count > 0 {
                    format!("I found {} available updates.", count)
                } else {
                    "Your system is up to date!".to_string()
                }
            }
            Some(OutputData::GarbageCollect {
                dry_run,
                space_freed,
                ..
            }) => {
                if *dry_run {
                    format!(
                        "Cleanup would free approximately {} of disk space. (This is a simulation)",
                        space_freed
                    )
                } else {
                    "System cleanup completed.".to_string()
                }
            }
            Some(OutputData::ServiceStatus { active, .. }) => {
                let service = package.unwrap_or("That service");
                if *active {
                    format!("{} is running.", service)
                } else {
                    format!("{} is not running.", service)
                }
            }
            Some(OutputData::Raw { .. }) | None => "Command completed successfully.".to_string(),
        };

        Response::plain(message)
    }

    /// Reply for unknown or low-confidence intents
    pub fn clarify(&self, _intent: &Intent) -> Response {
        let message = if self.config.randomize_clarifications {
            CLARIFICATIONS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(CLARIFICATIONS[0])
        } else {
            CLARIFICATIONS[0]
        };
        Response {
            message: message.to_string(),
            suggestions: Some(self.general_suggestions()),
        }
    }

    /// Reply for a request that failed before anything ran
    pub fn format_error(&self, err: &PipelineError, intent: &Intent) -> Response {
        let suggestions = match err {
            // Prompting for the missing name is the whole reply
            PipelineError::MissingArgument { .. } => None,
            _ => Some(self.failure_suggestions(Some(err.code()), intent)),
        };
        Response {
            message: err.user_message(),
            suggestions,
        }
    }

    fn general_suggestions(&self) -> Vec<String> {
        GENERAL_SUGGESTIONS
            .iter()
            .take(self.config.max_suggestions)
            .map(|s| s.to_string())
            .collect()
    }

    fn failure_suggestions(&self, code: Option<ErrorCode>, intent: &Intent) -> Vec<String> {
        let mut suggestions = Vec::new();
        match (code, subject(intent)) {
            (Some(ErrorCode::NotFound), Some(p)) => {
                suggestions.push(format!("search {} - Look for similarly named packages", p));
            }
            (Some(ErrorCode::Timeout), _) => {
                suggestions.push("Try a more specific package name".to_string());
            }
            (Some(ErrorCode::Network), _) | (Some(ErrorCode::BinaryNotFound), _) => {
                suggestions.push("check system - Run health diagnostics".to_string());
            }
            _ => {}
        }
        for s in GENERAL_SUGGESTIONS {
            if !suggestions.iter().any(|existing| existing == s) {
                suggestions.push(s.to_string());
            }
        }
        suggestions.truncate(self.config.max_suggestions);
        suggestions
    }
}

/// The package or service the intent is about
fn subject(intent: &Intent) -> Option<&str> {
    intent.primary_argument().map(|e| e.value.as_str())
}

fn action_phrase(intent: &Intent) -> String {
    let thing = subject(intent).unwrap_or("that");
    match intent.kind {
        IntentKind::Search => format!("search for {}", thing),
        IntentKind::List => "list your packages".to_string(),
        IntentKind::SystemInfo => "get system information".to_string(),
        IntentKind::Check => "check your system".to_string(),
        IntentKind::PackageInfo => format!("get information about {}", thing),
        IntentKind::Install => format!("install {}", thing),
        IntentKind::Remove => format!("remove {}", thing),
        IntentKind::Update => "update your channels".to_string(),
        IntentKind::ListUpdates => "check for updates".to_string(),
        IntentKind::GarbageCollect => "clean up the store".to_string(),
        IntentKind::ServiceStatus => format!("check the status of {}", thing),
        IntentKind::Unknown => "do that".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeErrorKind;
    use crate::intent::{Entity, EntityKind};

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::new(ResponseConfig {
            randomize_clarifications: false,
            ..Default::default()
        })
    }

    fn intent(kind: IntentKind, package: Option<&str>) -> Intent {
        let entities = package
            .map(|p| vec![Entity::new(EntityKind::Package, p, 0.95)])
            .unwrap_or_default();
        Intent::new(kind, 0.95, entities, "x")
    }

    #[test]
    fn test_search_message() {
        let result = ExecutionResult::succeeded(
            OutputData::Search {
                count: 5,
                packages: vec!["firefox".into()],
            },
            None,
            false,
        );
        let response = formatter().format(&result, &intent(IntentKind::Search, Some("firefox")));
        assert_eq!(response.message, "I found 5 packages matching \"firefox\".");
        assert!(response.suggestions.is_none());
    }

    #[test]
    fn test_install_dry_run_message() {
        let result = ExecutionResult::succeeded(
            OutputData::Install {
                dry_run: true,
                message: String::new(),
                packages: "vim-2.0.0".into(),
            },
            None,
            false,
        );
        let response = formatter().format(&result, &intent(IntentKind::Install, Some("vim")));
        assert!(response.message.starts_with("I would install vim for you."));
        assert!(response.message.contains("simulation"));
    }

    #[test]
    fn test_no_updates() {
        let result = ExecutionResult::succeeded(
            OutputData::Updates {
                count: 0,
                updates: vec![],
                message: String::new(),
            },
            None,
            false,
        );
        let response = formatter().format(&result, &intent(IntentKind::ListUpdates, None));
        assert_eq!(response.message, "Your system is up to date!");
    }

    #[test]
    fn test_failure_includes_action_and_suggestions() {
        let err = PipelineError::ClassifiedRuntime {
            kind: RuntimeErrorKind::NotFound,
            stderr: String::new(),
        };
        let result = ExecutionResult::failed(&err, None);
        let response = formatter().format(&result, &intent(IntentKind::Install, Some("fierfox")));
        assert_eq!(
            response.message,
            "I couldn't install fierfox. Package not found. Try searching with a different name."
        );
        let suggestions = response.suggestions.unwrap();
        assert!(suggestions[0].starts_with("search fierfox"));
        assert_eq!(suggestions.len(), 4);
    }

    #[test]
    fn test_refusal_is_generic() {
        let result = ExecutionResult::failed(
            &PipelineError::UnsafeCommand {
                pattern: "pipe to shell".into(),
            },
            None,
        );
        let response = formatter().format(&result, &intent(IntentKind::Search, Some("x")));
        assert_eq!(response.message, "Sorry, I can't run that.");
    }

    #[test]
    fn test_clarify_is_canned_with_suggestions() {
        let unknown = Intent::unknown("do something with stuff");
        let response = formatter().clarify(&unknown);
        assert_eq!(response.message, CLARIFICATIONS[0]);
        assert_eq!(response.suggestions.unwrap().len(), 4);

        let random = ResponseFormatter::default().clarify(&unknown);
        assert!(CLARIFICATIONS.contains(&random.message.as_str()));
        assert!(!random.suggestions.unwrap().is_empty());
    }

    #[test]
    fn test_max_suggestions_respected() {
        let f = ResponseFormatter::new(ResponseConfig {
            max_suggestions: 1,
            ..Default::default()
        });
        assert_eq!(f.clarify(&Intent::unknown("?")).suggestions.unwrap().len(), 1);
    }

    #[test]
    fn test_missing_argument_prompts_without_suggestions() {
        let err = PipelineError::MissingArgument {
            intent: "install".into(),
            entity: "package".into(),
        };
        let response = formatter().format_error(&err, &intent(IntentKind::Install, None));
        assert_eq!(response.message, "Which package did you mean? Please include its name.");
        assert!(response.suggestions.is_none());
    }
}
