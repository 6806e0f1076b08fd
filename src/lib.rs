//! nixtalk_core - natural-language front end for Nix package management
//!
//! Free text goes in, a safe, template-built command runs (or is simulated),
//! and a plain-language answer comes out.
//!
//! Modules:
//! - normalizer: Lowercasing, whitespace collapse, typo and alias fixes
//! - intent: Intent / entity data model
//! - matcher: Ordered regex rule groups, first match wins
//! - fallback: Keyword guesses for input no rule matched
//! - recognizer: normalize → patterns → fallback
//! - templates: Pre-approved command skeletons (built-in or YAML)
//! - builder: Intent → command, with argument sanitizing
//! - validator: Deny-list + allow-list safety check
//! - sandbox: Minimal environment, temp HOME, capped output, termination
//! - executor: Real execution behind the `CommandExecutor` trait
//! - mock_executor: Canned execution for demos and tests
//! - output_parser: Per-intent stdout parsing, stderr classification
//! - formatter: Natural-language replies and suggestions
//! - pipeline: `process(input, context) -> ProcessResult`
//! - config: YAML configuration
//! - error: Error taxonomy

pub mod builder;
pub mod config;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod formatter;
pub mod intent;
pub mod matcher;
pub mod mock_executor;
pub mod normalizer;
pub mod output_parser;
pub mod pipeline;
pub mod recognizer;
pub mod sandbox;
pub mod templates;
pub mod validator;

// Re-export key types for convenience
pub use builder::{sanitize_argument, BuiltCommand, CommandBuilder};

pub use config::{ExecutorConfig, ExecutorMode, NixTalkConfig, ResponseConfig};

pub use error::{ErrorCode, PipelineError, Result, RuntimeErrorKind};

pub use executor::{CommandExecutor, ExecutionResult, Executor, RealExecutor};

pub use fallback::FallbackMatcher;

pub use formatter::{Response, ResponseFormatter};

pub use intent::{Entity, EntityKind, Intent, IntentKind};

pub use matcher::PatternMatcher;

pub use mock_executor::MockExecutor;

pub use normalizer::Normalizer;

pub use output_parser::OutputData;

pub use pipeline::{Explanation, Pipeline, ProcessResult, RequestContext};

pub use recognizer::IntentRecognizer;

pub use templates::{CommandTemplate, TemplateTable};

pub use validator::{DangerCategory, DangerPattern, SafetyValidator};
