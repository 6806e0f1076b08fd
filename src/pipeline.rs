//! The request pipeline
//!
//! `process` is the single entry point: validate the input, recognise the
//! intent, build and validate the command, execute it and format the reply.
//! Every failure along the way is turned into a [`ProcessResult`]; nothing
//! escapes as an error or a panic.
//!
//! All tables are read-only after construction, so one pipeline can serve any
//! number of concurrent requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::builder::{BuiltCommand, CommandBuilder};
use crate::config::NixTalkConfig;
use crate::error::{ErrorCode, PipelineError, Result};
use crate::executor::{CommandExecutor, Executor};
use crate::formatter::{Response, ResponseFormatter};
use crate::intent::{Intent, IntentKind};
use crate::output_parser::OutputData;
use crate::recognizer::IntentRecognizer;
use crate::templates::TemplateTable;
use crate::validator::SafetyValidator;

/// Longest accepted request, in characters
pub const MAX_INPUT_CHARS: usize = 500;

/// Optional caller context. Only used for logging.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub session_id: Option<String>,
    pub previous_command: Option<String>,
}

/// What the front end gets back for one request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<OutputData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    pub intent: IntentKind,
    /// The command that ran (only ever a validated one)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub retryable: bool,
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ProcessResult {
    fn new(request_id: Uuid, intent: IntentKind, success: bool, response: Response) -> Self {
        Self {
            success,
            message: response.message,
            data: None,
            suggestions: response.suggestions,
            intent,
            command: None,
            error_code: None,
            retryable: false,
            request_id,
            timestamp: Utc::now(),
        }
    }

    fn with_error(mut self, err: &PipelineError) -> Self {
        self.error_code = Some(err.code());
        self.retryable = err.is_retryable();
        self
    }
}

/// What a request would do, without running it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub intent: Intent,
    /// The approved command, absent when the request needs clarification
    pub command: Option<BuiltCommand>,
}

pub struct Pipeline<E: CommandExecutor = Executor> {
    recognizer: IntentRecognizer,
    builder: CommandBuilder,
    validator: SafetyValidator,
    executor: E,
    formatter: ResponseFormatter,
    min_confidence: f64,
}

impl Pipeline<Executor> {
    /// Build a pipeline with the executor the config selects
    pub fn from_config(config: &NixTalkConfig) -> Result<Self> {
        Self::with_executor(config, Executor::from_config(&config.executor))
    }
}

impl<E: CommandExecutor> Pipeline<E> {
    pub fn with_executor(config: &NixTalkConfig, executor: E) -> Result<Self> {
        let templates = match &config.templates_file {
            Some(path) => TemplateTable::load_from_yaml(path)?,
            None => TemplateTable::builtin(),
        };
        if templates.is_empty() {
            return Err(PipelineError::Config("template table is empty".into()));
        }
        info!(templates = templates.len(), "pipeline ready");

        let validator = SafetyValidator::new(templates.bases());
        Ok(Self {
            recognizer: IntentRecognizer::new(),
            builder: CommandBuilder::new(Arc::new(templates)),
            validator,
            executor,
            formatter: ResponseFormatter::new(config.response.clone()),
            min_confidence: config.response.min_confidence,
        })
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn templates(&self) -> &TemplateTable {
        self.builder.templates()
    }

    fn needs_clarification(&self, intent: &Intent) -> bool {
        intent.is_unknown() || intent.confidence < self.min_confidence
    }

    /// Recognise and build, stopping short of execution
    pub fn explain(&self, input: &str) -> Result<Explanation> {
        let input = check_input(input)?;
        let intent = self.recognizer.recognize(input);
        if self.needs_clarification(&intent) {
            return Ok(Explanation {
                intent,
                command: None,
            });
        }
        let command = self.validator.approve(self.builder.build(&intent)?)?;
        Ok(Explanation {
            intent,
            command: Some(command),
        })
    }

    /// Run one request end to end
    pub async fn process(&self, input: &str, context: Option<&RequestContext>) -> ProcessResult {
        let request_id = Uuid::new_v4();
        let session_id = context
            .and_then(|c| c.session_id.as_deref())
            .unwrap_or("-");
        let span = info_span!("process", %request_id, session_id);

        async move {
            if let Some(previous) = context.and_then(|c| c.previous_command.as_deref()) {
                debug!(previous, "request has a previous command");
            }
            self.run(request_id, input).await
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request_id: Uuid, input: &str) -> ProcessResult {
        let input = match check_input(input) {
            Ok(input) => input,
            Err(err) => {
                debug!(error = %err, "rejected input");
                let response = self.formatter.format_error(&err, &Intent::unknown(input));
                return ProcessResult::new(request_id, IntentKind::Unknown, false, response)
                    .with_error(&err);
            }
        };

        let intent = self.recognizer.recognize(input);
        info!(intent = %intent.kind, confidence = intent.confidence, "recognized intent");

        if self.needs_clarification(&intent) {
            let response = self.formatter.clarify(&intent);
            return ProcessResult::new(request_id, intent.kind, false, response);
        }

        let command = match self
            .builder
            .build(&intent)
            .and_then(|built| self.validator.approve(built))
        {
            Ok(command) => command,
            Err(err) => {
                if matches!(err, PipelineError::UnsafeCommand { .. }) {
                    warn!(intent = %intent.kind, "command rejected by safety validator");
                } else {
                    debug!(intent = %intent.kind, error = %err, "could not build command");
                }
                let response = self.formatter.format_error(&err, &intent);
                return ProcessResult::new(request_id, intent.kind, false, response).with_error(&err);
            }
        };

        debug!(command = %command.raw, dry_run = command.dry_run, "executing");
        let result = self.executor.execute(&command).await;
        let response = self.formatter.format(&result, &intent);

        ProcessResult {
            data: result.data,
            command: Some(command.raw),
            error_code: result.error_code,
            retryable: result.retryable,
            ..ProcessResult::new(request_id, intent.kind, result.success, response)
        }
    }
}

/// Trimmed input, if it is a plausible request
fn check_input(input: &str) -> Result<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidInput("the request is empty".into()));
    }
    if trimmed.chars().count() > MAX_INPUT_CHARS {
        return Err(PipelineError::InvalidInput(format!(
            "the request is longer than {} characters",
            MAX_INPUT_CHARS
        )));
    }
    Ok(trimmed)
}
