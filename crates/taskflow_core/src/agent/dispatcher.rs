//! Request orchestration: parse, resolve, authorize, execute, format.
//!
//! # Responsibility
//! - Run exactly one action (or one chat reply) per inbound message.
//! - Turn every failure into a caller-safe response with a typed outcome.
//!
//! # Invariants
//! - Parsing, including every model call, finishes before the store
//!   transaction opens; a parse failure never leaves partial writes.
//! - Resolve, authorize and execute share one transaction that commits only
//!   after execution succeeds.
//! - Model quota exhaustion surfaces as `RateLimited` and is never retried.
//! - Per-request state lives in a `DispatchContext` dropped before `dispatch`
//!   returns.

use super::action::{ActionKind, ActionRequest};
use super::executor::{ActionError, ActionExecutor, ActionOutput};
use super::format::render;
use super::intent::{
    ChatFallback, FallbackReason, IntentContext, IntentParser, ModelIntentParser, ParsedIntent,
    RuleIntentParser, UNPARSEABLE_REPLY,
};
use super::llm::{GeminiModel, LanguageModel, ModelError};
use super::prompt::narration_prompt;
use crate::config::{AssistantSettings, Settings};
use crate::error::ErrorKind;
use crate::model::tenant::Identity;
use crate::repo::{SqliteStore, UserRepository};
use crate::search::{FtsTaskSearch, SearchScope, SemanticSearch};
use crate::service::{CredentialHasher, LockedCredentialHasher};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub const RATE_LIMIT_MESSAGE: &str = "⏳ API quota exceeded. Please wait a moment and try again.";
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again shortly.";
const INTERNAL_FAILURE_MESSAGE: &str =
    "Something went wrong while processing your request. Please try again.";

/// Orchestration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Received,
    Parsed,
    Resolved,
    Authorized,
    Executed,
    Formatted,
    Failed,
}

impl DispatchStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::Resolved => "resolved",
            Self::Authorized => "authorized",
            Self::Executed => "executed",
            Self::Formatted => "formatted",
            Self::Failed => "failed",
        }
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// One action ran and committed.
    Completed,
    /// Terminal chat reply; nothing executed.
    Chat,
    /// Model quota exhausted; safe to retry later.
    RateLimited,
    Failed(ErrorKind),
}

/// One executed (or attempted) action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub action: String,
    pub success: bool,
    pub details: Value,
}

/// Chat reply to the caller: `{response, actions}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResponse {
    pub response: String,
    pub actions: Vec<ActionRecord>,
    #[serde(skip)]
    pub outcome: DispatchOutcome,
}

impl DispatchResponse {
    fn chat(message: String) -> Self {
        Self {
            response: message,
            actions: Vec::new(),
            outcome: DispatchOutcome::Chat,
        }
    }

    fn rate_limited() -> Self {
        Self {
            response: RATE_LIMIT_MESSAGE.to_string(),
            actions: Vec::new(),
            outcome: DispatchOutcome::RateLimited,
        }
    }

    fn failed(kind: ErrorKind, message: &str, action: Option<ActionKind>) -> Self {
        let actions = action
            .map(|action| ActionRecord {
                action: action.name().to_string(),
                success: false,
                details: json!({ "error": kind.as_str(), "message": message }),
            })
            .into_iter()
            .collect();
        Self {
            response: format!("❌ {message}"),
            actions,
            outcome: DispatchOutcome::Failed(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            DispatchOutcome::Completed | DispatchOutcome::Chat
        )
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.outcome {
            DispatchOutcome::Failed(kind) => Some(kind),
            DispatchOutcome::RateLimited => Some(ErrorKind::UpstreamUnavailable),
            DispatchOutcome::Completed | DispatchOutcome::Chat => None,
        }
    }

    /// HTTP-style status for transports; quota exhaustion is 429.
    pub fn status_code(&self) -> u16 {
        match self.outcome {
            DispatchOutcome::Completed | DispatchOutcome::Chat => 200,
            DispatchOutcome::RateLimited => 429,
            DispatchOutcome::Failed(kind) => match kind {
                ErrorKind::NotFound => 404,
                ErrorKind::Forbidden => 403,
                ErrorKind::InvalidInput => 400,
                ErrorKind::StateConflict => 409,
                ErrorKind::UpstreamUnavailable => 503,
                ErrorKind::ParseFailure => 422,
                ErrorKind::Internal => 500,
            },
        }
    }

    pub fn into_envelope(self, now: DateTime<Utc>) -> ApiEnvelope<DispatchResponse> {
        ApiEnvelope {
            success: self.is_success(),
            message: self.response.clone(),
            status_code: self.status_code(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            data: Some(self),
        }
    }
}

/// Uniform response wrapper for transports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    /// RFC 3339 UTC.
    pub timestamp: String,
    pub status_code: u16,
}

/// Request-scoped trace state; logs its own teardown.
struct DispatchContext<'i> {
    request_id: Uuid,
    identity: &'i Identity,
    stage: DispatchStage,
    action: Option<ActionKind>,
    started: Instant,
}

impl<'i> DispatchContext<'i> {
    fn open(identity: &'i Identity) -> Self {
        let context = Self {
            request_id: Uuid::new_v4(),
            identity,
            stage: DispatchStage::Received,
            action: None,
            started: Instant::now(),
        };
        context.log_stage();
        context
    }

    fn enter(&mut self, stage: DispatchStage) {
        self.stage = stage;
        self.log_stage();
    }

    fn log_stage(&self) {
        info!(
            "event=dispatch_stage module=agent status=ok request_id={} stage={} action={} org_id={} user_id={}",
            self.request_id,
            self.stage.as_str(),
            self.action.map_or("none", ActionKind::name),
            self.identity.organization_id,
            self.identity.user_id
        );
    }

    fn fail(&mut self, kind: ErrorKind) {
        let failed_at = self.stage;
        self.stage = DispatchStage::Failed;
        warn!(
            "event=dispatch_stage module=agent status=error request_id={} stage=failed after={} action={} error_kind={}",
            self.request_id,
            failed_at.as_str(),
            self.action.map_or("none", ActionKind::name),
            kind
        );
    }
}

impl Drop for DispatchContext<'_> {
    fn drop(&mut self) {
        info!(
            "event=dispatch_end module=agent request_id={} final_stage={} duration_ms={}",
            self.request_id,
            self.stage.as_str(),
            self.started.elapsed().as_millis()
        );
    }
}

/// Natural-language front door over the action catalog.
///
/// Holds only immutable collaborators; safe to share across worker threads,
/// each dispatching on its own connection.
pub struct Dispatcher {
    parser: Box<dyn IntentParser>,
    degraded_parser: Option<Box<dyn IntentParser>>,
    search: Box<dyn SemanticSearch>,
    hasher: Box<dyn CredentialHasher>,
    narrator: Option<Arc<dyn LanguageModel>>,
    limits: AssistantSettings,
}

impl Dispatcher {
    pub fn new(parser: Box<dyn IntentParser>) -> Self {
        Self {
            parser,
            degraded_parser: None,
            search: Box::new(FtsTaskSearch),
            hasher: Box::new(LockedCredentialHasher),
            narrator: None,
            limits: AssistantSettings::default(),
        }
    }

    /// Keyword parser only; no language model.
    pub fn rule_based() -> Self {
        Self::new(Box::new(RuleIntentParser))
    }

    /// Model parser with rule fallback when an API key is configured,
    /// rule parser otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        let dispatcher = match GeminiModel::from_settings(&settings.model) {
            Some(model) => {
                let model: Arc<dyn LanguageModel> = Arc::new(model);
                let dispatcher = Self::new(Box::new(ModelIntentParser::new(Arc::clone(&model))))
                    .with_degraded_parser(Box::new(RuleIntentParser));
                if settings.model.narrate {
                    dispatcher.with_narrator(model)
                } else {
                    dispatcher
                }
            }
            None => Self::rule_based(),
        };
        info!(
            "event=dispatcher_init module=agent status=ok parser={} narrate={}",
            dispatcher.parser.name(),
            dispatcher.narrator.is_some()
        );
        dispatcher.with_limits(settings.assistant)
    }

    /// Parser used when the primary parser times out or is unreachable.
    pub fn with_degraded_parser(mut self, parser: Box<dyn IntentParser>) -> Self {
        self.degraded_parser = Some(parser);
        self
    }

    pub fn with_search(mut self, search: Box<dyn SemanticSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn with_hasher(mut self, hasher: Box<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Rephrases successful results with a second model call.
    pub fn with_narrator(mut self, narrator: Arc<dyn LanguageModel>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn with_limits(mut self, limits: AssistantSettings) -> Self {
        self.limits = limits;
        self
    }

    pub fn dispatch(
        &self,
        conn: &mut Connection,
        message: &str,
        identity: &Identity,
    ) -> DispatchResponse {
        self.dispatch_at(conn, message, identity, Utc::now())
    }

    /// `dispatch` with an explicit clock.
    pub fn dispatch_at(
        &self,
        conn: &mut Connection,
        message: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> DispatchResponse {
        let mut context = DispatchContext::open(identity);

        let full_name = match SqliteStore::new(conn).get_user(identity.organization_id, identity.user_id) {
            Ok(user) => user.map(|user| user.full_name),
            Err(err) => {
                error!(
                    "event=dispatch_identity module=agent status=error request_id={} error={}",
                    context.request_id, err
                );
                context.fail(ErrorKind::Internal);
                return DispatchResponse::failed(ErrorKind::Internal, INTERNAL_FAILURE_MESSAGE, None);
            }
        };
        let intent_context = IntentContext::new(identity, full_name.as_deref(), now);

        let parsed = match self.parse_intent(message, &intent_context) {
            Ok(parsed) => parsed,
            Err(response) => {
                context.fail(response.error_kind().unwrap_or(ErrorKind::Internal));
                return response;
            }
        };
        context.enter(DispatchStage::Parsed);

        let intent = match parsed {
            ParsedIntent::Chat(chat) => {
                info!(
                    "event=dispatch_chat module=agent status=ok request_id={} reason={:?}",
                    context.request_id, chat.reason
                );
                return DispatchResponse::chat(chat.message);
            }
            ParsedIntent::Action(intent) => intent,
        };
        let kind = intent.kind;
        context.action = Some(kind);

        let request = match ActionRequest::decode(kind, &intent.parameters) {
            Ok(request) => request,
            Err(err) => return self.fail(&mut context, kind, &ActionError::from(err)),
        };

        let behavior = if kind.is_read_only() {
            TransactionBehavior::Deferred
        } else {
            TransactionBehavior::Immediate
        };
        let tx = match conn.transaction_with_behavior(behavior) {
            Ok(tx) => tx,
            Err(err) => return self.fail_internal(&mut context, kind, &err),
        };

        let output = match self.run_action(&tx, &mut context, identity, now, request) {
            Ok(output) => output,
            // Dropping `tx` rolls back.
            Err(err) => return self.fail(&mut context, kind, &err),
        };
        if let Err(err) = tx.commit() {
            return self.fail_internal(&mut context, kind, &err);
        }

        let formatted = render(&output);
        context.enter(DispatchStage::Formatted);
        let response = self.narrate(message, kind, formatted);

        DispatchResponse {
            response,
            actions: vec![ActionRecord {
                action: kind.name().to_string(),
                success: true,
                details: serde_json::to_value(&output).unwrap_or(Value::Null),
            }],
            outcome: DispatchOutcome::Completed,
        }
    }

    fn parse_intent(
        &self,
        message: &str,
        context: &IntentContext<'_>,
    ) -> Result<ParsedIntent, DispatchResponse> {
        let err = match self.parser.parse(message, context) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => err,
        };
        warn!(
            "event=intent_parse module=agent status=error parser={} kind={}",
            self.parser.name(),
            err.kind()
        );

        match err {
            ModelError::RateLimited => Err(DispatchResponse::rate_limited()),
            ModelError::InvalidResponse(_) => Ok(ParsedIntent::Chat(ChatFallback::new(
                UNPARSEABLE_REPLY,
                FallbackReason::Unparseable,
            ))),
            ModelError::Timeout { .. } | ModelError::Unavailable(_) => {
                let unavailable = || {
                    DispatchResponse::failed(
                        ErrorKind::UpstreamUnavailable,
                        UPSTREAM_UNAVAILABLE_MESSAGE,
                        None,
                    )
                };
                let Some(degraded) = &self.degraded_parser else {
                    return Err(unavailable());
                };
                info!(
                    "event=intent_parse module=agent status=degraded parser={}",
                    degraded.name()
                );
                degraded.parse(message, context).map_err(|err| match err {
                    ModelError::RateLimited => DispatchResponse::rate_limited(),
                    _ => unavailable(),
                })
            }
        }
    }

    fn run_action(
        &self,
        conn: &Connection,
        context: &mut DispatchContext<'_>,
        identity: &Identity,
        now: DateTime<Utc>,
        request: ActionRequest,
    ) -> Result<ActionOutput, ActionError> {
        let store = SqliteStore::new(conn);
        let executor = ActionExecutor::new(
            &store,
            self.search.as_ref(),
            SearchScope {
                organization_id: identity.organization_id,
                conn,
            },
            self.hasher.as_ref(),
            identity,
            now,
            self.limits,
        );

        let resolved = executor.resolve(request)?;
        context.enter(DispatchStage::Resolved);
        executor.authorize(&resolved)?;
        context.enter(DispatchStage::Authorized);
        let output = executor.execute(resolved)?;
        context.enter(DispatchStage::Executed);
        Ok(output)
    }

    fn narrate(&self, message: &str, kind: ActionKind, formatted: String) -> String {
        let Some(narrator) = &self.narrator else {
            return formatted;
        };
        match narrator.complete(&narration_prompt(message, kind, &formatted)) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => formatted,
            Err(err) => {
                warn!(
                    "event=narration module=agent status=error kind={} fallback=formatter",
                    err.kind()
                );
                formatted
            }
        }
    }

    fn fail(
        &self,
        context: &mut DispatchContext<'_>,
        kind: ActionKind,
        err: &ActionError,
    ) -> DispatchResponse {
        let error_kind = err.kind();
        if error_kind == ErrorKind::Internal {
            error!(
                "event=action_failed module=agent status=error request_id={} action={} error={}",
                context.request_id, kind, err
            );
        }
        context.fail(error_kind);
        DispatchResponse::failed(error_kind, &err.user_message(), Some(kind))
    }

    fn fail_internal(
        &self,
        context: &mut DispatchContext<'_>,
        kind: ActionKind,
        err: &rusqlite::Error,
    ) -> DispatchResponse {
        error!(
            "event=action_failed module=agent status=error request_id={} action={} stage={} error={}",
            context.request_id,
            kind,
            context.stage.as_str(),
            err
        );
        context.fail(ErrorKind::Internal);
        DispatchResponse::failed(ErrorKind::Internal, INTERNAL_FAILURE_MESSAGE, Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchOutcome, DispatchResponse, RATE_LIMIT_MESSAGE};
    use crate::agent::action::ActionKind;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn rate_limit_maps_to_429() {
        let response = DispatchResponse::rate_limited();
        assert_eq!(response.status_code(), 429);
        assert_eq!(response.response, RATE_LIMIT_MESSAGE);
        assert_eq!(response.error_kind(), Some(ErrorKind::UpstreamUnavailable));
    }

    #[test]
    fn failure_records_the_attempted_action() {
        let response =
            DispatchResponse::failed(ErrorKind::Forbidden, "Not enough permissions", Some(ActionKind::CreateProject));
        assert_eq!(response.status_code(), 403);
        assert_eq!(response.response, "❌ Not enough permissions");
        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.actions[0].action, "create_project");
        assert!(!response.actions[0].success);
        assert_eq!(response.actions[0].details["error"], "forbidden");
    }

    #[test]
    fn envelope_wraps_response_with_timestamp() {
        let response = DispatchResponse {
            response: "hello".to_string(),
            actions: Vec::new(),
            outcome: DispatchOutcome::Chat,
        };
        let now = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let value = serde_json::to_value(response.into_envelope(now)).expect("serialize");
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "hello");
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["timestamp"], "2030-01-02T03:04:05.000Z");
        assert_eq!(value["data"]["response"], "hello");
        assert!(value["data"]["actions"].as_array().expect("array").is_empty());
        assert!(value["data"].get("outcome").is_none());
    }
}
