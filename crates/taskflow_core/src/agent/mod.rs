//! Natural-language assistant over the task store.
//!
//! # Responsibility
//! - Parse a free-text message into one catalog action or a chat reply.
//! - Execute the action under the caller's identity and render the result.
//!
//! # Invariants
//! - At most one action executes per message.
//! - Actions run through the same services as direct API calls.

pub mod action;
pub mod dispatcher;
pub mod executor;
pub mod format;
pub mod intent;
pub mod llm;
pub mod prompt;

pub use action::{ActionKind, ActionRequest, ActionSchema, DecodeError, ListFilter};
pub use dispatcher::{
    ActionRecord, ApiEnvelope, DispatchOutcome, DispatchResponse, DispatchStage, Dispatcher,
    RATE_LIMIT_MESSAGE, UPSTREAM_UNAVAILABLE_MESSAGE,
};
pub use executor::{ActionError, ActionExecutor, ActionOutput, ResolvedAction, TaskView};
pub use intent::{
    interpret_model_output, ActionIntent, ChatFallback, FallbackReason, IntentContext,
    IntentParser, ModelIntentParser, ParsedIntent, RuleIntentParser,
};
pub use llm::{GeminiModel, LanguageModel, ModelError};
