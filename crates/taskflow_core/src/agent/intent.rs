//! Intent parsing: free text to one action or a chat reply.
//!
//! # Responsibility
//! - Turn a user message into `(ActionKind, parameters)` or a `ChatFallback`.
//! - Absorb malformed model output; only collaborator failures surface as errors.
//!
//! # Invariants
//! - Parsing performs no store writes.
//! - An unrecognized action name never yields `ParsedIntent::Action`.
//! - `respond`/`chat` replies are terminal.

use super::action::ActionKind;
use super::llm::{LanguageModel, ModelError};
use super::prompt::intent_prompt;
use crate::logging::sanitize_message;
use crate::model::tenant::Identity;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const DEFAULT_CHAT_REPLY: &str = "I'm not sure how to help with that.";
pub const UNPARSEABLE_REPLY: &str =
    "I understood your request but couldn't process it properly.";
const MAX_RAW_ECHO_CHARS: usize = 500;

/// Request-scoped facts a parser may use.
#[derive(Debug, Clone, Copy)]
pub struct IntentContext<'a> {
    pub identity: &'a Identity,
    pub full_name: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl<'a> IntentContext<'a> {
    pub fn new(identity: &'a Identity, full_name: Option<&'a str>, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            full_name,
            now,
        }
    }

    pub fn display_name(&self) -> String {
        match self.full_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("user #{}", self.identity.user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The parser chose to reply instead of acting.
    Conversational,
    /// Output could not be decoded as an intent.
    Unparseable,
    /// Decoded, but the action is not in the catalog.
    UnknownAction,
}

/// Terminal chat reply; no executor runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFallback {
    pub message: String,
    pub reason: FallbackReason,
}

impl ChatFallback {
    pub fn new(message: impl Into<String>, reason: FallbackReason) -> Self {
        Self {
            message: message.into(),
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionIntent {
    pub kind: ActionKind,
    pub parameters: Map<String, Value>,
    pub thought: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedIntent {
    Action(ActionIntent),
    Chat(ChatFallback),
}

pub trait IntentParser: Send + Sync {
    /// Only collaborator failures are errors; bad output degrades to `Chat`.
    fn parse(&self, message: &str, context: &IntentContext<'_>) -> Result<ParsedIntent, ModelError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Language-model backed parser.
pub struct ModelIntentParser {
    model: Arc<dyn LanguageModel>,
}

impl ModelIntentParser {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl IntentParser for ModelIntentParser {
    fn parse(&self, message: &str, context: &IntentContext<'_>) -> Result<ParsedIntent, ModelError> {
        let raw = self.model.complete(&intent_prompt(message, context))?;
        Ok(interpret_model_output(&raw))
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    action_input: Option<Value>,
}

/// Two-phase decode of model text: structured intent first, chat otherwise.
pub fn interpret_model_output(raw: &str) -> ParsedIntent {
    let body = strip_code_fence(raw);
    let decoded = serde_json::from_str::<RawIntent>(body).or_else(|first_err| {
        outermost_object(body)
            .ok_or(first_err)
            .and_then(serde_json::from_str::<RawIntent>)
    });

    let intent = match decoded {
        Ok(intent) => intent,
        Err(err) => {
            warn!(
                "event=intent_parse module=agent status=error reason=unparseable chars={} error={}",
                raw.chars().count(),
                sanitize_message(&err.to_string(), 120)
            );
            return ParsedIntent::Chat(ChatFallback::new(
                format!(
                    "{UNPARSEABLE_REPLY} Raw response: {}",
                    truncate_chars(raw.trim(), MAX_RAW_ECHO_CHARS)
                ),
                FallbackReason::Unparseable,
            ));
        }
    };

    let action = intent
        .action
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("respond");

    if is_chat_action(action) {
        let message = match &intent.action_input {
            Some(Value::String(text)) => Some(text.as_str()),
            Some(Value::Object(map)) => map.get("message").and_then(Value::as_str),
            _ => None,
        }
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_CHAT_REPLY);
        return ParsedIntent::Chat(ChatFallback::new(message, FallbackReason::Conversational));
    }

    let Some(kind) = ActionKind::from_name(action) else {
        warn!(
            "event=intent_parse module=agent status=error reason=unknown_action action={}",
            sanitize_message(action, 60)
        );
        return ParsedIntent::Chat(ChatFallback::new(
            format!("Unknown action: {action}"),
            FallbackReason::UnknownAction,
        ));
    };

    let parameters = match intent.action_input {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    debug!(
        "event=intent_parse module=agent status=ok action={} params={}",
        kind,
        parameters.len()
    );
    ParsedIntent::Action(ActionIntent {
        kind,
        parameters,
        thought: intent.thought,
    })
}

fn is_chat_action(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "respond" | "chat" | "reply" | "answer" | "final_answer"
    )
}

/// Inner text of a ```json (or bare ```) fence, else the trimmed input.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = if let Some((_, rest)) = trimmed.split_once("```json") {
        rest
    } else if let Some((_, rest)) = trimmed.split_once("```") {
        rest
    } else {
        return trimmed;
    };
    inner.split("```").next().unwrap_or(inner).trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    if value.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

pub const RULE_HELP: &str = "I can help with commands like:\n\
- create task <title> [in <project>] [for <person>] [due YYYY-MM-DD] [priority high|medium|low]\n\
- move <task> to todo|in-progress|done\n\
- show task <title>\n\
- list tasks [overdue|high-priority|mine]\n\
- search <words>\n\
- stats [project]\n\
- create project <name> / show project <name>\n\
- list users [role] / show user <name or email>\n\
- comment on <task>: <text>\n\
- add <person> to project <project>\n\
- notifications [unread]";

static HELP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:(?:help|hi|hello|hey)\b|\?$)").expect("valid regex"));
static CREATE_TASK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:create|add|new)\s+(?:a\s+)?task\s+(?:called\s+|named\s+|titled\s+)?(?P<rest>.+)$")
        .expect("valid regex")
});
static TASK_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?P<kw>in|for|due|priority)\s+").expect("valid regex")
});
static UPDATE_TASK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:move|mark|set|update)\s+(?:task\s+)?(?P<task>.+?)\s+(?:to|as)\s+(?P<status>todo|to do|in[ -]?progress|done|complete|completed)$",
    )
    .expect("valid regex")
});
static GET_TASK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:show|get|view)\s+task\s+(?P<task>.+)$").expect("valid regex")
});
static LIST_TASKS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:list|show)\s+(?:(?P<pre>overdue|high[ -]priority|my)\s+)?tasks(?:\s+(?P<post>overdue|high[ -]priority|mine))?$")
        .expect("valid regex")
});
static MY_TASKS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^my\s+tasks$").expect("valid regex"));
static SEARCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:search|find)\s+(?:tasks?\s+)?(?:for\s+)?(?P<query>.+)$").expect("valid regex")
});
static STATS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:project\s+)?stat(?:s|istics)(?:\s+(?:for\s+)?(?P<project>.+))?$")
        .expect("valid regex")
});
static CREATE_PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:create|add|new)\s+project\s+(?P<name>.+)$").expect("valid regex")
});
static GET_PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:show|get|view)\s+project\s+(?P<name>.+)$").expect("valid regex")
});
static LIST_USERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:list|show)\s+(?:(?P<pre>admin|manager|member)s?\s+)?users(?:\s+(?P<post>admin|manager|member)s?)?$")
        .expect("valid regex")
});
static GET_USER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:show|get|view|who\s+is)\s+(?:user\s+)?(?P<user>\S+@\S+|.+)$")
        .expect("valid regex")
});
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^comment\s+on\s+(?P<task>[^:]+):\s*(?P<content>.+)$").expect("valid regex")
});
static ADD_MEMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^add\s+(?P<user>.+?)\s+to\s+project\s+(?P<project>.+)$").expect("valid regex")
});
static NOTIFICATIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:show\s+|list\s+)?(?:my\s+)?(?P<unread>unread\s+)?notifications$")
        .expect("valid regex")
});

/// Keyword grammar used without a model, or when the model is unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleIntentParser;

impl IntentParser for RuleIntentParser {
    fn parse(&self, message: &str, _context: &IntentContext<'_>) -> Result<ParsedIntent, ModelError> {
        Ok(parse_rules(message))
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

fn action(kind: ActionKind, pairs: &[(&str, Option<&str>)]) -> ParsedIntent {
    let parameters = pairs
        .iter()
        .filter_map(|(key, value)| {
            value.map(|value| ((*key).to_string(), Value::String(unquote(value).to_string())))
        })
        .collect();
    ParsedIntent::Action(ActionIntent {
        kind,
        parameters,
        thought: Some("keyword rule".to_string()),
    })
}

fn unquote(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|ch| ch == '"' || ch == '\'')
        .trim()
}

fn parse_rules(message: &str) -> ParsedIntent {
    let text = message.trim().trim_end_matches(['.', '!']).trim();

    if text.is_empty() || HELP_RE.is_match(text) {
        return ParsedIntent::Chat(ChatFallback::new(RULE_HELP, FallbackReason::Conversational));
    }
    if let Some(caps) = CREATE_TASK_RE.captures(text) {
        return parse_create_task(&caps["rest"]);
    }
    if let Some(caps) = UPDATE_TASK_RE.captures(text) {
        return action(
            ActionKind::UpdateTask,
            &[
                ("task_title", Some(&caps["task"])),
                ("new_status", Some(&caps["status"])),
            ],
        );
    }
    if let Some(caps) = GET_TASK_RE.captures(text) {
        return action(ActionKind::GetTask, &[("task_identifier", Some(&caps["task"]))]);
    }
    if MY_TASKS_RE.is_match(text) {
        return action(ActionKind::ListTasks, &[("filter", Some("my-tasks"))]);
    }
    if let Some(caps) = LIST_TASKS_RE.captures(text) {
        let filter = caps
            .name("pre")
            .or_else(|| caps.name("post"))
            .map(|m| match m.as_str().to_ascii_lowercase().as_str() {
                "overdue" => "overdue",
                "my" | "mine" => "my-tasks",
                _ => "high-priority",
            })
            .unwrap_or("all");
        return action(ActionKind::ListTasks, &[("filter", Some(filter))]);
    }
    if let Some(caps) = SEARCH_RE.captures(text) {
        return action(ActionKind::SearchTasks, &[("query", Some(&caps["query"]))]);
    }
    if let Some(caps) = STATS_RE.captures(text) {
        return action(
            ActionKind::ProjectStats,
            &[("project_name", caps.name("project").map(|m| m.as_str()))],
        );
    }
    if let Some(caps) = CREATE_PROJECT_RE.captures(text) {
        return action(ActionKind::CreateProject, &[("name", Some(&caps["name"]))]);
    }
    if let Some(caps) = GET_PROJECT_RE.captures(text) {
        return action(ActionKind::GetProject, &[("project_name", Some(&caps["name"]))]);
    }
    if let Some(caps) = LIST_USERS_RE.captures(text) {
        let role = caps.name("pre").or_else(|| caps.name("post")).map(|m| m.as_str());
        return action(ActionKind::ListUsers, &[("role_filter", role)]);
    }
    if let Some(caps) = COMMENT_RE.captures(text) {
        return action(
            ActionKind::AddComment,
            &[
                ("task_title", Some(&caps["task"])),
                ("content", Some(&caps["content"])),
            ],
        );
    }
    if let Some(caps) = ADD_MEMBER_RE.captures(text) {
        return action(
            ActionKind::AddProjectMember,
            &[
                ("user_identifier", Some(&caps["user"])),
                ("project_name", Some(&caps["project"])),
            ],
        );
    }
    if let Some(caps) = NOTIFICATIONS_RE.captures(text) {
        let unread = caps.name("unread").map(|_| "true");
        return action(ActionKind::ListNotifications, &[("unread_only", unread)]);
    }
    if let Some(caps) = GET_USER_RE.captures(text) {
        return action(ActionKind::GetUser, &[("user_identifier", Some(&caps["user"]))]);
    }

    ParsedIntent::Chat(ChatFallback::new(
        format!("{DEFAULT_CHAT_REPLY} Type 'help' to see what I can do."),
        FallbackReason::Conversational,
    ))
}

/// `<title> [in <project>] [for <person>] [due <date>] [priority <level>]`.
///
/// A quoted title may contain clause keywords.
fn parse_create_task(rest: &str) -> ParsedIntent {
    let rest = rest.trim();
    let (title, clauses) = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => match rest[1..].find(quote) {
            Some(end) => (&rest[1..=end], &rest[end + 2..]),
            None => (rest, ""),
        },
        _ => match TASK_CLAUSE_RE.find(rest) {
            Some(first) => (&rest[..first.start()], &rest[first.start()..]),
            None => (rest, ""),
        },
    };

    let clauses = format!(" {}", clauses.trim());
    let mut project = None;
    let mut assignee = None;
    let mut due = None;
    let mut priority = None;
    let matches = TASK_CLAUSE_RE.captures_iter(&clauses).collect::<Vec<_>>();
    for (index, caps) in matches.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = matches
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(clauses.len(), |next| next.start());
        let value = clauses[whole.end()..end].trim();
        match caps["kw"].to_ascii_lowercase().as_str() {
            "in" => project = Some(value.trim_start_matches("project ").to_string()),
            "for" => assignee = Some(value.to_string()),
            "due" => due = Some(value.to_string()),
            _ => priority = Some(value.to_string()),
        }
    }

    action(
        ActionKind::CreateTask,
        &[
            ("title", Some(title)),
            ("project_name", project.as_deref()),
            ("assignee_name", assignee.as_deref()),
            ("due_date", due.as_deref()),
            ("priority", priority.as_deref()),
        ],
    )
}
