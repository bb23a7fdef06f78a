//! Prompt templates for the intent and narration model calls.

use super::action::ActionKind;
use super::intent::IntentContext;
use std::fmt::Write as _;

/// Instructs the model to answer with exactly one `{thought, action, action_input}` object.
pub fn intent_prompt(message: &str, context: &IntentContext<'_>) -> String {
    let mut catalog = String::new();
    for kind in ActionKind::ALL {
        let schema = kind.schema();
        let _ = writeln!(
            catalog,
            "- {}: {} Required: [{}]. Optional: [{}].",
            schema.name,
            schema.description,
            schema.required.join(", "),
            schema.optional.join(", ")
        );
    }

    format!(
        "You are a task management assistant for an organization workspace.\n\
         Current user: {name} (role: {role}). Today's date (UTC): {today}.\n\
         \n\
         Available tools:\n\
         {catalog}\
         - respond: Reply without using a tool. Required: [message].\n\
         \n\
         Rules:\n\
         - Choose exactly one tool.\n\
         - Dates use YYYY-MM-DD. Statuses: todo, in-progress, done. Priorities: high, medium, low.\n\
         - Leave optional parameters out when the user did not mention them.\n\
         \n\
         Answer with a single JSON object and nothing else:\n\
         {{\"thought\": \"...\", \"action\": \"<tool name>\", \"action_input\": {{ ... }}}}\n\
         \n\
         User request: {message}",
        name = context.display_name(),
        role = context.identity.role,
        today = context.now.format("%Y-%m-%d"),
    )
}

/// Asks the model to restate an action result conversationally.
pub fn narration_prompt(message: &str, action: ActionKind, result: &str) -> String {
    format!(
        "The user asked: {message}\n\
         The `{action}` tool returned:\n\
         {result}\n\
         \n\
         Reply to the user in a short, friendly paragraph. Keep every fact, name, \
         date and count from the tool result and do not invent new ones."
    )
}

#[cfg(test)]
mod tests {
    use super::{intent_prompt, narration_prompt};
    use crate::agent::action::ActionKind;
    use crate::agent::intent::IntentContext;
    use crate::model::tenant::{Identity, Role};
    use chrono::{TimeZone, Utc};

    #[test]
    fn intent_prompt_lists_every_action_and_the_date() {
        let identity = Identity::new(1, 1, Role::Manager);
        let context = IntentContext::new(&identity, Some("Ada"), Utc.with_ymd_and_hms(2030, 3, 4, 9, 0, 0).unwrap());
        let prompt = intent_prompt("list my tasks", &context);
        for kind in ActionKind::ALL {
            assert!(prompt.contains(kind.name()), "missing {kind}");
        }
        assert!(prompt.contains("2030-03-04"));
        assert!(prompt.contains("Ada (role: manager)"));
        assert!(prompt.ends_with("User request: list my tasks"));
    }

    #[test]
    fn narration_prompt_embeds_result() {
        let prompt = narration_prompt("stats?", ActionKind::ProjectStats, "Website: 2 todo");
        assert!(prompt.contains("`project_stats`"));
        assert!(prompt.contains("Website: 2 todo"));
    }
}
