//! Context build: system prompt, then recent turns chronologically, then
//! the current user text (§4.4 "Context build").

use voxbridge_core::llm_types::{Message, Role};
use voxbridge_core::{Agent, Turn, TurnRole};

pub fn build_messages(agent: &Agent, context: &[Turn], user_text: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(context.len() + 2);

    if let Some(prompt) = &agent.llm.system_prompt {
        messages.push(Message::new(Role::System, prompt.clone()));
    }

    for turn in context {
        let role = match turn.role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        };
        messages.push(Message::new(role, turn.text.clone()));
    }

    messages.push(Message::new(Role::User, user_text.to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbridge_core::{LlmAgentConfig, LlmProviderTag, TtsAgentConfig};
    use uuid::Uuid;

    fn agent(system_prompt: Option<&str>) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "a".to_string(),
            llm: LlmAgentConfig {
                provider: LlmProviderTag::Cloud,
                model: "m".to_string(),
                temperature: 0.7,
                system_prompt: system_prompt.map(|s| s.to_string()),
                use_webhook: false,
            },
            tts: TtsAgentConfig::default(),
            plugins: Default::default(),
        }
    }

    #[test]
    fn builds_system_history_then_user() {
        let a = agent(Some("be helpful"));
        let history = vec![
            Turn::new(1, TurnRole::User, "hi"),
            Turn::new(2, TurnRole::Assistant, "hello"),
        ];

        let messages = build_messages(&a, &history, "how are you");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].content, "hello");
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[3].content, "how are you");
    }

    #[test]
    fn omits_system_message_when_agent_has_none() {
        let a = agent(None);
        let messages = build_messages(&a, &[], "hi");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }
}
