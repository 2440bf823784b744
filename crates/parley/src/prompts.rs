// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use llm_contracts::{LLMError, LLMResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{AgentArchetype, ClientArchetype, Outcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub system_template: String,
    pub user_template: String,

    pub variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(
        name: impl Into<String>,
        system_template: impl Into<String>,
        user_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system_template: system_template.into(),
            user_template: user_template.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = variables.iter().map(|v| v.to_string()).collect();
        self
    }
}

pub type PromptContext = HashMap<String, Value>;

/// Builds a [`PromptContext`] from literal pairs.
pub fn context<I, K, V>(pairs: I) -> PromptContext
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub mod names {
    pub const CHARACTER_CLIENT: &str = "character_client";
    pub const CHARACTER_AGENT: &str = "character_agent";
    pub const CHARACTER_PARSER: &str = "character_parser";
    pub const STORY_WRITER: &str = "story_writer";
    pub const STORY_PARSER: &str = "story_parser";
    pub const SCENE_WRITER: &str = "scene_writer";
    pub const VOICE_WRITER: &str = "voice_writer";
    pub const SIMPLE_WRITER: &str = "simple_writer";
    pub const EMOTION_WRITER: &str = "emotion_writer";
    pub const EMOTION_PARSER: &str = "emotion_parser";
}

#[derive(Debug, Default, Clone)]
pub struct PromptBuilder {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialogue_templates() -> Self {
        let mut builder = Self::new();
        builder.add_dialogue_templates();
        builder
    }

    pub fn add_template(&mut self, template: PromptTemplate) -> &mut Self {
        self.templates.insert(template.name.clone(), template);
        self
    }

    pub fn get_template(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }

    pub fn list_templates(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    /// Renders `(system, user)` prompts for a template.
    pub fn build_prompt(
        &self,
        template_name: &str,
        context: &PromptContext,
    ) -> LLMResult<(String, String)> {
        self.validate_context(template_name, context)?;
        let template = self.template(template_name)?;

        let system_prompt = substitute_variables(&template.system_template, context);
        let user_prompt = substitute_variables(&template.user_template, context);

        debug!(
            template = template_name,
            variables = context.len(),
            "Built prompt"
        );
        Ok((system_prompt, user_prompt))
    }

    pub fn validate_context(&self, template_name: &str, context: &PromptContext) -> LLMResult<()> {
        let template = self.template(template_name)?;
        let missing: Vec<&String> = template
            .variables
            .iter()
            .filter(|var| !context.contains_key(*var))
            .collect();

        if !missing.is_empty() {
            return Err(LLMError::Configuration(format!(
                "Missing required variables for template '{template_name}': {missing:?}"
            )));
        }
        Ok(())
    }

    fn template(&self, name: &str) -> LLMResult<&PromptTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| LLMError::Configuration(format!("Template '{name}' not found")))
    }

    pub fn add_dialogue_templates(&mut self) {
        self.add_template(
            PromptTemplate::new(
                names::CHARACTER_CLIENT,
                "Write a 3-sentence customer character description.\nGive them a first name. Describe mood and why this issue matters personally.",
                "Archetype: {{client_archetype}}: {{archetype_hint}}\nIssue: {{topic}}\nStyle: {{style}}",
            )
            .with_variables(&["client_archetype", "archetype_hint", "topic", "style"]),
        );

        self.add_template(
            PromptTemplate::new(
                names::CHARACTER_AGENT,
                "Write a 2-sentence support agent character description.\nGive them a first name. Describe their current state of mind at work.",
                "Archetype: {{agent_archetype}}: {{archetype_hint}}",
            )
            .with_variables(&["agent_archetype", "archetype_hint"]),
        );

        self.add_template(
            PromptTemplate::new(
                names::CHARACTER_PARSER,
                "Extract character info from this text. Reply ONLY in JSON.\nNo explanation. No markdown. Just the JSON object.",
                r#"Text: {{prose}}
Extract exactly this structure:
{
  "name": "first name only",
  "mood": "one word",
  "personality": ["trait1", "trait2"],
  "backstory": "one sentence"
}"#,
            )
            .with_variables(&["prose"]),
        );

        self.add_template(
            PromptTemplate::new(
                names::STORY_WRITER,
                "Write a customer support chat dialogue.\nFormat every line as: Name: message\nWrite EXACTLY {{target_turns}} exchanges.\nOne exchange = one client line + one agent line.\nStop after {{target_turns}} exchanges. Do not add more.",
                r#"Topic: {{topic}}
Sector: {{sector}}

Client: {{client_name}}
Client type: {{client_hint}}
Client mood: {{client_mood}}
Client backstory: {{client_backstory}}

Agent: {{agent_name}}
Agent type: {{agent_hint}}

How this dialogue must end: {{outcome_instruction}}

{{twist_line}}
Emotional arc: {{emotional_arc}}

Write exactly {{target_turns}} exchanges now."#,
            )
            .with_variables(&[
                "target_turns",
                "topic",
                "sector",
                "client_name",
                "client_hint",
                "client_mood",
                "client_backstory",
                "agent_name",
                "agent_hint",
                "outcome_instruction",
                "twist_line",
                "emotional_arc",
            ]),
        );

        self.add_template(
            PromptTemplate::new(
                names::STORY_PARSER,
                "Parse this dialogue into JSON. Reply ONLY in JSON. No markdown.",
                r#"Dialogue:
{{raw_story}}

Client name is: {{client_name}}
Agent name is: {{agent_name}}

Extract array of messages. Turn numbering: each client+agent pair = same turn number.
[
  {"role": "client", "turn": 1, "content": "..."},
  {"role": "agent",  "turn": 1, "content": "..."},
  ...
]"#,
            )
            .with_variables(&["raw_story", "client_name", "agent_name"]),
        );

        self.add_template(
            PromptTemplate::new(
                names::SCENE_WRITER,
                "You are a dialogue director planning a customer support scene.\nWrite a scene plan for this support conversation.\nOutput ONLY valid JSON. No markdown. No explanation.",
                r#"Topic: {{topic}}
Sector: {{sector}}
Client: {{client_name}}, {{client_hint}}, mood: {{client_mood}}
Agent: {{agent_name}}, {{agent_hint}}
Outcome: {{outcome_instruction}}
Twist: {{twist_line}}
Emotional arc: {{emotional_arc}}
Total messages: {{n_messages}}

The {{n_messages}} messages must be distributed as:
{{message_plan}}

Plan {{n_scenes}} scenes. For expected_messages use ONLY the
words "client" or "agent". Never write actual dialogue text.

Return JSON:
{
  "scenes": [
    {
      "id": 1,
      "beat": "opening",
      "description": "what happens, director note only",
      "client_goal": "what client wants in this scene",
      "agent_goal": "what agent wants in this scene",
      "emotional_state": "client=frustrated(3), agent=steady(2)",
      "expected_messages": ["client", "agent"]
    }
  ]
}"#,
            )
            .with_variables(&[
                "topic",
                "sector",
                "client_name",
                "client_hint",
                "client_mood",
                "agent_name",
                "agent_hint",
                "outcome_instruction",
                "twist_line",
                "emotional_arc",
                "n_messages",
                "message_plan",
                "n_scenes",
            ]),
        );

        self.add_template(
            PromptTemplate::new(
                names::VOICE_WRITER,
                "You are voicing characters in a customer support chat.\nReply ONLY in English. Do not use any other language.\nFill in the dialogue template exactly.\nWrite ONLY the messages. Keep the numbering.\nDo NOT add or remove lines.\nOutput ONLY the filled template, nothing else.",
                r#"Scene: {{beat}}
What happens: {{description}}
Client goal: {{client_goal}}
Agent goal: {{agent_goal}}
Emotional state: {{emotional_state}}

Client: {{client_name}}, {{client_hint}}
Agent: {{agent_name}}, {{agent_hint}}

Fill in this template:
{{template}}

Rules:
- CLIENT messages: 1-2 sentences, can be emotional
- AGENT messages: MAX 1 sentence, 15 words or less (it's chat, not email)
- Stay in character
- Do NOT write Name: before the message, keep the numbering format"#,
            )
            .with_variables(&[
                "beat",
                "description",
                "client_goal",
                "agent_goal",
                "emotional_state",
                "client_name",
                "client_hint",
                "agent_name",
                "agent_hint",
                "template",
            ]),
        );

        self.add_template(
            PromptTemplate::new(
                names::SIMPLE_WRITER,
                "You write short customer support CHAT dialogues.\nReply ONLY in English.\nCLIENT: 1-2 sentences, can be emotional.\nAGENT: MAX 1 sentence, 15 words or less. Chat style, not email.\nFill in the template exactly.\nOutput ONLY the filled template, nothing else.\n\nFORBIDDEN phrases (NEVER use):\n- 'That, ' at start of any message\n- 'Bear with me'\n- 'Sorry, got another chat'\n- 'Let me check this for you'\nWrite naturally, each reply should be UNIQUE.",
                r#"Topic: {{topic}}
Sector: {{sector}}
{{persona_context}}Client style: {{style}}, {{client_hint}}
Agent type: {{agent_hint}}
Outcome: {{outcome_instruction}}
{{twist_line}}

Fill in:
{{template}}"#,
            )
            .with_variables(&[
                "topic",
                "sector",
                "persona_context",
                "style",
                "client_hint",
                "agent_hint",
                "outcome_instruction",
                "twist_line",
                "template",
            ]),
        );

        self.add_template(
            PromptTemplate::new(
                names::EMOTION_WRITER,
                "Analyze emotions in this support chat. Be brief.",
                r#"Dialogue:
{{dialogue_text}}

For each turn 1 to {{n_turns}}, output:
Turn N:
  client: [emotion] intensity [1-5]
  agent: composure=[steady|holding|slipping|lost] stress=[1-5]"#,
            )
            .with_variables(&["dialogue_text", "n_turns"]),
        );

        self.add_template(
            PromptTemplate::new(
                names::EMOTION_PARSER,
                "Parse this emotion analysis into JSON. Reply ONLY in JSON.",
                r#"Text:
{{prose}}

Extract:
{
  "turns": {
    "1": {
      "client_emotion": "frustrated",
      "client_intensity": 3,
      "agent_composure": "steady",
      "agent_stress": 2
    },
    ...
  }
}"#,
            )
            .with_variables(&["prose"]),
        );
    }
}

fn substitute_variables(template: &str, context: &PromptContext) -> String {
    let mut result = template.to_string();

    for (key, value) in context {
        let placeholder = format!("{{{{{key}}}}}");
        result = result.replace(&placeholder, &value_to_string(value));
    }

    if result.contains("{{") && result.contains("}}") {
        warn!("Template contains unsubstituted placeholders: {}", result);
    }
    result
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "invalid_json".to_string())
        }
    }
}

pub fn client_hint(archetype: ClientArchetype) -> &'static str {
    match archetype {
        ClientArchetype::Karen => "Entitled customer who demands to speak to a manager, frequently invokes 'rights' and threatens consequences.",
        ClientArchetype::AngryVeteran => "Long-time customer who remembers 'how things used to be' and is deeply disappointed with current service.",
        ClientArchetype::ElderlyConfused => "Older person who struggles with technology and support processes, easily overwhelmed, needs patient guidance.",
        ClientArchetype::TechConfused => "Non-technical person who misunderstands terminology and describes issues in non-standard ways.",
        ClientArchetype::YoungProfessional => "Busy, efficiency-focused person who is polite but clearly impatient; wants fast resolution.",
        ClientArchetype::SelfInflicted => "Customer whose problem was caused by their own actions but who doesn't realize or won't admit it.",
        ClientArchetype::Conspirologist => "Believes the company is deliberately causing problems, scamming customers, or hiding information.",
        ClientArchetype::Grieving => "Going through a personal crisis (bereavement, illness, job loss) that makes the support issue feel unbearable.",
        ClientArchetype::WrongDepartment => "Has reached entirely the wrong support team; their issue belongs elsewhere.",
        ClientArchetype::CallingBluff => "Customer who threatens to cancel or escalate or sue but doesn't really intend to follow through.",
        ClientArchetype::EntitledParent => "Parent who insists their child's account or activity should be given special treatment.",
    }
}

pub fn agent_hint(archetype: AgentArchetype) -> &'static str {
    match archetype {
        AgentArchetype::VeteranTired => "Has seen everything, mildly cynical, still professional but barely concealing boredom.",
        AgentArchetype::BurnedOut => "Emotionally depleted, responses are mechanical and minimal, on the edge of quitting.",
        AgentArchetype::HandsTied => "Wants to help but is blocked by policy, system limitations, or authorization levels.",
        AgentArchetype::EagerHelper => "Enthusiastic and genuinely wants to solve the problem; sometimes over-explains.",
        AgentArchetype::ByTheBook => "Follows procedure exactly, sometimes frustratingly rigid, never bends rules.",
        AgentArchetype::NewbieOverwhelmed => "New to the job, unsure of themselves, double-checks everything, occasionally makes mistakes.",
        AgentArchetype::StressedMultitask => "Handling multiple chats simultaneously, occasionally mixes up contexts or has slow response times.",
    }
}

pub fn outcome_instruction(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::ResolvedQuick => "The issue is resolved efficiently within a few turns. Customer ends satisfied.",
        Outcome::ResolvedNeutral => "The issue is resolved but after some friction. Customer is okay but not delighted.",
        Outcome::UnresolvedPassive => "The issue is NOT resolved. Customer gives up politely and ends the chat without satisfaction.",
        Outcome::UnresolvedRagequit => "The issue is NOT resolved. Customer becomes increasingly angry and abruptly ends the conversation.",
        Outcome::Conflict => "The conversation escalates into direct conflict. Neither party is fully satisfied at the end.",
        Outcome::InfoOnly => "The customer only needed information. No transaction or fix required. Ends with clarification.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_dialogue_templates_registered() {
        let builder = PromptBuilder::with_dialogue_templates();
        assert_eq!(builder.list_templates().len(), 10);
        assert!(builder.get_template(names::VOICE_WRITER).is_some());
    }

    #[test]
    fn test_build_prompt_substitutes() {
        let builder = PromptBuilder::with_dialogue_templates();
        let ctx = context([
            ("agent_archetype", json!("burned_out")),
            ("archetype_hint", json!(agent_hint(AgentArchetype::BurnedOut))),
        ]);
        let (system, user) = builder.build_prompt(names::CHARACTER_AGENT, &ctx).unwrap();
        assert!(system.contains("support agent"));
        assert!(user.starts_with("Archetype: burned_out: Emotionally depleted"));
        assert!(!user.contains("{{"));
    }

    #[test]
    fn test_numbers_render_plainly() {
        let builder = PromptBuilder::with_dialogue_templates();
        let ctx = context([("dialogue_text", json!("[Turn 1] Client: hi")), ("n_turns", json!(4))]);
        let (_, user) = builder.build_prompt(names::EMOTION_WRITER, &ctx).unwrap();
        assert!(user.contains("turn 1 to 4"));
    }

    #[test]
    fn test_missing_variables_rejected() {
        let builder = PromptBuilder::with_dialogue_templates();
        let err = builder
            .build_prompt(names::STORY_PARSER, &PromptContext::new())
            .unwrap_err();
        assert!(matches!(err, LLMError::Configuration(_)));
        assert!(builder.build_prompt("nope", &PromptContext::new()).is_err());
    }

    #[test]
    fn test_every_archetype_has_a_hint() {
        for a in ClientArchetype::ALL {
            assert!(!client_hint(*a).is_empty());
        }
        for a in AgentArchetype::ALL {
            assert!(!agent_hint(*a).is_empty());
        }
        for o in Outcome::ALL {
            assert!(!outcome_instruction(*o).is_empty());
        }
    }
}
