use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const GREETING: &str = "Hi! I'm your AI Safety Assistant. I'm here 24/7 to help with safety advice, emergency guidance, or just to chat if you need support. How can I help you today?";

/// Canned safety guidance, picked by keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantReply {
    Emergency,
    Unsafe,
    Walking,
    Home,
    Help,
}

impl AssistantReply {
    pub fn text(&self) -> &'static str {
        match self {
            AssistantReply::Emergency => "If this is an immediate emergency, please call 911 or your local emergency services. I can also help you alert your emergency contacts. Would you like me to do that?",
            AssistantReply::Unsafe => "I understand you're feeling unsafe. Here are some immediate steps: 1) Move to a well-lit, public area 2) Call someone you trust 3) Use the emergency button if needed. Can you tell me more about your situation?",
            AssistantReply::Walking => "For safe walking: 1) Stay in well-lit areas 2) Keep your phone charged 3) Share your route with someone 4) Trust your instincts. Would you like me to help you find the safest route?",
            AssistantReply::Home => "To stay safe at home: 1) Keep doors and windows locked 2) Don't open the door for strangers 3) Have a safety plan 4) Keep emergency numbers handy. Is there something specific you're concerned about?",
            AssistantReply::Help => "I can help with: Safety tips, Emergency planning, Route guidance, Connecting with your trust network, General safety advice. What would you like to know more about?",
        }
    }
}

const REPLY_KEYWORDS: &[(AssistantReply, &[&str])] = &[
    (AssistantReply::Emergency, &["emergency", "help", "danger"]),
    (AssistantReply::Unsafe, &["unsafe", "scared", "afraid"]),
    (AssistantReply::Walking, &["walking", "street", "route"]),
    (AssistantReply::Home, &["home", "house"]),
];

/// First keyword group that matches wins; `Help` otherwise
pub fn respond(input: &str) -> AssistantReply {
    let input = input.to_lowercase();
    REPLY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| input.contains(k)))
        .map(|(reply, _)| *reply)
        .unwrap_or(AssistantReply::Help)
}

/// Seam for swapping the keyword matcher for a real inference backend
#[async_trait]
pub trait SafetyAssistant: Send + Sync {
    async fn reply(&self, input: &str) -> String;
}

/// Keyword matcher with a simulated typing delay
pub struct KeywordAssistant {
    typing_delay: Duration,
}

impl KeywordAssistant {
    pub fn new(typing_delay: Duration) -> Self {
        Self { typing_delay }
    }
}

impl Default for KeywordAssistant {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

#[async_trait]
impl SafetyAssistant for KeywordAssistant {
    async fn reply(&self, input: &str) -> String {
        if !self.typing_delay.is_zero() {
            tokio::time::sleep(self.typing_delay).await;
        }
        let reply = respond(input);
        debug!("Assistant reply: {:?}", reply);
        reply.text().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: usize,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

/// Append-only conversation, seeded with the greeting
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        let mut log = Self {
            messages: Vec::new(),
        };
        log.push(GREETING.to_string(), Sender::Assistant);
        log
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append the user's message and the assistant's answer. Blank input is ignored.
    pub async fn send(
        &mut self,
        input: &str,
        assistant: &dyn SafetyAssistant,
    ) -> Option<&ChatMessage> {
        if input.trim().is_empty() {
            return None;
        }

        self.push(input.to_string(), Sender::User);
        let answer = assistant.reply(input).await;
        self.push(answer, Sender::Assistant);
        self.messages.last()
    }

    fn push(&mut self, text: String, sender: Sender) {
        self.messages.push(ChatMessage {
            id: self.messages.len() + 1,
            text,
            sender,
            timestamp: Utc::now(),
        });
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Spoken command recognized from a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCommand {
    Emergency,
    FakeCall,
    ShareLocation,
    SafeRoute,
    WakeWord,
    Unrecognized,
}

const VOICE_KEYWORDS: &[(VoiceCommand, &[&str])] = &[
    (VoiceCommand::Emergency, &["emergency", "help", "danger", "unsafe"]),
    (VoiceCommand::FakeCall, &["fake call", "exit", "get me out"]),
    (VoiceCommand::ShareLocation, &["share location", "send location"]),
    (VoiceCommand::SafeRoute, &["safe route", "get home", "navigate"]),
    (VoiceCommand::WakeWord, &["aura"]),
];

impl VoiceCommand {
    pub fn classify(transcript: &str) -> Self {
        let transcript = transcript.to_lowercase();
        VOICE_KEYWORDS
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| transcript.contains(p)))
            .map(|(command, _)| *command)
            .unwrap_or(VoiceCommand::Unrecognized)
    }

    /// What the assistant says back
    pub fn prompt(&self) -> &'static str {
        match self {
            VoiceCommand::Emergency => "Activating emergency protocol. Help is on the way.",
            VoiceCommand::FakeCall => "Starting fake call to help you exit safely.",
            VoiceCommand::ShareLocation => "Sharing your location with trusted contacts.",
            VoiceCommand::SafeRoute => "Finding the safest route for you.",
            VoiceCommand::WakeWord => "I'm here to help keep you safe. Say emergency, fake call, share location, or safe route.",
            VoiceCommand::Unrecognized => "I can help with emergency, fake call, share location, or safe route. What do you need?",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_respond_priority_order() {
        assert_eq!(respond("HELP me, I'm on the street"), AssistantReply::Emergency);
        assert_eq!(respond("I feel scared walking"), AssistantReply::Unsafe);
        assert_eq!(respond("best route home?"), AssistantReply::Walking);
        assert_eq!(respond("tips for my house"), AssistantReply::Home);
        assert_eq!(respond("hello there"), AssistantReply::Help);
    }

    #[test]
    fn test_voice_command_classification() {
        assert_eq!(VoiceCommand::classify("Danger!"), VoiceCommand::Emergency);
        assert_eq!(VoiceCommand::classify("get me out of here"), VoiceCommand::FakeCall);
        assert_eq!(VoiceCommand::classify("please send location"), VoiceCommand::ShareLocation);
        assert_eq!(VoiceCommand::classify("navigate to the station"), VoiceCommand::SafeRoute);
        assert_eq!(VoiceCommand::classify("hey aura"), VoiceCommand::WakeWord);
        assert_eq!(VoiceCommand::classify("what's the weather"), VoiceCommand::Unrecognized);
        assert!(VoiceCommand::Emergency.prompt().starts_with("Activating emergency"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_log_appends_reply() {
        let assistant = KeywordAssistant::default();
        let mut log = ChatLog::new();
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].text, GREETING);

        assert!(log.send("   ", &assistant).await.is_none());
        assert_eq!(log.messages().len(), 1);

        let reply = log.send("I'm afraid", &assistant).await.cloned().unwrap();
        assert_eq!(reply.sender, Sender::Assistant);
        assert_eq!(reply.text, AssistantReply::Unsafe.text());
        assert_eq!(reply.id, 3);
        assert_eq!(log.messages()[1].sender, Sender::User);
    }
}
