use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatLog {
    pub room_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub message_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub channel: ChatChannel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatChannel {
    Public, // daytime and lobby chat
    Wolf,   // werewolves at night
    System,
}

impl ChatLog {
    pub fn new(room_id: String) -> Self {
        ChatLog {
            room_id,
            messages: Vec::new(),
        }
    }

    /// Inserts keeping the feed ordered by `created_at`.
    pub fn add_message(&mut self, message: ChatMessage) {
        let at = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(at, message);
    }

    pub fn get_messages_by_channel(&self, channel: ChatChannel) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.channel == channel)
            .collect()
    }
}

impl ChatMessage {
    pub fn new(sender_id: String, sender_name: String, text: String, channel: ChatChannel) -> Self {
        ChatMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_id,
            sender_name,
            text,
            created_at: Utc::now(),
            channel,
        }
    }
}
