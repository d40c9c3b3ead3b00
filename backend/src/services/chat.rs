//! Advisor chat backed by the generative-language model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::prompt::chat_system_instruction;
use shared::{ChatMessage, ChatRole};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::AdvisorConfig;
use crate::error::{AppError, AppResult};
use crate::external::gemini::{Content, GenerateRequest};
use crate::external::GeminiClient;
use crate::services::events::FarmEventBus;
use crate::services::farm::FarmService;
use crate::services::profile::ProfileService;

pub const HISTORY_DEFAULT: u32 = 50;
pub const HISTORY_MAX: u32 = 200;

/// Chat service
#[derive(Clone)]
pub struct ChatService {
    db: PgPool,
    gemini: GeminiClient,
    profiles: ProfileService,
    farms: FarmService,
    context_limit: i64,
}

/// A message from the grower
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageInput {
    #[validate(custom = "crate::validation::chat_message")]
    pub message: String,
}

/// Both sides of one exchange
#[derive(Debug, Serialize)]
pub struct ChatExchange {
    pub message: ChatMessage,
    pub reply: ChatMessage,
}

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChatRow> for ChatMessage {
    type Error = AppError;

    fn try_from(row: ChatRow) -> AppResult<Self> {
        Ok(ChatMessage {
            id: row.id,
            role: row.role.parse::<ChatRole>().map_err(AppError::Internal)?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

/// Previous turns followed by the new user message
fn conversation(history: &[ChatMessage], text: &str) -> Vec<Content> {
    history
        .iter()
        .map(|m| match m.role {
            ChatRole::User => Content::user(m.content.clone()),
            ChatRole::Model => Content::model(m.content.clone()),
        })
        .chain(std::iter::once(Content::user(text)))
        .collect()
}

impl ChatService {
    /// Create a new ChatService instance
    pub fn new(db: PgPool, events: FarmEventBus, gemini: GeminiClient, config: &AdvisorConfig) -> Self {
        Self {
            profiles: ProfileService::new(db.clone()),
            farms: FarmService::new(db.clone(), events),
            db,
            gemini,
            context_limit: config.chat_history_limit,
        }
    }

    /// Send a message and store the exchange once the model has answered
    pub async fn send_message(&self, user_id: Uuid, input: SendMessageInput) -> AppResult<ChatExchange> {
        input.validate()?;
        let text = input.message.trim();

        let history = self.recent(user_id, self.context_limit).await?;
        let profile = self.profiles.get_profile(user_id).await?.complete().ok();
        let farms = self.farms.summaries(user_id).await?;

        let request = GenerateRequest {
            system_instruction: Some(chat_system_instruction(profile.as_ref(), &farms)),
            contents: conversation(&history, text),
            ..Default::default()
        };

        let reply = self.gemini.generate(&request).await?;

        let mut tx = self.db.begin().await?;
        let mut stored = Vec::with_capacity(2);
        for (role, content) in [(ChatRole::User, text), (ChatRole::Model, reply.trim())] {
            let row = sqlx::query_as::<_, ChatRow>(
                r#"
                INSERT INTO chat_messages (user_id, role, content)
                VALUES ($1, $2, $3)
                RETURNING id, role, content, created_at
                "#,
            )
            .bind(user_id)
            .bind(role.as_str())
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(ChatMessage::try_from(row)?);
        }
        tx.commit().await?;

        tracing::debug!(user_id = %user_id, context = history.len(), "Answered chat message");

        let reply = stored.pop();
        let message = stored.pop();
        match (message, reply) {
            (Some(message), Some(reply)) => Ok(ChatExchange { message, reply }),
            _ => Err(AppError::Internal("Chat exchange was not stored".to_string())),
        }
    }

    /// Most recent messages, oldest first
    pub async fn history(&self, user_id: Uuid, limit: u32) -> AppResult<Vec<ChatMessage>> {
        self.recent(user_id, i64::from(limit)).await
    }

    async fn recent(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, role, content, created_at FROM (
                SELECT id, role, content, created_at
                FROM chat_messages
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    /// Delete the whole conversation
    pub async fn clear_history(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = %user_id, deleted = result.rows_affected(), "Cleared chat history");
        Ok(result.rows_affected())
    }
}
