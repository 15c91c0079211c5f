use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{ChatMessage, Conversation};

/// Lado desde el que un usuario participa en un hilo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChatSide {
    Client,
    Trainer,
}

/// Vista de un hilo para el listado: contraparte + no leídos.
#[derive(Debug, sqlx::FromRow)]
pub struct ConversationPreview {
    pub id: i32,
    pub counterpart_name: String,
    pub unread: i32,
}

/// Busca o crea el hilo entre un cliente y un entrenador.
pub async fn open_conversation(
    pool: &PgPool,
    client_id: i32,
    trainer_id: i32,
) -> Result<Conversation, AppError> {
    let conversation = sqlx::query_as::<_, Conversation>(
        "INSERT INTO conversations (client_id, trainer_id)
         VALUES ($1, $2)
         ON CONFLICT (client_id, trainer_id)
         DO UPDATE SET client_id = EXCLUDED.client_id
         RETURNING id, client_id, trainer_id, client_unread, trainer_unread, last_message_at",
    )
    .bind(client_id)
    .bind(trainer_id)
    .fetch_one(pool)
    .await?;

    Ok(conversation)
}

pub async fn find_conversation(
    pool: &PgPool,
    conversation_id: i32,
) -> Result<Option<Conversation>, AppError> {
    let conversation = sqlx::query_as::<_, Conversation>(
        "SELECT id, client_id, trainer_id, client_unread, trainer_unread, last_message_at
         FROM conversations WHERE id = $1",
    )
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;
    Ok(conversation)
}

/// Hilos de un usuario según su lado, los más recientes primero.
pub async fn list_conversations(
    pool: &PgPool,
    user_id: i32,
    side: ChatSide,
) -> Result<Vec<ConversationPreview>, AppError> {
    let sql = match side {
        ChatSide::Client => {
            "SELECT c.id, u.name as counterpart_name, c.client_unread as unread
             FROM conversations c
             JOIN users u ON u.id = c.trainer_id
             WHERE c.client_id = $1
             ORDER BY c.last_message_at DESC"
        }
        ChatSide::Trainer => {
            "SELECT c.id, u.name as counterpart_name, c.trainer_unread as unread
             FROM conversations c
             JOIN users u ON u.id = c.client_id
             WHERE c.trainer_id = $1
             ORDER BY c.last_message_at DESC"
        }
    };

    let previews = sqlx::query_as::<_, ConversationPreview>(sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(previews)
}

/// Últimos mensajes del hilo en orden cronológico.
pub async fn recent_messages(
    pool: &PgPool,
    conversation_id: i32,
    limit: i64,
) -> Result<Vec<ChatMessage>, AppError> {
    let mut messages = sqlx::query_as::<_, ChatMessage>(
        "SELECT id, conversation_id, sender_id, body, sent_at
         FROM messages
         WHERE conversation_id = $1
         ORDER BY sent_at DESC
         LIMIT $2",
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Guarda un mensaje y sube el contador de no leídos del otro lado.
/// Dos escrituras independientes, sin transacción.
pub async fn store_message(
    pool: &PgPool,
    conversation_id: i32,
    sender_side: ChatSide,
    sender_id: i32,
    body: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO messages (conversation_id, sender_id, body) VALUES ($1, $2, $3)",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(body)
    .execute(pool)
    .await?;

    let bump = match sender_side {
        ChatSide::Client => {
            "UPDATE conversations
             SET trainer_unread = trainer_unread + 1, last_message_at = CURRENT_TIMESTAMP
             WHERE id = $1"
        }
        ChatSide::Trainer => {
            "UPDATE conversations
             SET client_unread = client_unread + 1, last_message_at = CURRENT_TIMESTAMP
             WHERE id = $1"
        }
    };
    sqlx::query(bump).bind(conversation_id).execute(pool).await?;

    Ok(())
}

/// Pone en cero el contador del lado que abre el hilo.
pub async fn mark_read(
    pool: &PgPool,
    conversation_id: i32,
    side: ChatSide,
) -> Result<(), AppError> {
    let sql = match side {
        ChatSide::Client => "UPDATE conversations SET client_unread = 0 WHERE id = $1",
        ChatSide::Trainer => "UPDATE conversations SET trainer_unread = 0 WHERE id = $1",
    };
    sqlx::query(sql).bind(conversation_id).execute(pool).await?;
    Ok(())
}

/// Recorte para el listado de hilos.
pub fn preview_text(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let cut: String = body.chars().take(max_chars).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_bodies() {
        assert_eq!(preview_text("hola", 20), "hola");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview_text("¿entrenamos mañana temprano?", 10), "¿entrenamo…");
    }
}
