use chrono::Local;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, Message, ReplyMarkup},
};

use crate::error::AppError;
use crate::reviews;
use crate::stats;

use super::{nav_row, notify_user, paginate, parse_id, AppState, UserSession, UserType};

const REVIEWS_PER_PAGE: usize = 5;

pub async fn handle_text(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    _session: &mut UserSession,
) -> Result<(), AppError> {
    match text {
        "🧑‍🏫 Solicitudes" => show_applications(bot, chat_id, state).await,
        "⭐ Reseñas" => show_reviews(bot, chat_id, state, 0, None).await,
        "📊 Estadísticas" => show_platform_stats(bot, chat_id, state).await,
        _ => {
            bot.send_message(chat_id, "Usa los botones del panel").await?;
            Ok(())
        }
    }
}

// ---------- solicitudes de entrenadores ----------

async fn show_applications(bot: Bot, chat_id: ChatId, state: &AppState) -> Result<(), AppError> {
    let pending = sqlx::query_as::<_, (i32, String)>(
        "SELECT id, name FROM users WHERE role = 'trainer' AND NOT approved ORDER BY id",
    )
    .fetch_all(&state.pool)
    .await?;

    if pending.is_empty() {
        bot.send_message(chat_id, "No hay solicitudes pendientes 👌").await?;
        return Ok(());
    }

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for (user_id, name) in &pending {
        keyboard.push(vec![
            InlineKeyboardButton::callback(name.clone(), "ignore".to_string()),
            InlineKeyboardButton::callback("✅".to_string(), format!("adm_approve:{}", user_id)),
            InlineKeyboardButton::callback("❌".to_string(), format!("adm_reject:{}", user_id)),
        ]);
    }

    bot.send_message(chat_id, "🧑‍🏫 Solicitudes de entrenadores pendientes:")
        .reply_markup(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(keyboard)))
        .await?;
    Ok(())
}

async fn approve_trainer(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i32,
) -> Result<(), AppError> {
    let updated = sqlx::query(
        "UPDATE users SET approved = TRUE WHERE id = $1 AND role = 'trainer' AND NOT approved",
    )
    .bind(user_id)
    .execute(&state.pool)
    .await?;

    if updated.rows_affected() == 0 {
        bot.send_message(chat_id, "Esa solicitud ya fue atendida").await?;
        return Ok(());
    }

    info!("entrenador {} aprobado", user_id);
    notify_user(
        &bot,
        &state.pool,
        user_id,
        "🎉 ¡Tu solicitud fue aprobada! Escribe /start para configurar tu perfil y tu disponibilidad.",
        None,
    )
    .await;
    bot.send_message(chat_id, "✅ Entrenador aprobado").await?;
    Ok(())
}

async fn reject_trainer(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i32,
) -> Result<(), AppError> {
    // avisar antes de borrar, después ya no hay telegram_id que consultar
    notify_user(
        &bot,
        &state.pool,
        user_id,
        "Lo sentimos, tu solicitud de entrenador fue rechazada 😔",
        None,
    )
    .await;

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1 AND role = 'trainer' AND NOT approved")
        .bind(user_id)
        .execute(&state.pool)
        .await?;

    if deleted.rows_affected() == 0 {
        bot.send_message(chat_id, "Esa solicitud ya fue atendida").await?;
        return Ok(());
    }

    info!("solicitud de entrenador {} rechazada", user_id);
    bot.send_message(chat_id, "❌ Solicitud rechazada").await?;
    Ok(())
}

// ---------- moderación de reseñas ----------

async fn show_reviews(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    page: usize,
    edit: Option<&Message>,
) -> Result<(), AppError> {
    let total = reviews::count_reviews(&state.pool).await? as usize;
    if total == 0 {
        bot.send_message(chat_id, "No hay reseñas todavía").await?;
        return Ok(());
    }

    let (start_idx, _end_idx, total_pages) = paginate(total, page, REVIEWS_PER_PAGE);
    let listed = reviews::recent_reviews(
        &state.pool,
        REVIEWS_PER_PAGE as i64,
        start_idx as i64,
    )
    .await?;

    let mut text = String::from("⭐ Reseñas recientes:\n\n");
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for review in &listed {
        let comment = review.comment.as_deref().unwrap_or("(sin comentario)");
        text.push_str(&format!(
            "#{} {} — {} sobre {}\n{}\n\n",
            review.id,
            reviews::stars(review.rating),
            review.client_name,
            review.trainer_name,
            comment,
        ));
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("🗑 Borrar #{}", review.id),
            format!("adm_delrev:{}", review.id),
        )]);
    }

    if total_pages > 1 {
        keyboard.push(nav_row("adm_reviews", page, total_pages));
    }

    let keyboard = InlineKeyboardMarkup::new(keyboard);
    match edit {
        Some(msg) => {
            bot.edit_message_text(chat_id, msg.id, text)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text)
                .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
                .await?;
        }
    }
    Ok(())
}

async fn delete_review(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    review_id: i32,
) -> Result<(), AppError> {
    if reviews::delete_review(&state.pool, review_id).await? {
        info!("reseña {} eliminada por moderación", review_id);
        bot.send_message(chat_id, format!("🗑 Reseña #{} eliminada", review_id))
            .await?;
    } else {
        bot.send_message(chat_id, "Esa reseña ya no existe").await?;
    }
    Ok(())
}

// ---------- estadísticas ----------

async fn show_platform_stats(bot: Bot, chat_id: ChatId, state: &AppState) -> Result<(), AppError> {
    let bookings = stats::all_bookings(&state.pool).await?;
    let payments = stats::all_payments(&state.pool).await?;
    let signups = stats::all_signups(&state.pool).await?;

    let today = Local::now().date_naive();
    let (current_from, current_to) = stats::month_bounds(today);
    let (previous_from, previous_to) = stats::previous_month_bounds(today);

    let current =
        stats::reduce_platform_month(&bookings, &payments, &signups, current_from, current_to);
    let previous =
        stats::reduce_platform_month(&bookings, &payments, &signups, previous_from, previous_to);

    bot.send_message(chat_id, stats::platform_stats_text(&current, &previous))
        .parse_mode(teloxide::types::ParseMode::Markdown)
        .await?;
    Ok(())
}

pub async fn handle_callback(
    bot: Bot,
    msg: &Message,
    data: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<bool, AppError> {
    if session.user_type != UserType::Admin {
        return Ok(false);
    }
    let chat_id = msg.chat.id;

    match data {
        _ if data.starts_with("adm_approve:") => {
            if let Some(user_id) = parse_id(data) {
                approve_trainer(bot, chat_id, state, user_id).await?;
            }
        }
        _ if data.starts_with("adm_reject:") => {
            if let Some(user_id) = parse_id(data) {
                reject_trainer(bot, chat_id, state, user_id).await?;
            }
        }
        _ if data.starts_with("adm_delrev:") => {
            if let Some(review_id) = parse_id(data) {
                delete_review(bot, chat_id, state, review_id).await?;
            }
        }
        _ if data.starts_with("adm_reviews:") => {
            if let Some(page) = data.split(':').nth(1).and_then(|raw| raw.parse::<usize>().ok()) {
                show_reviews(bot, chat_id, state, page, Some(msg)).await?;
            }
        }
        _ => return Ok(false),
    }

    Ok(true)
}
