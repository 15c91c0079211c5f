use chrono::Local;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, Message, ReplyMarkup},
};
use url::Url;

use crate::bookings;
use crate::error::AppError;
use crate::messaging::{self, ChatSide};
use crate::models::{BookingInfo, BookingStatus};
use crate::slots;
use crate::stats;

use super::{
    booking_block, find_trainer_profile, nav_row, notify_user, open_chat, paginate, parse_id,
    show_conversations, show_trainer_menu, AppState, UserSession, UserStep, UserType,
};

const SESSIONS_PER_PAGE: usize = 3;

const WEEKDAY_NAMES: [&str; 7] = [
    "Lunes", "Martes", "Miércoles", "Jueves", "Viernes", "Sábado", "Domingo",
];

pub async fn handle_text(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    if !session.approved {
        bot.send_message(
            chat_id,
            "Tu solicitud de entrenador sigue en revisión. Te avisamos en cuanto haya respuesta 🙌",
        )
        .await?;
        return Ok(());
    }

    match session.step {
        UserStep::TrainerEditMenu => return edit_menu_text(bot, chat_id, text, session).await,
        UserStep::TrainerEditBio => {
            return save_bio(bot, chat_id, text, state, session).await;
        }
        UserStep::TrainerEditSpecialties => {
            return save_specialties(bot, chat_id, text, state, session).await;
        }
        UserStep::TrainerEditPrice => {
            return save_price(bot, chat_id, text, state, session).await;
        }
        UserStep::TrainerEditPortfolio => {
            return save_portfolio(bot, chat_id, text, state, session).await;
        }
        UserStep::TrainerSetWindow => {
            return save_window(bot, chat_id, text, state, session).await;
        }
        _ => {}
    }

    match text {
        "📅 Mi agenda" => show_sessions(bot, chat_id, state, session, true, 0, None).await,
        "📋 Mis sesiones" => show_sessions(bot, chat_id, state, session, false, 0, None).await,
        "🕒 Mi disponibilidad" => show_availability(bot, chat_id, state, session).await,
        "✏️ Editar perfil" => {
            session.step = UserStep::TrainerEditMenu;
            show_edit_menu(bot, chat_id).await
        }
        "📊 Estadísticas" => show_stats(bot, chat_id, state, session).await,
        "💬 Mensajes" => {
            let user_id = match session.user_id {
                Some(id) => id,
                None => return Ok(()),
            };
            show_conversations(bot, chat_id, state, user_id, ChatSide::Trainer).await
        }
        _ => {
            bot.send_message(chat_id, "No entendí eso 🤔 Usa los botones del menú")
                .await?;
            Ok(())
        }
    }
}

// ---------- sesiones ----------

fn session_buttons(info: &BookingInfo) -> Vec<InlineKeyboardButton> {
    let mut row = vec![InlineKeyboardButton::callback(
        format!("🔢 #{}", info.id),
        "ignore".to_string(),
    )];
    match info.status.as_str() {
        "pending" => {
            row.push(InlineKeyboardButton::callback(
                "✅ Confirmar".to_string(),
                format!("tr_confirm:{}", info.id),
            ));
            row.push(InlineKeyboardButton::callback(
                "❌ Rechazar".to_string(),
                format!("tr_decline:{}", info.id),
            ));
        }
        "confirmed" => {
            row.push(InlineKeyboardButton::callback(
                "🏁 Completar".to_string(),
                format!("tr_complete:{}", info.id),
            ));
            row.push(InlineKeyboardButton::callback(
                "❌ Cancelar".to_string(),
                format!("tr_cancel:{}", info.id),
            ));
        }
        _ => {}
    }
    row.push(InlineKeyboardButton::callback(
        "💬 Chat".to_string(),
        format!("tr_chat:{}", info.client_id),
    ));
    row
}

async fn show_sessions(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
    upcoming_only: bool,
    page: usize,
    edit: Option<&Message>,
) -> Result<(), AppError> {
    let trainer_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let all = bookings::for_trainer(&state.pool, trainer_id, upcoming_only).await?;
    if all.is_empty() {
        let text = if upcoming_only {
            "No tienes sesiones próximas"
        } else {
            "Todavía no tienes sesiones"
        };
        match edit {
            Some(msg) => {
                bot.edit_message_text(chat_id, msg.id, text).await?;
            }
            None => {
                bot.send_message(chat_id, text).await?;
            }
        }
        return Ok(());
    }

    let (start_idx, end_idx, total_pages) = paginate(all.len(), page, SESSIONS_PER_PAGE);
    let page_bookings = &all[start_idx..end_idx];

    let mut text = if upcoming_only {
        String::from("📅 Próximas sesiones:\n\n")
    } else {
        String::from("📋 Todas tus sesiones:\n\n")
    };
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for info in page_bookings {
        text.push_str(&booking_block(info, false));
        keyboard.push(session_buttons(info));
    }

    if total_pages > 1 {
        let prefix = if upcoming_only { "tr_up_page" } else { "tr_page" };
        keyboard.push(nav_row(prefix, page, total_pages));
    }

    let keyboard = InlineKeyboardMarkup::new(keyboard);
    match edit {
        Some(msg) => {
            bot.edit_message_text(chat_id, msg.id, text)
                .parse_mode(teloxide::types::ParseMode::Markdown)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text)
                .parse_mode(teloxide::types::ParseMode::Markdown)
                .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
                .await?;
        }
    }
    Ok(())
}

/// Transición de estado disparada por el entrenador, con aviso al cliente.
async fn transition_booking(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
    booking_id: i32,
    from: &[&str],
    to: &str,
    client_note: &str,
    trainer_note: String,
    review_prompt: bool,
) -> Result<(), AppError> {
    let info = match bookings::find_info(&state.pool, booking_id).await? {
        Some(info) => info,
        None => return Ok(()),
    };
    if session.user_id != Some(info.trainer_id) {
        return Ok(());
    }
    if !from.contains(&info.status.as_str()) {
        bot.send_message(chat_id, "Esa reserva ya cambió de estado").await?;
        return Ok(());
    }

    bookings::set_status(&state.pool, booking_id, to).await?;
    info!("reserva {} pasó a {} por el entrenador {}", booking_id, to, info.trainer_id);

    let keyboard = if review_prompt {
        Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "⭐ Calificar la sesión",
            format!("review:{}", booking_id),
        )]]))
    } else {
        None
    };
    notify_user(&bot, &state.pool, info.client_id, client_note, keyboard).await;

    bot.send_message(chat_id, trainer_note).await?;
    Ok(())
}

// ---------- disponibilidad semanal ----------

async fn show_availability(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let trainer_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let windows = slots::weekly_windows(&state.pool, trainer_id).await?;

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for (weekday, window) in windows.iter().enumerate() {
        let label = match window {
            Some((start, end)) => format!(
                "{} · {}-{}",
                WEEKDAY_NAMES[weekday],
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
            None => format!("{} · descanso", WEEKDAY_NAMES[weekday]),
        };
        keyboard.push(vec![InlineKeyboardButton::callback(
            label,
            format!("win_day:{}", weekday),
        )]);
    }

    bot.send_message(
        chat_id,
        "🕒 Tu disponibilidad semanal. Toca un día para cambiar su horario.\n\nLas sesiones duran 60 min y la plataforma opera de 06:00 a 22:00.",
    )
    .reply_markup(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(keyboard)))
    .await?;
    Ok(())
}

async fn window_day_chosen(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let weekday = match parse_id(data) {
        Some(weekday) if (0..7).contains(&weekday) => weekday as i16,
        _ => return Ok(()),
    };

    let trainer_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };
    let windows = slots::weekly_windows(&state.pool, trainer_id).await?;
    let current = match windows[weekday as usize] {
        Some((start, end)) => format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")),
        None => "descanso".to_string(),
    };

    session.window_weekday = Some(weekday);
    session.step = UserStep::TrainerSetWindow;

    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🚫 Marcar como descanso",
        format!("win_clear:{}", weekday),
    )]]);
    bot.edit_message_text(
        msg.chat.id,
        msg.id,
        format!(
            "{}: ahora {}\n\nEnvía el nuevo horario en formato HH:MM-HH:MM (ej. 07:00-14:30), en medias horas, entre 06:00 y 22:00.",
            WEEKDAY_NAMES[weekday as usize], current
        ),
    )
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

async fn save_window(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let weekday = match session.window_weekday {
        Some(weekday) => weekday,
        None => {
            session.step = UserStep::TrainerMainMenu;
            return show_trainer_menu(bot, chat_id).await;
        }
    };
    let trainer_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let (work_start, work_end) = match slots::parse_window(text) {
        Some(window) => window,
        None => {
            bot.send_message(
                chat_id,
                "Formato no válido. Usa HH:MM-HH:MM en medias horas, dentro de 06:00-22:00 (ej. 09:00-17:30)",
            )
            .await?;
            return Ok(());
        }
    };

    sqlx::query(
        "INSERT INTO trainer_availability (trainer_id, weekday, work_start, work_end)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (trainer_id, weekday)
         DO UPDATE SET work_start = $3, work_end = $4",
    )
    .bind(trainer_id)
    .bind(weekday)
    .bind(work_start)
    .bind(work_end)
    .execute(&state.pool)
    .await?;

    session.window_weekday = None;
    session.step = UserStep::TrainerMainMenu;
    bot.send_message(
        chat_id,
        format!("Horario del {} guardado ✅", WEEKDAY_NAMES[weekday as usize]),
    )
    .await?;
    show_availability(bot, chat_id, state, session).await
}

async fn clear_window(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let weekday = match parse_id(data) {
        Some(weekday) if (0..7).contains(&weekday) => weekday as i16,
        _ => return Ok(()),
    };
    let trainer_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    sqlx::query("DELETE FROM trainer_availability WHERE trainer_id = $1 AND weekday = $2")
        .bind(trainer_id)
        .bind(weekday)
        .execute(&state.pool)
        .await?;

    session.window_weekday = None;
    session.step = UserStep::TrainerMainMenu;
    bot.edit_message_text(
        msg.chat.id,
        msg.id,
        format!("El {} quedó como descanso 🚫", WEEKDAY_NAMES[weekday as usize]),
    )
    .await?;
    show_availability(bot, msg.chat.id, state, session).await
}

// ---------- edición de perfil ----------

async fn show_edit_menu(bot: Bot, chat_id: ChatId) -> Result<(), AppError> {
    let buttons: Vec<Vec<KeyboardButton>> = vec![
        vec![KeyboardButton::new("Biografía")],
        vec![KeyboardButton::new("Especialidades")],
        vec![KeyboardButton::new("Precio por sesión")],
        vec![KeyboardButton::new("Portafolio")],
        vec![KeyboardButton::new("⟵ Volver")],
    ];
    let keyboard = KeyboardMarkup::new(buttons).resize_keyboard();
    bot.send_message(chat_id, "¿Qué parte de tu perfil quieres cambiar?")
        .reply_markup(ReplyMarkup::Keyboard(keyboard))
        .await?;
    Ok(())
}

async fn edit_menu_text(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    session: &mut UserSession,
) -> Result<(), AppError> {
    match text {
        "Biografía" => {
            session.step = UserStep::TrainerEditBio;
            bot.send_message(chat_id, "Envía tu nueva biografía en un solo mensaje:")
                .await?;
        }
        "Especialidades" => {
            session.step = UserStep::TrainerEditSpecialties;
            bot.send_message(
                chat_id,
                "Envía tus especialidades separadas por comas (ej. fuerza, crossfit, rehabilitación):",
            )
            .await?;
        }
        "Precio por sesión" => {
            session.step = UserStep::TrainerEditPrice;
            bot.send_message(chat_id, "Envía tu precio por sesión de 60 min en pesos (ej. 450 o 450.50):")
                .await?;
        }
        "Portafolio" => {
            session.step = UserStep::TrainerEditPortfolio;
            bot.send_message(
                chat_id,
                "Envía el enlace a tu portafolio en formato \"https://...\"",
            )
            .await?;
        }
        "⟵ Volver" => {
            session.step = UserStep::TrainerMainMenu;
            show_trainer_menu(bot, chat_id).await?;
        }
        _ => {
            bot.send_message(chat_id, "Usa los botones del menú").await?;
        }
    }
    Ok(())
}

async fn save_bio(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let bio = text.trim();
    if bio.is_empty() || bio.chars().count() > 600 {
        bot.send_message(chat_id, "La biografía debe tener entre 1 y 600 caracteres")
            .await?;
        return Ok(());
    }

    sqlx::query("UPDATE trainer_profiles SET bio = $1 WHERE user_id = $2")
        .bind(bio)
        .bind(session.user_id)
        .execute(&state.pool)
        .await?;

    session.step = UserStep::TrainerEditMenu;
    bot.send_message(chat_id, "¡Biografía actualizada!").await?;
    Ok(())
}

async fn save_specialties(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let specialties = text.trim();
    if specialties.is_empty() || specialties.chars().count() > 200 {
        bot.send_message(chat_id, "Las especialidades deben tener entre 1 y 200 caracteres")
            .await?;
        return Ok(());
    }

    sqlx::query("UPDATE trainer_profiles SET specialties = $1 WHERE user_id = $2")
        .bind(specialties)
        .bind(session.user_id)
        .execute(&state.pool)
        .await?;

    session.step = UserStep::TrainerEditMenu;
    bot.send_message(chat_id, "¡Especialidades actualizadas!").await?;
    Ok(())
}

/// "450" o "450.50" en pesos -> centavos.
pub fn parse_price(raw: &str) -> Option<i64> {
    let raw = raw.trim().trim_start_matches('$');
    let parts: Vec<&str> = raw.split('.').collect();
    let cents = match parts.as_slice() {
        [pesos] => pesos.parse::<i64>().ok()? * 100,
        [pesos, fraction] if fraction.len() <= 2 => {
            let pesos = pesos.parse::<i64>().ok()?;
            let mut fraction_value = fraction.parse::<i64>().ok()?;
            if fraction.len() == 1 {
                fraction_value *= 10;
            }
            pesos * 100 + fraction_value
        }
        _ => return None,
    };
    if cents <= 0 {
        None
    } else {
        Some(cents)
    }
}

async fn save_price(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let price_cents = match parse_price(text) {
        // entre $50 y $5000 por sesión
        Some(cents) if (5000..=500000).contains(&cents) => cents,
        _ => {
            bot.send_message(chat_id, "Envía un precio válido entre $50 y $5000 MXN (ej. 450)")
                .await?;
            return Ok(());
        }
    };

    sqlx::query("UPDATE trainer_profiles SET price_cents = $1 WHERE user_id = $2")
        .bind(price_cents)
        .bind(session.user_id)
        .execute(&state.pool)
        .await?;

    session.step = UserStep::TrainerEditMenu;
    bot.send_message(
        chat_id,
        format!("Precio actualizado a {} ✅", crate::models::format_mxn(price_cents)),
    )
    .await?;
    Ok(())
}

async fn save_portfolio(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let raw = text.trim();
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => {
            bot.send_message(chat_id, "Envía un enlace válido que empiece con https://")
                .await?;
            return Ok(());
        }
    }

    sqlx::query("UPDATE trainer_profiles SET portfolio_url = $1 WHERE user_id = $2")
        .bind(raw)
        .bind(session.user_id)
        .execute(&state.pool)
        .await?;

    session.step = UserStep::TrainerEditMenu;
    bot.send_message(chat_id, "¡Portafolio actualizado!").await?;
    Ok(())
}

// ---------- estadísticas ----------

async fn show_stats(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let trainer_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let sessions = stats::trainer_sessions(&state.pool, trainer_id).await?;
    let payments = stats::trainer_payments(&state.pool, trainer_id).await?;

    let today = Local::now().date_naive();
    let (current_from, current_to) = stats::month_bounds(today);
    let (previous_from, previous_to) = stats::previous_month_bounds(today);

    let current = stats::reduce_trainer_month(&sessions, &payments, current_from, current_to);
    let previous = stats::reduce_trainer_month(&sessions, &payments, previous_from, previous_to);

    let (rating_sum, rating_count) = match find_trainer_profile(&state.pool, trainer_id).await? {
        Some(profile) => (profile.rating_sum, profile.rating_count),
        None => (0, 0),
    };

    bot.send_message(
        chat_id,
        stats::trainer_stats_text(&current, &previous, rating_sum, rating_count),
    )
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
    if session.user_type != UserType::Trainer || !session.approved {
        return Ok(false);
    }
    let chat_id = msg.chat.id;

    match data {
        _ if data.starts_with("tr_confirm:") => {
            if let Some(booking_id) = parse_id(data) {
                transition_booking(
                    bot,
                    chat_id,
                    state,
                    session,
                    booking_id,
                    &["pending"],
                    BookingStatus::Confirmed.as_str(),
                    "✅ ¡Tu reserva fue confirmada por el entrenador! 🎉",
                    format!("✅ Reserva #{} confirmada", booking_id),
                    false,
                )
                .await?;
            }
        }
        _ if data.starts_with("tr_decline:") => {
            if let Some(booking_id) = parse_id(data) {
                transition_booking(
                    bot,
                    chat_id,
                    state,
                    session,
                    booking_id,
                    &["pending"],
                    BookingStatus::Cancelled.as_str(),
                    "😔 El entrenador no puede atenderte en ese horario. Elige otro, por favor.",
                    format!("❌ Reserva #{} rechazada", booking_id),
                    false,
                )
                .await?;
            }
        }
        _ if data.starts_with("tr_cancel:") => {
            if let Some(booking_id) = parse_id(data) {
                transition_booking(
                    bot,
                    chat_id,
                    state,
                    session,
                    booking_id,
                    &["confirmed"],
                    BookingStatus::Cancelled.as_str(),
                    "😔 El entrenador tuvo que cancelar tu sesión. Lamentamos el inconveniente.",
                    format!("❌ Reserva #{} cancelada", booking_id),
                    false,
                )
                .await?;
            }
        }
        _ if data.starts_with("tr_complete:") => {
            if let Some(booking_id) = parse_id(data) {
                transition_booking(
                    bot,
                    chat_id,
                    state,
                    session,
                    booking_id,
                    &["confirmed"],
                    BookingStatus::Completed.as_str(),
                    "🏁 ¡Sesión completada! Cuéntanos cómo te fue:",
                    format!("🏁 Reserva #{} marcada como completada", booking_id),
                    true,
                )
                .await?;
            }
        }
        _ if data.starts_with("tr_up_page:") => {
            if let Some(page) = data.split(':').nth(1).and_then(|raw| raw.parse::<usize>().ok()) {
                show_sessions(bot, chat_id, state, session, true, page, Some(msg)).await?;
            }
        }
        _ if data.starts_with("tr_page:") => {
            if let Some(page) = data.split(':').nth(1).and_then(|raw| raw.parse::<usize>().ok()) {
                show_sessions(bot, chat_id, state, session, false, page, Some(msg)).await?;
            }
        }
        _ if data.starts_with("tr_chat:") => {
            if let Some(client_id) = parse_id(data) {
                let trainer_id = match session.user_id {
                    Some(id) => id,
                    None => return Ok(true),
                };
                let conversation =
                    messaging::open_conversation(&state.pool, client_id, trainer_id).await?;
                open_chat(bot, chat_id, conversation.id, state, session).await?;
            }
        }
        _ if data.starts_with("win_day:") => {
            window_day_chosen(bot, msg, state, session, data).await?;
        }
        _ if data.starts_with("win_clear:") => {
            clear_window(bot, msg, state, session, data).await?;
        }
        _ => return Ok(false),
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_price_pesos_and_cents() {
        assert_eq!(parse_price("450"), Some(45000));
        assert_eq!(parse_price("450.50"), Some(45050));
        assert_eq!(parse_price("450.5"), Some(45050));
        assert_eq!(parse_price("$450"), Some(45000));
        assert_eq!(parse_price(" 99.99 "), Some(9999));
    }

    #[test]
    fn parse_price_rejects_garbage() {
        assert_eq!(parse_price("gratis"), None);
        assert_eq!(parse_price("0"), None);
        assert_eq!(parse_price("-50"), None);
        assert_eq!(parse_price("4.505"), None);
        assert_eq!(parse_price(""), None);
    }
}
