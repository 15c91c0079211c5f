use chrono::{Datelike, Local, NaiveDate};
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, Message, ReplyMarkup},
};
use url::Url;

use crate::bookings;
use crate::error::AppError;
use crate::messaging::{self, ChatSide};
use crate::models::{format_mxn, format_rating, BookingStatus, PaymentMethod, PaymentStatus, TrainerCard};
use crate::payments;
use crate::reviews;
use crate::slots;

use super::{
    booking_block, find_trainer_profile, find_user, generate_calendar, nav_row, notify_user,
    open_chat, paginate, parse_id, show_client_menu, show_conversations, AppState, UserSession,
    UserStep, UserType,
};

const BOOKINGS_PER_PAGE: usize = 3;

pub async fn handle_text(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    match session.step {
        UserStep::ChangeName => return change_name(bot, chat_id, text, state, session).await,
        UserStep::WritingReviewComment => {
            return review_comment(bot, chat_id, text, state, session).await
        }
        UserStep::PersonalCabinet => return cabinet_text(bot, chat_id, text, session).await,
        _ => {}
    }

    match text {
        "🏋️ Buscar entrenador" => show_trainer_list(bot, chat_id, state, None).await,
        "📋 Mis reservas" => show_my_bookings(bot, chat_id, state, session, 0, None).await,
        "💬 Mensajes" => {
            let user_id = match session.user_id {
                Some(id) => id,
                None => return Ok(()),
            };
            show_conversations(bot, chat_id, state, user_id, ChatSide::Client).await
        }
        "👤 Mi cuenta" => {
            session.step = UserStep::PersonalCabinet;
            show_cabinet(bot, chat_id).await
        }
        _ => {
            bot.send_message(chat_id, "No entendí eso 🤔 Usa los botones del menú")
                .await?;
            Ok(())
        }
    }
}

async fn cabinet_text(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    session: &mut UserSession,
) -> Result<(), AppError> {
    match text {
        "✏️ Cambiar nombre" => {
            session.step = UserStep::ChangeName;
            bot.send_message(chat_id, "Escribe tu nuevo nombre:").await?;
            Ok(())
        }
        "🗑 Revocar consentimiento" => {
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    "Sí, eliminar mi cuenta",
                    "revoke:confirm",
                )],
                vec![InlineKeyboardButton::callback("No, cancelar", "revoke:cancel")],
            ]);
            bot.send_message(
                chat_id,
                "¿Seguro que quieres revocar tu consentimiento? Esto elimina tu cuenta y tu historial.",
            )
            .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
            .await?;
            Ok(())
        }
        "⟵ Volver" => {
            session.step = UserStep::MainMenu;
            show_client_menu(bot, chat_id).await
        }
        _ => {
            bot.send_message(chat_id, "Usa los botones del menú").await?;
            Ok(())
        }
    }
}

async fn show_cabinet(bot: Bot, chat_id: ChatId) -> Result<(), AppError> {
    let buttons: Vec<Vec<KeyboardButton>> = vec![
        vec![KeyboardButton::new("✏️ Cambiar nombre")],
        vec![KeyboardButton::new("🗑 Revocar consentimiento")],
        vec![KeyboardButton::new("⟵ Volver")],
    ];
    let keyboard = KeyboardMarkup::new(buttons).resize_keyboard();
    bot.send_message(chat_id, "Mi cuenta")
        .reply_markup(ReplyMarkup::Keyboard(keyboard))
        .await?;
    Ok(())
}

async fn change_name(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let new_name = text.trim();
    if new_name.chars().count() < 2 {
        bot.send_message(chat_id, "El nombre debe tener al menos 2 caracteres. Intenta de nuevo:")
            .await?;
        return Ok(());
    }

    sqlx::query("UPDATE users SET name = $1 WHERE telegram_id = $2")
        .bind(new_name)
        .bind(chat_id.0)
        .execute(&state.pool)
        .await?;

    bot.send_message(chat_id, "¡Nombre actualizado!").await?;
    session.step = UserStep::MainMenu;
    show_client_menu(bot, chat_id).await
}

// ---------- catálogo de entrenadores ----------

async fn approved_trainers(state: &AppState) -> Result<Vec<TrainerCard>, AppError> {
    let trainers = sqlx::query_as::<_, TrainerCard>(
        "SELECT u.id as user_id, u.name, tp.specialties, tp.price_cents,
                tp.rating_sum, tp.rating_count
         FROM users u
         JOIN trainer_profiles tp ON tp.user_id = u.id
         WHERE u.role = 'trainer' AND u.approved
         ORDER BY tp.rating_count DESC, u.name ASC",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(trainers)
}

/// Listado de entrenadores aprobados. Con `edit` reutiliza el mensaje del
/// callback en lugar de mandar uno nuevo.
async fn show_trainer_list(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    edit: Option<&Message>,
) -> Result<(), AppError> {
    let trainers = approved_trainers(state).await?;

    if trainers.is_empty() {
        bot.send_message(chat_id, "Aún no hay entrenadores disponibles 😢")
            .await?;
        return Ok(());
    }

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for trainer in &trainers {
        keyboard.push(vec![
            InlineKeyboardButton::callback(
                format!("{} · {}", trainer.name, format_mxn(trainer.price_cents)),
                format!("book:{}", trainer.user_id),
            ),
            InlineKeyboardButton::callback(
                "ℹ️".to_string(),
                format!("trainer_info:{}", trainer.user_id),
            ),
        ]);
    }
    let keyboard = InlineKeyboardMarkup::new(keyboard);
    let text = "Elige un entrenador 🏋️\n\nToca el nombre para reservar o ℹ️ para ver su perfil";

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

async fn show_trainer_card(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    trainer_id: i32,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let user = match find_user(&state.pool, trainer_id).await? {
        Some(user) => user,
        None => {
            bot.send_message(chat_id, "Ese entrenador ya no está disponible").await?;
            return Ok(());
        }
    };
    let profile = match find_trainer_profile(&state.pool, trainer_id).await? {
        Some(profile) => profile,
        None => {
            bot.send_message(chat_id, "Ese entrenador ya no está disponible").await?;
            return Ok(());
        }
    };

    let mut text = format!("*{}*\n{}\n\n", user.name, format_rating(profile.rating_sum, profile.rating_count));
    if let Some(specialties) = &profile.specialties {
        text.push_str(&format!("*Especialidades:* {}\n", specialties));
    }
    if let Some(bio) = &profile.bio {
        text.push_str(&format!("\n{}\n", bio));
    }
    text.push_str(&format!("\n*Precio por sesión (60 min):* {}\n", format_mxn(profile.price_cents)));

    let latest = reviews::trainer_reviews(&state.pool, trainer_id, 3).await?;
    if !latest.is_empty() {
        text.push_str("\n*Reseñas recientes:*\n");
        for review in &latest {
            let comment = review.comment.as_deref().unwrap_or("(sin comentario)");
            text.push_str(&format!("{} — {}: {}\n", reviews::stars(review.rating), review.client_name, comment));
        }
    }

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = vec![vec![
        InlineKeyboardButton::callback("📅 Reservar", format!("book:{}", trainer_id)),
        InlineKeyboardButton::callback("💬 Mensaje", format!("chat_with:{}", trainer_id)),
    ]];
    if let Some(raw_url) = &profile.portfolio_url {
        match Url::parse(raw_url) {
            Ok(parsed_url) => {
                keyboard.push(vec![InlineKeyboardButton::url("🔗 Portafolio".to_string(), parsed_url)]);
            }
            Err(e) => {
                debug!("portafolio inválido del entrenador {}: {}", trainer_id, e);
            }
        }
    }
    keyboard.push(vec![InlineKeyboardButton::callback(
        "⟵ Volver".to_string(),
        "back_trainers".to_string(),
    )]);

    bot.edit_message_text(chat_id, msg.id, text)
        .parse_mode(teloxide::types::ParseMode::Markdown)
        .reply_markup(InlineKeyboardMarkup::new(keyboard))
        .await?;
    Ok(())
}

// ---------- flujo de reserva ----------

async fn show_booking_calendar(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    trainer_id: i32,
) -> Result<(), AppError> {
    session.selected_trainer = Some(trainer_id);
    session.selected_date = None;
    session.selected_start = None;

    let windows = slots::weekly_windows(&state.pool, trainer_id).await?;
    let today = Local::now().date_naive();
    let calendar = generate_calendar(today.month(), today.year(), &windows);

    bot.edit_message_text(msg.chat.id, msg.id, "Elige una fecha para tu sesión:")
        .reply_markup(calendar)
        .await?;
    Ok(())
}

async fn calendar_nav(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    // cal:nav:<mes>:<año>:<prev|next>
    let parts: Vec<&str> = data.split(':').collect();
    let (month, year, direction) = match parts.as_slice() {
        ["cal", "nav", month, year, direction] => {
            match (month.parse::<u32>(), year.parse::<i32>()) {
                (Ok(month), Ok(year)) => (month, year, *direction),
                _ => return Ok(()),
            }
        }
        _ => return Ok(()),
    };

    let trainer_id = match session.selected_trainer {
        Some(id) => id,
        None => return Ok(()),
    };

    let (month, year) = super::shift_month(month, year, direction == "next");
    let windows = slots::weekly_windows(&state.pool, trainer_id).await?;
    let calendar = generate_calendar(month, year, &windows);

    bot.edit_message_text(msg.chat.id, msg.id, "Elige una fecha para tu sesión:")
        .reply_markup(calendar)
        .await?;
    Ok(())
}

async fn calendar_select(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let raw_date = match data.split(':').nth(2) {
        Some(raw) => raw,
        None => return Ok(()),
    };
    let date = match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => return Ok(()),
    };

    let today = Local::now().date_naive();
    if date < today {
        bot.send_message(chat_id, "No puedes elegir una fecha pasada. Elige otra fecha.")
            .await?;
        return Ok(());
    }

    let trainer_id = match session.selected_trainer {
        Some(id) => id,
        None => return Ok(()),
    };

    let free = slots::free_starts_for_date(&state.pool, trainer_id, date).await?;
    if free.is_empty() {
        bot.send_message(
            chat_id,
            "El entrenador no tiene horarios libres ese día. Elige otra fecha.",
        )
        .await?;
        return Ok(());
    }

    session.selected_date = Some(date);

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for chunk in free.chunks(2) {
        keyboard.push(
            chunk
                .iter()
                .map(|start| {
                    InlineKeyboardButton::callback(
                        slots::slot_label(*start),
                        format!("slot:{}", start),
                    )
                })
                .collect(),
        );
    }
    keyboard.push(vec![InlineKeyboardButton::callback(
        "⟵ Cambiar fecha".to_string(),
        format!("book:{}", trainer_id),
    )]);

    bot.edit_message_text(
        chat_id,
        msg.id,
        format!("Horarios libres para el {}:", date.format("%d.%m.%Y")),
    )
    .reply_markup(InlineKeyboardMarkup::new(keyboard))
    .await?;
    Ok(())
}

async fn slot_selected(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let start_minute = match data.split(':').nth(1).and_then(|raw| raw.parse::<u32>().ok()) {
        Some(minute) => minute,
        None => return Ok(()),
    };

    let (trainer_id, date) = match (session.selected_trainer, session.selected_date) {
        (Some(trainer_id), Some(date)) => (trainer_id, date),
        _ => return Ok(()),
    };

    let trainer = match find_user(&state.pool, trainer_id).await? {
        Some(user) => user,
        None => return Ok(()),
    };
    let profile = match find_trainer_profile(&state.pool, trainer_id).await? {
        Some(profile) => profile,
        None => return Ok(()),
    };

    session.selected_start = Some(start_minute);

    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Confirmar", "book_confirm"),
        InlineKeyboardButton::callback("❌ Cancelar", "book_abort"),
    ]]);

    bot.edit_message_text(
        chat_id,
        msg.id,
        format!(
            "*Confirma tu reserva*\n\n*Entrenador:* {}\n*Fecha:* {}\n*Hora:* {}\n*Precio:* {}",
            trainer.name,
            date.format("%d.%m.%Y"),
            slots::slot_label(start_minute),
            format_mxn(profile.price_cents),
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Markdown)
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

async fn confirm_booking(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let (client_id, trainer_id, date, start_minute) = match (
        session.user_id,
        session.selected_trainer,
        session.selected_date,
        session.selected_start,
    ) {
        (Some(client_id), Some(trainer_id), Some(date), Some(start)) => {
            (client_id, trainer_id, date, start)
        }
        _ => {
            bot.send_message(chat_id, "La reserva expiró, vuelve a empezar").await?;
            return Ok(());
        }
    };

    // Última lectura antes de insertar; dos clientes pueden ganar a la vez.
    if !slots::start_is_still_free(&state.pool, trainer_id, date, start_minute).await? {
        bot.edit_message_text(
            chat_id,
            msg.id,
            "Alguien acaba de tomar ese horario 😔 Elige otro, por favor.",
        )
        .await?;
        return Ok(());
    }

    let starts_at = date.and_time(slots::time_from_minute(start_minute));
    let ends_at = date.and_time(slots::time_from_minute(start_minute + slots::SESSION_MINUTES));

    let booking_id =
        bookings::create_booking(&state.pool, client_id, trainer_id, starts_at, ends_at).await?;
    info!("reserva {} creada: cliente {} con entrenador {}", booking_id, client_id, trainer_id);

    session.selected_date = None;
    session.selected_start = None;

    // Aviso al entrenador con botones para responder
    if let Some(info) = bookings::find_info(&state.pool, booking_id).await? {
        let keyboard = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("✅ Confirmar", format!("tr_confirm:{}", booking_id)),
            InlineKeyboardButton::callback("❌ Rechazar", format!("tr_decline:{}", booking_id)),
        ]]);
        notify_user(
            &bot,
            &state.pool,
            trainer_id,
            &format!(
                "🆕 Nueva reserva #{}\nCliente: {}\nFecha: {} {}",
                booking_id,
                info.client_name,
                super::format_date(info.starts_at),
                slots::slot_label(start_minute),
            ),
            Some(keyboard),
        )
        .await;
    }

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("💳 Tarjeta", format!("pay:card:{}", booking_id)),
            InlineKeyboardButton::callback("🏪 Efectivo (OXXO)", format!("pay:oxxo:{}", booking_id)),
        ],
        vec![InlineKeyboardButton::callback(
            "Pagar después".to_string(),
            "pay_later".to_string(),
        )],
    ]);
    bot.edit_message_text(
        chat_id,
        msg.id,
        format!(
            "🎉 ¡Reserva #{} creada! El entrenador la confirmará en breve.\n\n¿Cómo quieres pagar?",
            booking_id
        ),
    )
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

async fn abort_booking(
    bot: Bot,
    msg: &Message,
    session: &mut UserSession,
) -> Result<(), AppError> {
    session.selected_trainer = None;
    session.selected_date = None;
    session.selected_start = None;
    bot.edit_message_text(msg.chat.id, msg.id, "Reserva cancelada. Puedes elegir otro entrenador cuando quieras.")
        .await?;
    Ok(())
}

// ---------- pagos ----------

async fn start_payment(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    // pay:<card|oxxo>:<reserva>
    let parts: Vec<&str> = data.split(':').collect();
    let (method, booking_id) = match parts.as_slice() {
        ["pay", "card", raw] => (PaymentMethod::Card, raw.parse::<i32>().ok()),
        ["pay", "oxxo", raw] => (PaymentMethod::Oxxo, raw.parse::<i32>().ok()),
        _ => return Ok(()),
    };
    let booking_id = match booking_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let info = match bookings::find_info(&state.pool, booking_id).await? {
        Some(info) => info,
        None => return Ok(()),
    };
    if session.user_id != Some(info.client_id) {
        return Ok(());
    }
    if info.status == "cancelled" {
        bot.send_message(chat_id, "Esa reserva ya fue cancelada").await?;
        return Ok(());
    }
    if let Some(existing) = payments::find_payment_by_booking(&state.pool, booking_id).await? {
        if existing.status == "paid" {
            bot.send_message(chat_id, "Esa reserva ya está pagada ✅").await?;
            return Ok(());
        }
    }

    let (commission_cents, trainer_cents) =
        payments::split_commission(info.price_cents, state.config.commission_percent);
    let description = format!("Sesión de entrenamiento #{}", booking_id);
    let reference = format!("booking-{}", booking_id);

    match method {
        PaymentMethod::Card => {
            let charge = match state
                .payments
                .create_card_charge(info.price_cents, &description, &reference)
                .await
            {
                Ok(charge) => charge,
                Err(e) => {
                    error!("no se pudo crear el cargo con tarjeta: {}", e);
                    bot.send_message(chat_id, "No pudimos iniciar el pago, intenta más tarde 🙏")
                        .await?;
                    return Ok(());
                }
            };

            let payment_id = payments::record_payment(
                &state.pool,
                booking_id,
                info.price_cents,
                commission_cents,
                trainer_cents,
                PaymentMethod::Card,
                &charge.id,
                None,
                None,
            )
            .await?;

            let checkout_url = charge.checkout_url.unwrap_or_default();
            let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
            if let Ok(parsed_url) = Url::parse(&checkout_url) {
                keyboard.push(vec![InlineKeyboardButton::url("💳 Pagar ahora".to_string(), parsed_url)]);
            }
            keyboard.push(vec![InlineKeyboardButton::callback(
                "🔄 Ya pagué".to_string(),
                format!("pay_check:{}", payment_id),
            )]);

            bot.edit_message_text(
                chat_id,
                msg.id,
                format!(
                    "Total a pagar: {}\n\nAbre el enlace para pagar con tarjeta y después toca \"Ya pagué\".",
                    format_mxn(info.price_cents)
                ),
            )
            .reply_markup(InlineKeyboardMarkup::new(keyboard))
            .await?;
        }
        PaymentMethod::Oxxo => {
            let charge = match state
                .payments
                .create_oxxo_voucher(info.price_cents, &description, &reference)
                .await
            {
                Ok(charge) => charge,
                Err(e) => {
                    error!("no se pudo emitir la ficha OXXO: {}", e);
                    bot.send_message(chat_id, "No pudimos generar tu ficha OXXO, intenta más tarde 🙏")
                        .await?;
                    return Ok(());
                }
            };

            let voucher = match charge.voucher {
                Some(voucher) => voucher,
                None => return Ok(()),
            };
            let expires_at = voucher.expires_at.naive_utc();

            let payment_id = payments::record_payment(
                &state.pool,
                booking_id,
                info.price_cents,
                commission_cents,
                trainer_cents,
                PaymentMethod::Oxxo,
                &charge.id,
                Some(&voucher.reference),
                Some(expires_at),
            )
            .await?;

            let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
                "🔄 Ya pagué".to_string(),
                format!("pay_check:{}", payment_id),
            )]]);

            bot.edit_message_text(
                chat_id,
                msg.id,
                format!(
                    "🏪 *Ficha de pago OXXO*\n\nReferencia: `{}`\nMonto: {}\nVence: {}\n\nPresenta la referencia en caja. El pago puede tardar un poco en reflejarse.",
                    voucher.reference,
                    format_mxn(info.price_cents),
                    expires_at.format("%d.%m.%Y %H:%M"),
                ),
            )
            .parse_mode(teloxide::types::ParseMode::Markdown)
            .reply_markup(keyboard)
            .await?;
        }
    }

    Ok(())
}

async fn check_payment(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    data: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let payment_id = match parse_id(data) {
        Some(id) => id,
        None => return Ok(()),
    };

    let payment = match payments::find_payment(&state.pool, payment_id).await? {
        Some(payment) => payment,
        None => return Ok(()),
    };

    if payment.status == "paid" {
        bot.send_message(chat_id, "Ese pago ya está registrado ✅").await?;
        return Ok(());
    }

    let external_id = match &payment.external_id {
        Some(id) => id.clone(),
        None => return Ok(()),
    };

    let charge = match state.payments.fetch_charge(&external_id).await {
        Ok(charge) => charge,
        Err(e) => {
            error!("no se pudo consultar el cargo {}: {}", external_id, e);
            bot.send_message(chat_id, "No pudimos consultar tu pago, intenta de nuevo en un momento")
                .await?;
            return Ok(());
        }
    };

    match PaymentStatus::parse(&charge.status) {
        Some(PaymentStatus::Paid) => {
            payments::set_payment_status(&state.pool, payment.id, PaymentStatus::Paid.as_str())
                .await?;

            if let Some(info) = bookings::find_info(&state.pool, payment.booking_id).await? {
                if info.status == "pending" {
                    bookings::set_status(
                        &state.pool,
                        payment.booking_id,
                        BookingStatus::Confirmed.as_str(),
                    )
                    .await?;
                }
                notify_user(
                    &bot,
                    &state.pool,
                    info.trainer_id,
                    &format!(
                        "💰 El cliente {} pagó la reserva #{} ({})",
                        info.client_name,
                        info.id,
                        format_mxn(payment.trainer_cents),
                    ),
                    None,
                )
                .await;
            }

            bot.send_message(chat_id, "💰 ¡Pago confirmado! Tu sesión quedó asegurada 🎉")
                .await?;
        }
        Some(PaymentStatus::Expired) => {
            payments::set_payment_status(&state.pool, payment.id, PaymentStatus::Expired.as_str())
                .await?;
            bot.send_message(chat_id, "Tu ficha venció ⌛ Genera un pago nuevo desde Mis reservas")
                .await?;
        }
        Some(PaymentStatus::Failed) => {
            payments::set_payment_status(&state.pool, payment.id, PaymentStatus::Failed.as_str())
                .await?;
            bot.send_message(chat_id, "El pago fue rechazado ⚠️ Intenta con otro método")
                .await?;
        }
        _ => {
            bot.send_message(chat_id, "Tu pago sigue pendiente 🕐 Vuelve a consultar en un rato")
                .await?;
        }
    }

    Ok(())
}

// ---------- mis reservas ----------

async fn show_my_bookings(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
    page: usize,
    edit: Option<&Message>,
) -> Result<(), AppError> {
    let client_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let all = bookings::for_client(&state.pool, client_id).await?;
    if all.is_empty() {
        bot.send_message(chat_id, "Todavía no tienes reservas").await?;
        return Ok(());
    }

    let (start_idx, end_idx, total_pages) = paginate(all.len(), page, BOOKINGS_PER_PAGE);
    let page_bookings = &all[start_idx..end_idx];

    let mut text = String::from("📋 Tus reservas:\n\n");
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for info in page_bookings {
        text.push_str(&booking_block(info, true));

        let payment = payments::find_payment_by_booking(&state.pool, info.id).await?;
        if let Some(status) = payment.as_ref().and_then(|p| PaymentStatus::parse(&p.status)) {
            text.push_str(&format!("_Pago:_ {}\n\n", status.label()));
        }

        let mut row = vec![InlineKeyboardButton::callback(
            format!("🔢 #{}", info.id),
            "ignore".to_string(),
        )];
        match info.status.as_str() {
            "pending" | "confirmed" => {
                row.push(InlineKeyboardButton::callback(
                    "❌ Cancelar".to_string(),
                    format!("cl_cancel:{}", info.id),
                ));
                if payment.map(|p| p.status != "paid").unwrap_or(true) {
                    row.push(InlineKeyboardButton::callback(
                        "💳 Pagar".to_string(),
                        format!("pay:card:{}", info.id),
                    ));
                    row.push(InlineKeyboardButton::callback(
                        "🏪 OXXO".to_string(),
                        format!("pay:oxxo:{}", info.id),
                    ));
                }
            }
            "completed" => {
                if !reviews::has_review(&state.pool, info.id).await? {
                    row.push(InlineKeyboardButton::callback(
                        "⭐ Calificar".to_string(),
                        format!("review:{}", info.id),
                    ));
                }
            }
            _ => {}
        }
        keyboard.push(row);
    }

    if total_pages > 1 {
        keyboard.push(nav_row("cl_page", page, total_pages));
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

async fn cancel_booking(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let booking_id = match parse_id(data) {
        Some(id) => id,
        None => return Ok(()),
    };

    let info = match bookings::find_info(&state.pool, booking_id).await? {
        Some(info) => info,
        None => return Ok(()),
    };
    if session.user_id != Some(info.client_id) {
        return Ok(());
    }
    if info.status == "cancelled" || info.status == "completed" {
        bot.send_message(chat_id, "Esa reserva ya no se puede cancelar").await?;
        return Ok(());
    }

    bookings::set_status(&state.pool, booking_id, BookingStatus::Cancelled.as_str()).await?;
    info!("cliente {} canceló la reserva {}", info.client_id, booking_id);

    notify_user(
        &bot,
        &state.pool,
        info.trainer_id,
        &format!("😔 El cliente canceló la reserva #{}", booking_id),
        None,
    )
    .await;

    bot.send_message(chat_id, format!("❌ Reserva #{} cancelada", booking_id))
        .await?;
    Ok(())
}

// ---------- reseñas ----------

async fn start_review(
    bot: Bot,
    msg: &Message,
    state: &AppState,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let booking_id = match parse_id(data) {
        Some(id) => id,
        None => return Ok(()),
    };

    let info = match bookings::find_info(&state.pool, booking_id).await? {
        Some(info) => info,
        None => return Ok(()),
    };
    if session.user_id != Some(info.client_id) || info.status != "completed" {
        return Ok(());
    }
    if reviews::has_review(&state.pool, booking_id).await? {
        bot.send_message(chat_id, "Esa sesión ya tiene reseña").await?;
        return Ok(());
    }

    let row = (1..=5)
        .map(|rating| {
            InlineKeyboardButton::callback(
                format!("⭐{}", rating),
                format!("rate:{}:{}", booking_id, rating),
            )
        })
        .collect::<Vec<_>>();
    bot.send_message(
        chat_id,
        format!("¿Cómo estuvo tu sesión con {}?", info.trainer_name),
    )
    .reply_markup(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(vec![row])))
    .await?;
    Ok(())
}

async fn rating_chosen(
    bot: Bot,
    msg: &Message,
    session: &mut UserSession,
    data: &str,
) -> Result<(), AppError> {
    // rate:<reserva>:<calificación>
    let parts: Vec<&str> = data.split(':').collect();
    let (booking_id, rating) = match parts.as_slice() {
        ["rate", booking, rating] => {
            match (booking.parse::<i32>(), rating.parse::<i16>()) {
                (Ok(booking_id), Ok(rating)) => (booking_id, rating),
                _ => return Ok(()),
            }
        }
        _ => return Ok(()),
    };

    session.review_booking_id = Some(booking_id);
    session.review_rating = Some(rating);
    session.step = UserStep::WritingReviewComment;

    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Omitir comentario",
        "review_skip",
    )]]);
    bot.edit_message_text(
        msg.chat.id,
        msg.id,
        format!("{} ¡Gracias! Si quieres, escribe un comentario:", reviews::stars(rating)),
    )
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

async fn submit_review(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
    comment: Option<&str>,
) -> Result<(), AppError> {
    let (booking_id, rating) = match (session.review_booking_id, session.review_rating) {
        (Some(booking_id), Some(rating)) => (booking_id, rating),
        _ => {
            session.step = UserStep::MainMenu;
            return Ok(());
        }
    };

    let info = match bookings::find_info(&state.pool, booking_id).await? {
        Some(info) => info,
        None => return Ok(()),
    };

    match reviews::create_review(
        &state.pool,
        booking_id,
        info.client_id,
        info.trainer_id,
        rating,
        comment,
    )
    .await
    {
        Ok(()) => {
            notify_user(
                &bot,
                &state.pool,
                info.trainer_id,
                &format!("⭐ Recibiste una reseña nueva de {}: {}", info.client_name, reviews::stars(rating)),
                None,
            )
            .await;
            bot.send_message(chat_id, "¡Gracias por tu reseña! 🙌").await?;
        }
        Err(AppError::Validation { message }) => {
            bot.send_message(chat_id, message).await?;
        }
        Err(e) => return Err(e),
    }

    session.review_booking_id = None;
    session.review_rating = None;
    session.step = UserStep::MainMenu;
    show_client_menu(bot, chat_id).await
}

async fn review_comment(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let comment = text.trim();
    if comment.is_empty() {
        bot.send_message(chat_id, "Escribe un comentario o usa el botón para omitirlo")
            .await?;
        return Ok(());
    }
    submit_review(bot, chat_id, state, session, Some(comment)).await
}

// ---------- cuenta ----------

async fn revoke_confirmed(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let user_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await?;
    info!("usuario {} revocó su consentimiento y fue eliminado", user_id);

    *session = UserSession::new();
    bot.send_message(
        chat_id,
        "Tu cuenta y tu historial fueron eliminados. Si cambias de opinión, escribe /start.",
    )
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
    if session.user_type != UserType::Client {
        return Ok(false);
    }
    let chat_id = msg.chat.id;

    match data {
        "back_trainers" => {
            show_trainer_list(bot, chat_id, state, Some(msg)).await?;
        }
        "book_confirm" => confirm_booking(bot, msg, state, session).await?,
        "book_abort" => abort_booking(bot, msg, session).await?,
        "pay_later" => {
            bot.send_message(
                chat_id,
                "Sin problema, puedes pagar desde 📋 Mis reservas cuando quieras.",
            )
            .await?;
        }
        "review_skip" => submit_review(bot, chat_id, state, session, None).await?,
        "revoke:confirm" => revoke_confirmed(bot, chat_id, state, session).await?,
        "revoke:cancel" => {
            bot.send_message(chat_id, "Operación cancelada 👍").await?;
        }
        _ if data.starts_with("trainer_info:") => {
            if let Some(trainer_id) = parse_id(data) {
                show_trainer_card(bot, msg, state, trainer_id).await?;
            }
        }
        _ if data.starts_with("book:") => {
            if let Some(trainer_id) = parse_id(data) {
                show_booking_calendar(bot, msg, state, session, trainer_id).await?;
            }
        }
        _ if data.starts_with("chat_with:") => {
            if let Some(trainer_id) = parse_id(data) {
                let client_id = match session.user_id {
                    Some(id) => id,
                    None => return Ok(true),
                };
                let conversation =
                    messaging::open_conversation(&state.pool, client_id, trainer_id).await?;
                open_chat(bot, chat_id, conversation.id, state, session).await?;
            }
        }
        _ if data.starts_with("cal:nav:") => calendar_nav(bot, msg, state, session, data).await?,
        _ if data.starts_with("cal:select:") => {
            calendar_select(bot, msg, state, session, data).await?
        }
        _ if data.starts_with("slot:") => slot_selected(bot, msg, state, session, data).await?,
        _ if data.starts_with("pay:") => start_payment(bot, msg, state, session, data).await?,
        _ if data.starts_with("pay_check:") => check_payment(bot, msg, state, data).await?,
        _ if data.starts_with("cl_cancel:") => {
            cancel_booking(bot, msg, state, session, data).await?
        }
        _ if data.starts_with("cl_page:") => {
            if let Some(page) = data.split(':').nth(1).and_then(|raw| raw.parse::<usize>().ok()) {
                show_my_bookings(bot, chat_id, state, session, page, Some(msg)).await?;
            }
        }
        _ if data.starts_with("review:") => start_review(bot, msg, state, session, data).await?,
        _ if data.starts_with("rate:") => rating_chosen(bot, msg, session, data).await?,
        _ => return Ok(false),
    }

    Ok(true)
}
