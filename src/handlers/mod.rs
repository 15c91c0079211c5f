use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{
        CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
        Message, ReplyMarkup,
    },
};

use crate::config::Config;
use crate::error::AppError;
use crate::messaging::{self, ChatSide};
use crate::models::{booking_status_label, format_mxn, BookingInfo, TrainerProfile, User};
use crate::payments::PaymentsClient;

pub mod admin;
pub mod client;
pub mod trainer;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub payments: PaymentsClient,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserType {
    Unknown,
    Client,
    Trainer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserStep {
    Start,
    Registration,
    // cliente
    MainMenu,
    PersonalCabinet,
    ChangeName,
    WritingReviewComment,
    // compartido
    Chatting,
    // entrenador
    TrainerMainMenu,
    TrainerEditMenu,
    TrainerEditBio,
    TrainerEditSpecialties,
    TrainerEditPrice,
    TrainerEditPortfolio,
    TrainerSetWindow,
    // admin
    AdminMainMenu,
}

/// Estado de conversación por chat, en memoria mientras vive el proceso.
pub struct UserSession {
    pub step: UserStep,
    pub user_type: UserType,
    pub user_id: Option<i32>,
    pub approved: bool,
    pub reg_name: String,
    pub reg_username: Option<String>,
    pub consent: bool,
    pub selected_trainer: Option<i32>,
    pub selected_date: Option<NaiveDate>,
    pub selected_start: Option<u32>,
    pub conversation_id: Option<i32>,
    pub review_booking_id: Option<i32>,
    pub review_rating: Option<i16>,
    pub window_weekday: Option<i16>,
}

impl UserSession {
    pub fn new() -> Self {
        UserSession {
            step: UserStep::Start,
            user_type: UserType::Unknown,
            user_id: None,
            approved: false,
            reg_name: String::new(),
            reg_username: None,
            consent: false,
            selected_trainer: None,
            selected_date: None,
            selected_start: None,
            conversation_id: None,
            review_booking_id: None,
            review_rating: None,
            window_weekday: None,
        }
    }
}

fn adopt_user(session: &mut UserSession, user: &User) {
    session.user_id = Some(user.id);
    session.approved = user.approved;
    session.user_type = match user.role.as_str() {
        "admin" => UserType::Admin,
        "trainer" => UserType::Trainer,
        _ => UserType::Client,
    };
    if matches!(session.step, UserStep::Start | UserStep::Registration) {
        session.step = match session.user_type {
            UserType::Admin => UserStep::AdminMainMenu,
            UserType::Trainer => UserStep::TrainerMainMenu,
            _ => UserStep::MainMenu,
        };
    }
}

pub async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    sessions: &mut HashMap<i64, UserSession>,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let text = msg.text().unwrap_or("").to_string();

    let session = sessions.entry(chat_id.0).or_insert_with(UserSession::new);

    if session.user_id.is_none() {
        if let Some(user) = find_user_by_telegram(&state.pool, chat_id.0).await? {
            adopt_user(session, &user);
        }
    }

    if text == "/start" {
        return start_command(bot, chat_id, &state, session).await;
    }

    match session.step {
        UserStep::Registration => registration_name(bot, &msg, chat_id, session).await,
        UserStep::Chatting => chat_text(bot, chat_id, &text, &state, session).await,
        _ => match session.user_type {
            UserType::Client => client::handle_text(bot, chat_id, &text, &state, session).await,
            UserType::Trainer => trainer::handle_text(bot, chat_id, &text, &state, session).await,
            UserType::Admin => admin::handle_text(bot, chat_id, &text, &state, session).await,
            UserType::Unknown => {
                bot.send_message(chat_id, "Escribe /start para comenzar 💪").await?;
                Ok(())
            }
        },
    }
}

async fn start_command(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    if let Some(user) = find_user_by_telegram(&state.pool, chat_id.0).await? {
        adopt_user(session, &user);
        match session.user_type {
            UserType::Admin => {
                session.step = UserStep::AdminMainMenu;
                show_admin_menu(bot, chat_id).await?;
            }
            UserType::Trainer => {
                if session.approved {
                    session.step = UserStep::TrainerMainMenu;
                    show_trainer_menu(bot, chat_id).await?;
                } else {
                    bot.send_message(
                        chat_id,
                        "Tu solicitud de entrenador sigue en revisión. Te avisamos en cuanto haya respuesta 🙌",
                    )
                    .await?;
                }
            }
            _ => {
                session.step = UserStep::MainMenu;
                show_client_menu(bot, chat_id).await?;
            }
        }
        return Ok(());
    }

    *session = UserSession::new();
    session.step = UserStep::Registration;
    bot.send_message(
        chat_id,
        "¡Hola! Soy el bot de EntrenaBot 🏋️ Conecto clientes con entrenadores personales.\n\nPara empezar, escribe tu nombre:",
    )
    .await?;
    Ok(())
}

async fn registration_name(
    bot: Bot,
    msg: &Message,
    chat_id: ChatId,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let name = msg.text().unwrap_or("").trim().to_string();
    if name.chars().count() < 2 {
        bot.send_message(chat_id, "El nombre debe tener al menos 2 caracteres. Intenta de nuevo:")
            .await?;
        return Ok(());
    }

    session.reg_name = name.clone();
    session.reg_username = msg.from().and_then(|user| user.username.clone());

    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Acepto",
        "consent:accept",
    )]]);
    bot.send_message(
        chat_id,
        format!(
            "{}, confirma que conoces y aceptas los términos de servicio y el aviso de privacidad de la plataforma.",
            name
        ),
    )
    .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
    .await?;

    Ok(())
}

pub async fn handle_callback_query(
    q: CallbackQuery,
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    sessions: &mut HashMap<i64, UserSession>,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;
    let session = sessions.entry(chat_id.0).or_insert_with(UserSession::new);

    if session.user_id.is_none() {
        if let Some(user) = find_user_by_telegram(&state.pool, chat_id.0).await? {
            adopt_user(session, &user);
        }
    }

    let data = match q.data.clone() {
        Some(data) => data,
        None => return Ok(()),
    };
    debug!("callback de {}: {}", chat_id.0, data);

    match data.as_str() {
        "ignore" => {}
        "consent:accept" => consent_accepted(bot.clone(), chat_id, session).await?,
        "role:client" => register_client(bot.clone(), chat_id, &state, session).await?,
        "role:trainer" => register_trainer(bot.clone(), chat_id, &state, session).await?,
        _ if data.starts_with("chat_open:") => {
            if let Some(conversation_id) = parse_id(&data) {
                open_chat(bot.clone(), chat_id, conversation_id, &state, session).await?;
            }
        }
        _ => {
            if !client::handle_callback(bot.clone(), &msg, &data, &state, session).await?
                && !trainer::handle_callback(bot.clone(), &msg, &data, &state, session).await?
                && !admin::handle_callback(bot.clone(), &msg, &data, &state, session).await?
            {
                debug!("callback sin manejar: {}", data);
            }
        }
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn consent_accepted(
    bot: Bot,
    chat_id: ChatId,
    session: &mut UserSession,
) -> Result<(), AppError> {
    if session.reg_name.is_empty() {
        session.step = UserStep::Registration;
        bot.send_message(chat_id, "Escribe tu nombre para continuar:").await?;
        return Ok(());
    }

    session.consent = true;
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🏃 Quiero entrenar (cliente)",
            "role:client",
        )],
        vec![InlineKeyboardButton::callback(
            "🏋️ Ofrezco entrenamientos (entrenador)",
            "role:trainer",
        )],
    ]);
    bot.send_message(chat_id, "¡Gracias! ¿Cómo quieres usar la plataforma?")
        .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
        .await?;
    Ok(())
}

async fn register_client(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    if !session.consent || session.reg_name.is_empty() {
        session.step = UserStep::Registration;
        bot.send_message(chat_id, "Escribe /start para comenzar de nuevo").await?;
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO users (telegram_id, name, username, role, approved)
         VALUES ($1, $2, $3, 'client', TRUE)
         ON CONFLICT (telegram_id) DO UPDATE SET name = $2, username = $3",
    )
    .bind(chat_id.0)
    .bind(&session.reg_name)
    .bind(&session.reg_username)
    .execute(&state.pool)
    .await?;

    let user_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE telegram_id = $1")
        .bind(chat_id.0)
        .fetch_one(&state.pool)
        .await?;

    session.user_id = Some(user_id);
    session.user_type = UserType::Client;
    session.approved = true;
    session.step = UserStep::MainMenu;

    info!("cliente nuevo registrado: {} ({})", session.reg_name, chat_id.0);
    bot.send_message(chat_id, "¡Listo! Ya puedes buscar un entrenador y reservar tu primera sesión 💪")
        .await?;
    show_client_menu(bot, chat_id).await?;
    Ok(())
}

async fn register_trainer(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    if !session.consent || session.reg_name.is_empty() {
        session.step = UserStep::Registration;
        bot.send_message(chat_id, "Escribe /start para comenzar de nuevo").await?;
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO users (telegram_id, name, username, role, approved)
         VALUES ($1, $2, $3, 'trainer', FALSE)
         ON CONFLICT (telegram_id) DO UPDATE SET name = $2, username = $3, role = 'trainer'",
    )
    .bind(chat_id.0)
    .bind(&session.reg_name)
    .bind(&session.reg_username)
    .execute(&state.pool)
    .await?;

    let user_id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE telegram_id = $1")
        .bind(chat_id.0)
        .fetch_one(&state.pool)
        .await?;

    sqlx::query(
        "INSERT INTO trainer_profiles (user_id, price_cents)
         VALUES ($1, 40000)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(&state.pool)
    .await?;

    session.user_id = Some(user_id);
    session.user_type = UserType::Trainer;
    session.approved = false;

    info!("solicitud de entrenador: {} ({})", session.reg_name, chat_id.0);

    // Aviso directo a los administradores configurados
    for admin_id in &state.config.admin_telegram_ids {
        let keyboard = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("✅ Aprobar", format!("adm_approve:{}", user_id)),
            InlineKeyboardButton::callback("❌ Rechazar", format!("adm_reject:{}", user_id)),
        ]]);
        if let Err(e) = bot
            .send_message(
                ChatId(*admin_id),
                format!("🧑‍🏫 Nueva solicitud de entrenador: {}", session.reg_name),
            )
            .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
            .await
        {
            error!("no se pudo avisar al admin {}: {}", admin_id, e);
        }
    }

    bot.send_message(
        chat_id,
        "Recibimos tu solicitud de entrenador 📋 Un administrador la revisará y te avisaremos por aquí.",
    )
    .await?;
    Ok(())
}

// ---------- chat compartido cliente/entrenador ----------

pub async fn open_chat(
    bot: Bot,
    chat_id: ChatId,
    conversation_id: i32,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    let conversation = match messaging::find_conversation(&state.pool, conversation_id).await? {
        Some(conversation) => conversation,
        None => {
            bot.send_message(chat_id, "Esa conversación ya no existe").await?;
            return Ok(());
        }
    };

    let user_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let (side, counterpart_id) = if user_id == conversation.client_id {
        (ChatSide::Client, conversation.trainer_id)
    } else if user_id == conversation.trainer_id {
        (ChatSide::Trainer, conversation.client_id)
    } else {
        return Ok(());
    };

    let counterpart = match find_user(&state.pool, counterpart_id).await? {
        Some(user) => user,
        None => {
            bot.send_message(chat_id, "Esa conversación ya no existe").await?;
            return Ok(());
        }
    };

    messaging::mark_read(&state.pool, conversation.id, side).await?;

    let history = messaging::recent_messages(&state.pool, conversation.id, 15).await?;
    let mut text = format!("💬 Chat con {}\n\n", counterpart.name);
    if history.is_empty() {
        text.push_str("Todavía no hay mensajes.\n");
    }
    for message in &history {
        let who = if message.sender_id == user_id { "Tú" } else { counterpart.name.as_str() };
        text.push_str(&format!("{}: {}\n", who, message.body));
    }
    text.push_str("\nEscribe tu mensaje y se lo haré llegar.");

    session.step = UserStep::Chatting;
    session.conversation_id = Some(conversation.id);

    let keyboard = KeyboardMarkup::new(vec![vec![KeyboardButton::new("⟵ Salir del chat")]])
        .resize_keyboard();
    bot.send_message(chat_id, text)
        .reply_markup(ReplyMarkup::Keyboard(keyboard))
        .await?;
    Ok(())
}

async fn chat_text(
    bot: Bot,
    chat_id: ChatId,
    text: &str,
    state: &AppState,
    session: &mut UserSession,
) -> Result<(), AppError> {
    if text == "⟵ Salir del chat" || session.conversation_id.is_none() {
        session.conversation_id = None;
        return show_role_menu(bot, chat_id, session).await;
    }
    if text.is_empty() {
        bot.send_message(chat_id, "Solo puedo reenviar mensajes de texto").await?;
        return Ok(());
    }

    let conversation_id = session.conversation_id.unwrap_or(-1);
    let conversation = match messaging::find_conversation(&state.pool, conversation_id).await? {
        Some(conversation) => conversation,
        None => {
            session.conversation_id = None;
            return show_role_menu(bot, chat_id, session).await;
        }
    };

    let user_id = match session.user_id {
        Some(id) => id,
        None => return Ok(()),
    };
    let (side, counterpart_id) = if user_id == conversation.client_id {
        (ChatSide::Client, conversation.trainer_id)
    } else {
        (ChatSide::Trainer, conversation.client_id)
    };

    messaging::store_message(&state.pool, conversation.id, side, user_id, text).await?;

    let sender_name = match find_user(&state.pool, user_id).await? {
        Some(user) => user.name,
        None => "Alguien".to_string(),
    };
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Responder",
        format!("chat_open:{}", conversation.id),
    )]]);
    // tope holgado bajo el límite de 4096 del API de Telegram
    notify_user(
        &bot,
        &state.pool,
        counterpart_id,
        &format!("💬 {}: {}", sender_name, messaging::preview_text(text, 3500)),
        Some(keyboard),
    )
    .await;

    Ok(())
}

/// Lista de hilos del usuario con contador de no leídos.
pub async fn show_conversations(
    bot: Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i32,
    side: ChatSide,
) -> Result<(), AppError> {
    let previews = messaging::list_conversations(&state.pool, user_id, side).await?;
    if previews.is_empty() {
        bot.send_message(chat_id, "No tienes conversaciones todavía").await?;
        return Ok(());
    }

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for preview in &previews {
        let label = if preview.unread > 0 {
            format!("{} ({} sin leer)", preview.counterpart_name, preview.unread)
        } else {
            preview.counterpart_name.clone()
        };
        keyboard.push(vec![InlineKeyboardButton::callback(
            label,
            format!("chat_open:{}", preview.id),
        )]);
    }

    bot.send_message(chat_id, "💬 Tus conversaciones:")
        .reply_markup(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(keyboard)))
        .await?;
    Ok(())
}

// ---------- menús ----------

pub fn client_menu_keyboard() -> KeyboardMarkup {
    let buttons: Vec<Vec<KeyboardButton>> = vec![
        vec![KeyboardButton::new("🏋️ Buscar entrenador")],
        vec![KeyboardButton::new("📋 Mis reservas")],
        vec![KeyboardButton::new("💬 Mensajes")],
        vec![KeyboardButton::new("👤 Mi cuenta")],
    ];
    KeyboardMarkup::new(buttons).resize_keyboard()
}

pub async fn show_client_menu(bot: Bot, chat_id: ChatId) -> Result<(), AppError> {
    bot.send_message(chat_id, "¿Qué quieres hacer?")
        .reply_markup(ReplyMarkup::Keyboard(client_menu_keyboard()))
        .await?;
    Ok(())
}

pub async fn show_trainer_menu(bot: Bot, chat_id: ChatId) -> Result<(), AppError> {
    let buttons: Vec<Vec<KeyboardButton>> = vec![
        vec![KeyboardButton::new("📅 Mi agenda")],
        vec![KeyboardButton::new("📋 Mis sesiones")],
        vec![KeyboardButton::new("🕒 Mi disponibilidad")],
        vec![KeyboardButton::new("✏️ Editar perfil")],
        vec![KeyboardButton::new("📊 Estadísticas")],
        vec![KeyboardButton::new("💬 Mensajes")],
    ];
    let keyboard = KeyboardMarkup::new(buttons).resize_keyboard();
    bot.send_message(chat_id, "Elige una opción")
        .reply_markup(ReplyMarkup::Keyboard(keyboard))
        .await?;
    Ok(())
}

pub async fn show_admin_menu(bot: Bot, chat_id: ChatId) -> Result<(), AppError> {
    let buttons: Vec<Vec<KeyboardButton>> = vec![
        vec![KeyboardButton::new("🧑‍🏫 Solicitudes")],
        vec![KeyboardButton::new("⭐ Reseñas")],
        vec![KeyboardButton::new("📊 Estadísticas")],
    ];
    let keyboard = KeyboardMarkup::new(buttons).resize_keyboard();
    bot.send_message(chat_id, "Panel de administración")
        .reply_markup(ReplyMarkup::Keyboard(keyboard))
        .await?;
    Ok(())
}

pub async fn show_role_menu(
    bot: Bot,
    chat_id: ChatId,
    session: &mut UserSession,
) -> Result<(), AppError> {
    match session.user_type {
        UserType::Admin => {
            session.step = UserStep::AdminMainMenu;
            show_admin_menu(bot, chat_id).await
        }
        UserType::Trainer => {
            session.step = UserStep::TrainerMainMenu;
            show_trainer_menu(bot, chat_id).await
        }
        _ => {
            session.step = UserStep::MainMenu;
            show_client_menu(bot, chat_id).await
        }
    }
}

// ---------- consultas compartidas ----------

pub async fn find_user_by_telegram(
    pool: &PgPool,
    telegram_id: i64,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, telegram_id, name, username, role, approved FROM users WHERE telegram_id = $1",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user(pool: &PgPool, user_id: i32) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, telegram_id, name, username, role, approved FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn telegram_id_of(pool: &PgPool, user_id: i32) -> Result<Option<i64>, AppError> {
    let telegram_id =
        sqlx::query_scalar::<_, i64>("SELECT telegram_id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(telegram_id)
}

pub async fn find_trainer_profile(
    pool: &PgPool,
    user_id: i32,
) -> Result<Option<TrainerProfile>, AppError> {
    let profile = sqlx::query_as::<_, TrainerProfile>(
        "SELECT user_id, bio, specialties, price_cents, portfolio_url, rating_sum, rating_count
         FROM trainer_profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

/// Envío directo a un usuario por su id interno; los fallos solo se loguean
/// para no tirar el flujo que originó el aviso.
pub async fn notify_user(
    bot: &Bot,
    pool: &PgPool,
    user_id: i32,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) {
    match telegram_id_of(pool, user_id).await {
        Ok(Some(telegram_id)) => {
            let request = bot.send_message(ChatId(telegram_id), text);
            let request = match keyboard {
                Some(keyboard) => request.reply_markup(ReplyMarkup::InlineKeyboard(keyboard)),
                None => request,
            };
            if let Err(e) = request.await {
                error!("no se pudo notificar al usuario {}: {}", user_id, e);
            }
        }
        Ok(None) => {}
        Err(e) => error!("no se pudo buscar al usuario {}: {}", user_id, e),
    }
}

// ---------- utilidades de presentación ----------

pub fn parse_id(data: &str) -> Option<i32> {
    data.split(':').nth(1).and_then(|raw| raw.parse::<i32>().ok())
}

pub fn format_date(moment: NaiveDateTime) -> String {
    moment.format("%d.%m.%Y").to_string()
}

pub fn format_time(moment: NaiveDateTime) -> String {
    moment.format("%H:%M").to_string()
}

/// Bloque de texto de una reserva para los listados.
pub fn booking_block(info: &BookingInfo, viewer_is_client: bool) -> String {
    let counterpart_label = if viewer_is_client { "Entrenador" } else { "Cliente" };
    let counterpart = if viewer_is_client { &info.trainer_name } else { &info.client_name };
    format!(
        "*Reserva #{}*\n*Fecha:* {}\n*Hora:* {} - {}\n*{}:* {}\n*Precio:* {}\n*Estado:* {}\n\n",
        info.id,
        format_date(info.starts_at),
        format_time(info.starts_at),
        format_time(info.ends_at),
        counterpart_label,
        counterpart,
        format_mxn(info.price_cents),
        booking_status_label(&info.status),
    )
}

pub fn paginate(total: usize, page: usize, per_page: usize) -> (usize, usize, usize) {
    let total_pages = (total + per_page - 1) / per_page;
    let page = page.min(total_pages.saturating_sub(1));
    let start = page * per_page;
    let end = std::cmp::min(start + per_page, total);
    (start, end, total_pages)
}

pub fn nav_row(prefix: &str, page: usize, total_pages: usize) -> Vec<InlineKeyboardButton> {
    let mut row = vec![];
    if page > 0 {
        row.push(InlineKeyboardButton::callback(
            "⬅️ Anterior",
            format!("{}:{}", prefix, page - 1),
        ));
    }
    row.push(InlineKeyboardButton::callback(
        format!("📄 {}/{}", page + 1, total_pages),
        "ignore".to_string(),
    ));
    if page + 1 < total_pages {
        row.push(InlineKeyboardButton::callback(
            "Siguiente ➡️",
            format!("{}:{}", prefix, page + 1),
        ));
    }
    row
}

// ---------- calendario ----------

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "Enero",
        2 => "Febrero",
        3 => "Marzo",
        4 => "Abril",
        5 => "Mayo",
        6 => "Junio",
        7 => "Julio",
        8 => "Agosto",
        9 => "Septiembre",
        10 => "Octubre",
        11 => "Noviembre",
        12 => "Diciembre",
        _ => "",
    }
}

pub fn days_in_month(month: u32, year: i32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

pub fn shift_month(month: u32, year: i32, forward: bool) -> (u32, i32) {
    if forward {
        if month == 12 {
            (1, year + 1)
        } else {
            (month + 1, year)
        }
    } else if month == 1 {
        (12, year - 1)
    } else {
        (month - 1, year)
    }
}

pub fn day_is_bookable(
    date: NaiveDate,
    today: NaiveDate,
    windows: &[Option<(NaiveTime, NaiveTime)>; 7],
) -> bool {
    date >= today && windows[date.weekday().num_days_from_monday() as usize].is_some()
}

/// Calendario mensual inline: días sin ventana semanal (o pasados) van
/// marcados con ❌, el resto dispara "cal:select:<fecha>".
pub fn generate_calendar(
    month: u32,
    year: i32,
    windows: &[Option<(NaiveTime, NaiveTime)>; 7],
) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    keyboard.push(vec![InlineKeyboardButton::callback(
        format!("📅 {} {}", month_name(month), year),
        "ignore".to_string(),
    )]);

    let weekdays = vec!["Lu", "Ma", "Mi", "Ju", "Vi", "Sá", "Do"];
    keyboard.push(
        weekdays
            .into_iter()
            .map(|day| InlineKeyboardButton::callback(day.to_string(), "ignore".to_string()))
            .collect(),
    );

    if let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) {
        let today = Local::now().date_naive();
        let mut row: Vec<InlineKeyboardButton> = Vec::new();
        let num_days = days_in_month(month, year);

        let shift = first_day.weekday().num_days_from_monday() as usize;
        for _ in 0..shift {
            row.push(InlineKeyboardButton::callback(" ".to_string(), "ignore".to_string()));
        }

        for day in 1..=num_days {
            let date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or(first_day);
            if date < today {
                row.push(InlineKeyboardButton::callback(
                    format!("❌ {}", day),
                    "ignore".to_string(),
                ));
            } else {
                let callback = format!("cal:select:{}", date);
                let label = if day_is_bookable(date, today, windows) {
                    format!("{:2}", day)
                } else {
                    format!("❌ {:2}", day)
                };
                row.push(InlineKeyboardButton::callback(label, callback));
            }

            if row.len() == 7 {
                keyboard.push(row.clone());
                row.clear();
            }
        }

        if !row.is_empty() {
            while row.len() < 7 {
                row.push(InlineKeyboardButton::callback(" ".to_string(), "ignore".to_string()));
            }
            keyboard.push(row);
        }
    }

    keyboard.push(vec![
        InlineKeyboardButton::callback("< Mes", format!("cal:nav:{}:{}:prev", month, year)),
        InlineKeyboardButton::callback("Mes >", format!("cal:nav:{}:{}:next", month, year)),
    ]);
    keyboard.push(vec![InlineKeyboardButton::callback(
        "⟵ Volver a entrenadores".to_string(),
        "back_trainers".to_string(),
    )]);

    InlineKeyboardMarkup::new(keyboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_extracts_second_field() {
        assert_eq!(parse_id("tr_confirm:42"), Some(42));
        assert_eq!(parse_id("tr_confirm:abc"), None);
        assert_eq!(parse_id("solo"), None);
    }

    #[test]
    fn paginate_clamps_page() {
        // 7 elementos, 3 por página -> 3 páginas
        assert_eq!(paginate(7, 0, 3), (0, 3, 3));
        assert_eq!(paginate(7, 2, 3), (6, 7, 3));
        // página fuera de rango cae a la última
        assert_eq!(paginate(7, 9, 3), (6, 7, 3));
        assert_eq!(paginate(0, 0, 3), (0, 0, 0));
    }

    #[test]
    fn shift_month_wraps_years() {
        assert_eq!(shift_month(12, 2026, true), (1, 2027));
        assert_eq!(shift_month(1, 2026, false), (12, 2025));
        assert_eq!(shift_month(6, 2026, true), (7, 2026));
    }

    #[test]
    fn february_leap_years() {
        assert_eq!(days_in_month(2, 2024), 29);
        assert_eq!(days_in_month(2, 2026), 28);
        assert_eq!(days_in_month(2, 2000), 29);
        assert_eq!(days_in_month(2, 1900), 28);
    }

    #[test]
    fn bookable_needs_future_date_and_window() {
        let window = NaiveTime::from_hms_opt(7, 0, 0).zip(NaiveTime::from_hms_opt(14, 0, 0));
        let mut windows: [Option<(NaiveTime, NaiveTime)>; 7] = [None; 7];
        windows[0] = window; // lunes

        let monday = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 11).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();

        assert!(day_is_bookable(monday, today, &windows));
        assert!(!day_is_bookable(tuesday, today, &windows));
        // mismo lunes pero ya pasado
        assert!(!day_is_bookable(monday, NaiveDate::from_ymd_opt(2026, 8, 12).unwrap(), &windows));
    }
}
