use std::{collections::HashMap, sync::Arc};

use config::Config;
use db::{get_db_pool, seed_admins};
use handlers::{handle_callback_query, handle_message, AppState, UserSession};
use payments::PaymentsClient;
use tokio::sync::Mutex;
mod bookings;
mod config;
mod db;
mod error;
mod handlers;
mod messaging;
mod models;
mod payments;
mod reviews;
mod slots;
mod stats;
use teloxide::{
    dispatching::UpdateFilterExt,
    prelude::*,
    types::{CallbackQuery, MaybeInaccessibleMessage},
};

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config = Config::from_env().expect("configuración incompleta");
    let pool = get_db_pool(&config.database_url)
        .await
        .expect("no se pudo conectar a la base de datos");
    seed_admins(&pool, &config.admin_telegram_ids)
        .await
        .expect("no se pudieron registrar los administradores");

    let payments = PaymentsClient::new(
        config.payments_base_url.clone(),
        config.payments_secret_key.clone(),
    );
    let state = Arc::new(AppState { pool, config, payments });

    let bot = Bot::from_env();
    let user_sessions = Arc::new(Mutex::new(HashMap::<i64, UserSession>::new()));

    info!("entrenabot arrancando");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let state = state.clone();
            let user_sessions = user_sessions.clone();

            move |bot: Bot, msg: Message| {
                let state = state.clone();
                let user_sessions = user_sessions.clone();

                async move {
                    let mut sessions = user_sessions.lock().await;
                    if let Err(e) = handle_message(bot, msg, state, &mut sessions).await {
                        error!("error manejando mensaje: {}", e);
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = state.clone();
            let user_sessions = user_sessions.clone();

            move |q: CallbackQuery, bot: Bot| {
                let state = state.clone();
                let user_sessions = user_sessions.clone();

                async move {
                    let mut sessions = user_sessions.lock().await;
                    let query = q.clone();
                    if let Some(q_message) = query.message {
                        if let Some(message) = MaybeInaccessibleMessage::regular_message(&q_message)
                        {
                            if let Err(e) = handle_callback_query(
                                q,
                                bot,
                                message.clone(),
                                state,
                                &mut sessions,
                            )
                            .await
                            {
                                error!("error manejando callback: {}", e);
                            }
                        }
                    }
                    respond(())
                }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
