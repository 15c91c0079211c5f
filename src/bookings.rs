use chrono::NaiveDateTime;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::BookingInfo;

const INFO_SELECT: &str =
    "SELECT b.id, b.client_id, b.trainer_id, b.starts_at, b.ends_at, b.status,
            c.name as client_name, t.name as trainer_name, tp.price_cents
     FROM bookings b
     JOIN users c ON c.id = b.client_id
     JOIN users t ON t.id = b.trainer_id
     JOIN trainer_profiles tp ON tp.user_id = b.trainer_id";

pub async fn create_booking(
    pool: &PgPool,
    client_id: i32,
    trainer_id: i32,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
) -> Result<i32, AppError> {
    let booking_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO bookings (client_id, trainer_id, starts_at, ends_at, status)
         VALUES ($1, $2, $3, $4, 'pending')
         RETURNING id",
    )
    .bind(client_id)
    .bind(trainer_id)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(pool)
    .await?;

    Ok(booking_id)
}

pub async fn find_info(pool: &PgPool, booking_id: i32) -> Result<Option<BookingInfo>, AppError> {
    let info = sqlx::query_as::<_, BookingInfo>(&format!("{} WHERE b.id = $1", INFO_SELECT))
        .bind(booking_id)
        .fetch_optional(pool)
        .await?;
    Ok(info)
}

/// Reservas de un cliente, las más recientes primero.
pub async fn for_client(pool: &PgPool, client_id: i32) -> Result<Vec<BookingInfo>, AppError> {
    let bookings = sqlx::query_as::<_, BookingInfo>(&format!(
        "{} WHERE b.client_id = $1 ORDER BY b.starts_at DESC",
        INFO_SELECT
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await?;
    Ok(bookings)
}

/// Sesiones de un entrenador; `upcoming_only` deja fuera historial y canceladas.
pub async fn for_trainer(
    pool: &PgPool,
    trainer_id: i32,
    upcoming_only: bool,
) -> Result<Vec<BookingInfo>, AppError> {
    let sql = if upcoming_only {
        format!(
            "{} WHERE b.trainer_id = $1
             AND b.starts_at >= CURRENT_TIMESTAMP
             AND b.status IN ('pending', 'confirmed')
             ORDER BY b.starts_at ASC",
            INFO_SELECT
        )
    } else {
        format!("{} WHERE b.trainer_id = $1 ORDER BY b.starts_at DESC", INFO_SELECT)
    };

    let bookings = sqlx::query_as::<_, BookingInfo>(&sql)
        .bind(trainer_id)
        .fetch_all(pool)
        .await?;
    Ok(bookings)
}

pub async fn set_status(pool: &PgPool, booking_id: i32, status: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE bookings SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(booking_id)
        .execute(pool)
        .await?;
    Ok(())
}
