use chrono::{Datelike, NaiveDate, NaiveDateTime};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::format_mxn;

/// Resumen de un mes calendario para un entrenador.
#[derive(Debug, Default, PartialEq)]
pub struct TrainerMonth {
    pub completed_sessions: i64,
    pub earnings_cents: i64,
    pub new_clients: i64,
}

/// Resumen de un mes calendario de toda la plataforma.
#[derive(Debug, Default, PartialEq)]
pub struct PlatformMonth {
    pub bookings: i64,
    pub volume_cents: i64,
    pub commission_cents: i64,
    pub signups: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionRow {
    pub starts_at: NaiveDateTime,
    pub status: String,
    pub client_id: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PaymentRow {
    pub created_at: NaiveDateTime,
    pub status: String,
    pub amount_cents: i64,
    pub commission_cents: i64,
    pub trainer_cents: i64,
}

/// Primer día del mes de `date` y primer día del mes siguiente.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap();
    let next = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1).unwrap()
    };
    (first, next)
}

/// Límites del mes anterior al de `date`.
pub fn previous_month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (first, _) = month_bounds(date);
    let last_of_previous = first.pred_opt().unwrap_or(first);
    month_bounds(last_of_previous)
}

fn in_month(moment: NaiveDateTime, from: NaiveDate, to: NaiveDate) -> bool {
    let day = moment.date();
    day >= from && day < to
}

/// Variación porcentual mes contra mes; None cuando el mes anterior fue cero.
pub fn trend_percent(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some((current - previous) as f64 * 100.0 / previous as f64)
}

pub fn trend_label(current: i64, previous: i64) -> String {
    match trend_percent(current, previous) {
        Some(percent) if percent >= 0.0 => format!("▲ +{:.1}%", percent),
        Some(percent) => format!("▼ {:.1}%", percent),
        None => "—".to_string(),
    }
}

/// Reduce las filas ya traídas a un resumen del mes: sesiones completadas,
/// clientes cuya primera reserva con el entrenador cae en el mes, y cobros
/// pagados. Una sola pasada por lista, sin SQL agregado.
pub fn reduce_trainer_month(
    sessions: &[SessionRow],
    payments: &[PaymentRow],
    from: NaiveDate,
    to: NaiveDate,
) -> TrainerMonth {
    let completed_sessions = sessions
        .iter()
        .filter(|row| row.status == "completed" && in_month(row.starts_at, from, to))
        .count() as i64;

    let earnings_cents = payments
        .iter()
        .filter(|row| row.status == "paid" && in_month(row.created_at, from, to))
        .map(|row| row.trainer_cents)
        .sum();

    // primera reserva de cada cliente en todo el historial
    let mut first_seen: std::collections::HashMap<i32, NaiveDateTime> =
        std::collections::HashMap::new();
    for row in sessions {
        let entry = first_seen.entry(row.client_id).or_insert(row.starts_at);
        if row.starts_at < *entry {
            *entry = row.starts_at;
        }
    }
    let new_clients = first_seen
        .values()
        .filter(|first| in_month(**first, from, to))
        .count() as i64;

    TrainerMonth {
        completed_sessions,
        earnings_cents,
        new_clients,
    }
}

pub fn reduce_platform_month(
    bookings: &[SessionRow],
    payments: &[PaymentRow],
    signups: &[NaiveDateTime],
    from: NaiveDate,
    to: NaiveDate,
) -> PlatformMonth {
    let bookings_count = bookings
        .iter()
        .filter(|row| in_month(row.starts_at, from, to))
        .count() as i64;

    let mut volume_cents = 0;
    let mut commission_cents = 0;
    for row in payments {
        if row.status == "paid" && in_month(row.created_at, from, to) {
            volume_cents += row.amount_cents;
            commission_cents += row.commission_cents;
        }
    }

    let signups_count = signups
        .iter()
        .filter(|moment| in_month(**moment, from, to))
        .count() as i64;

    PlatformMonth {
        bookings: bookings_count,
        volume_cents,
        commission_cents,
        signups: signups_count,
    }
}

pub async fn trainer_sessions(pool: &PgPool, trainer_id: i32) -> Result<Vec<SessionRow>, AppError> {
    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT starts_at, status, client_id FROM bookings WHERE trainer_id = $1",
    )
    .bind(trainer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn trainer_payments(pool: &PgPool, trainer_id: i32) -> Result<Vec<PaymentRow>, AppError> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT p.created_at, p.status, p.amount_cents, p.commission_cents, p.trainer_cents
         FROM payments p
         JOIN bookings b ON p.booking_id = b.id
         WHERE b.trainer_id = $1",
    )
    .bind(trainer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn all_bookings(pool: &PgPool) -> Result<Vec<SessionRow>, AppError> {
    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT starts_at, status, client_id FROM bookings",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn all_payments(pool: &PgPool) -> Result<Vec<PaymentRow>, AppError> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT created_at, status, amount_cents, commission_cents, trainer_cents FROM payments",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn all_signups(pool: &PgPool) -> Result<Vec<NaiveDateTime>, AppError> {
    let rows = sqlx::query_as::<_, (NaiveDateTime,)>("SELECT created_at FROM users")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(created_at,)| created_at).collect())
}

/// Tarjeta de estadísticas del entrenador: mes en curso contra el anterior.
pub fn trainer_stats_text(
    current: &TrainerMonth,
    previous: &TrainerMonth,
    rating_sum: i64,
    rating_count: i64,
) -> String {
    format!(
        "📊 *Tus estadísticas*\n\n\
         *Este mes*\n\
         Sesiones completadas: {} ({})\n\
         Ingresos: {} ({})\n\
         Clientes nuevos: {} ({})\n\n\
         *Mes anterior*\n\
         Sesiones: {} · Ingresos: {} · Clientes nuevos: {}\n\n\
         Calificación: {}",
        current.completed_sessions,
        trend_label(current.completed_sessions, previous.completed_sessions),
        format_mxn(current.earnings_cents),
        trend_label(current.earnings_cents, previous.earnings_cents),
        current.new_clients,
        trend_label(current.new_clients, previous.new_clients),
        previous.completed_sessions,
        format_mxn(previous.earnings_cents),
        previous.new_clients,
        crate::models::format_rating(rating_sum, rating_count),
    )
}

pub fn platform_stats_text(current: &PlatformMonth, previous: &PlatformMonth) -> String {
    format!(
        "📊 *Estadísticas de la plataforma*\n\n\
         *Este mes*\n\
         Reservas creadas: {} ({})\n\
         Volumen cobrado: {} ({})\n\
         Comisión: {} ({})\n\
         Altas nuevas: {} ({})\n\n\
         *Mes anterior*\n\
         Reservas: {} · Volumen: {} · Comisión: {} · Altas: {}",
        current.bookings,
        trend_label(current.bookings, previous.bookings),
        format_mxn(current.volume_cents),
        trend_label(current.volume_cents, previous.volume_cents),
        format_mxn(current.commission_cents),
        trend_label(current.commission_cents, previous.commission_cents),
        current.signups,
        trend_label(current.signups, previous.signups),
        previous.bookings,
        format_mxn(previous.volume_cents),
        format_mxn(previous.commission_cents),
        previous.signups,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn moment(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(10, 0, 0).unwrap()
    }

    fn session(y: i32, m: u32, d: u32, status: &str, client_id: i32) -> SessionRow {
        SessionRow {
            starts_at: moment(y, m, d),
            status: status.to_string(),
            client_id,
        }
    }

    fn payment(y: i32, m: u32, d: u32, status: &str, amount: i64, commission: i64) -> PaymentRow {
        PaymentRow {
            created_at: moment(y, m, d),
            status: status.to_string(),
            amount_cents: amount,
            commission_cents: commission,
            trainer_cents: amount - commission,
        }
    }

    #[test]
    fn month_bounds_regular_and_december() {
        assert_eq!(
            month_bounds(date(2026, 8, 15)),
            (date(2026, 8, 1), date(2026, 9, 1))
        );
        assert_eq!(
            month_bounds(date(2025, 12, 31)),
            (date(2025, 12, 1), date(2026, 1, 1))
        );
    }

    #[test]
    fn previous_month_crosses_year() {
        assert_eq!(
            previous_month_bounds(date(2026, 1, 10)),
            (date(2025, 12, 1), date(2026, 1, 1))
        );
    }

    #[test]
    fn trend_handles_zero_previous() {
        assert_eq!(trend_percent(10, 0), None);
        assert_eq!(trend_label(10, 0), "—");
        assert_eq!(trend_label(15, 10), "▲ +50.0%");
        assert_eq!(trend_label(5, 10), "▼ -50.0%");
    }

    #[test]
    fn trainer_month_counts_only_completed_in_range() {
        let sessions = vec![
            session(2026, 8, 3, "completed", 1),
            session(2026, 8, 5, "cancelled", 1),
            session(2026, 7, 20, "completed", 1),
            session(2026, 8, 9, "pending", 2),
        ];
        let payments = vec![
            payment(2026, 8, 3, "paid", 50000, 7500),
            payment(2026, 8, 9, "pending", 50000, 7500),
            payment(2026, 7, 20, "paid", 50000, 7500),
        ];
        let summary =
            reduce_trainer_month(&sessions, &payments, date(2026, 8, 1), date(2026, 9, 1));
        assert_eq!(summary.completed_sessions, 1);
        assert_eq!(summary.earnings_cents, 42500);
        // el cliente 1 ya venía de julio; solo el 2 es nuevo en agosto
        assert_eq!(summary.new_clients, 1);
    }

    #[test]
    fn platform_month_sums_paid_only() {
        let bookings = vec![
            session(2026, 8, 1, "pending", 1),
            session(2026, 8, 2, "confirmed", 2),
            session(2026, 7, 30, "completed", 3),
        ];
        let payments = vec![
            payment(2026, 8, 1, "paid", 40000, 6000),
            payment(2026, 8, 2, "failed", 40000, 6000),
        ];
        let signups = vec![moment(2026, 8, 1), moment(2026, 6, 1)];
        let summary = reduce_platform_month(
            &bookings,
            &payments,
            &signups,
            date(2026, 8, 1),
            date(2026, 9, 1),
        );
        assert_eq!(summary.bookings, 2);
        assert_eq!(summary.volume_cents, 40000);
        assert_eq!(summary.commission_cents, 6000);
        assert_eq!(summary.signups, 1);
    }
}
