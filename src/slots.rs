use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use sqlx::PgPool;

use crate::error::AppError;

/// Jornada máxima de la plataforma. Las ventanas semanales de cada
/// entrenador viven dentro de estos límites.
pub const OPEN_MINUTE: u32 = 6 * 60;
pub const CLOSE_MINUTE: u32 = 22 * 60;
pub const SLOT_MINUTES: u32 = 30;
pub const SESSION_MINUTES: u32 = 60;

pub fn minute_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

pub fn time_from_minute(minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

/// Inicios libres de sesión (60 min) dentro de la ventana del día, en la
/// rejilla de media hora, descontando las reservas que se traslapan.
/// `busy` son intervalos (inicio, fin) en minutos desde medianoche.
pub fn compute_free_starts(window: Option<(u32, u32)>, busy: &[(u32, u32)]) -> Vec<u32> {
    let (work_start, work_end) = match window {
        Some(window) => window,
        None => return vec![],
    };

    let start = work_start.max(OPEN_MINUTE);
    let end = work_end.min(CLOSE_MINUTE);

    let mut free = vec![];
    let mut current = start;
    // alinear a la rejilla de media hora
    if current % SLOT_MINUTES != 0 {
        current += SLOT_MINUTES - current % SLOT_MINUTES;
    }

    while current + SESSION_MINUTES <= end {
        let session_end = current + SESSION_MINUTES;
        let overlaps = busy
            .iter()
            .any(|(busy_start, busy_end)| current < *busy_end && session_end > *busy_start);
        if !overlaps {
            free.push(current);
        }
        current += SLOT_MINUTES;
    }

    free
}

/// "HH:MM-HH:MM" para un inicio de sesión en minutos.
pub fn slot_label(start_minute: u32) -> String {
    let end_minute = start_minute + SESSION_MINUTES;
    format!(
        "{:02}:{:02}-{:02}:{:02}",
        start_minute / 60,
        start_minute % 60,
        end_minute / 60,
        end_minute % 60
    )
}

/// Ventana semanal "HH:MM-HH:MM" escrita por el entrenador. Debe caer en la
/// rejilla de media hora y dentro de la jornada de la plataforma.
pub fn parse_window(raw: &str) -> Option<(NaiveTime, NaiveTime)> {
    let parts: Vec<&str> = raw.trim().split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let start = parse_grid_time(parts[0])?;
    let end = parse_grid_time(parts[1])?;
    let (start_minute, end_minute) = (minute_of(start), minute_of(end));
    if start_minute >= end_minute || start_minute < OPEN_MINUTE || end_minute > CLOSE_MINUTE {
        return None;
    }
    Some((start, end))
}

fn parse_grid_time(raw: &str) -> Option<NaiveTime> {
    let pieces: Vec<&str> = raw.trim().split(':').collect();
    if pieces.len() != 2 {
        return None;
    }
    let hour = pieces[0].parse::<u32>().ok()?;
    let minute = pieces[1].parse::<u32>().ok()?;
    if minute % SLOT_MINUTES != 0 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Ventanas semanales del entrenador indexadas 0=lunes..6=domingo.
pub async fn weekly_windows(
    pool: &PgPool,
    trainer_id: i32,
) -> Result<[Option<(NaiveTime, NaiveTime)>; 7], AppError> {
    let rows = sqlx::query_as::<_, (i16, NaiveTime, NaiveTime)>(
        "SELECT weekday, work_start, work_end FROM trainer_availability WHERE trainer_id = $1",
    )
    .bind(trainer_id)
    .fetch_all(pool)
    .await?;

    let mut windows: [Option<(NaiveTime, NaiveTime)>; 7] = [None; 7];
    for (weekday, work_start, work_end) in rows {
        if (0..7).contains(&weekday) {
            windows[weekday as usize] = Some((work_start, work_end));
        }
    }
    Ok(windows)
}

/// Inicios libres para un entrenador en una fecha: ventana del día de la
/// semana menos reservas no canceladas de esa fecha.
pub async fn free_starts_for_date(
    pool: &PgPool,
    trainer_id: i32,
    date: NaiveDate,
) -> Result<Vec<u32>, AppError> {
    let weekday = date.weekday().num_days_from_monday() as i16;

    let window = sqlx::query_as::<_, (NaiveTime, NaiveTime)>(
        "SELECT work_start, work_end FROM trainer_availability
         WHERE trainer_id = $1 AND weekday = $2",
    )
    .bind(trainer_id)
    .bind(weekday)
    .fetch_optional(pool)
    .await?;

    let window = window.map(|(start, end)| (minute_of(start), minute_of(end)));

    let bookings = sqlx::query_as::<_, (chrono::NaiveDateTime, chrono::NaiveDateTime)>(
        "SELECT starts_at, ends_at FROM bookings
         WHERE trainer_id = $1
         AND starts_at::date = $2
         AND status != 'cancelled'",
    )
    .bind(trainer_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    let busy: Vec<(u32, u32)> = bookings
        .iter()
        .map(|(starts_at, ends_at)| (minute_of(starts_at.time()), minute_of(ends_at.time())))
        .collect();

    Ok(compute_free_starts(window, &busy))
}

/// Reverifica un inicio concreto justo antes de insertar la reserva. Dos
/// clientes pueden pasar la verificación a la vez; no hay candado que lo
/// impida, solo esta última lectura.
pub async fn start_is_still_free(
    pool: &PgPool,
    trainer_id: i32,
    date: NaiveDate,
    start_minute: u32,
) -> Result<bool, AppError> {
    let free = free_starts_for_date(pool, trainer_id, date).await?;
    Ok(free.contains(&start_minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_h: u32, end_h: u32) -> Option<(u32, u32)> {
        Some((start_h * 60, end_h * 60))
    }

    #[test]
    fn no_window_means_no_slots() {
        assert!(compute_free_starts(None, &[]).is_empty());
    }

    #[test]
    fn empty_day_yields_half_hour_grid() {
        let free = compute_free_starts(window(7, 10), &[]);
        // 07:00, 07:30, 08:00, 08:30, 09:00: la sesión de 60 min debe caber
        assert_eq!(free, vec![420, 450, 480, 510, 540]);
    }

    #[test]
    fn booked_hour_blocks_overlapping_starts() {
        // reserva 08:00-09:00 dentro de ventana 07:00-10:00
        let free = compute_free_starts(window(7, 10), &[(480, 540)]);
        // 07:30 y 08:30 traslapan; solo quedan 07:00 y 09:00
        assert_eq!(free, vec![420, 540]);
    }

    #[test]
    fn window_clamped_to_platform_hours() {
        // ventana escrita fuera de la jornada 06:00-22:00
        let free = compute_free_starts(Some((4 * 60, 23 * 60)), &[]);
        assert_eq!(free.first(), Some(&OPEN_MINUTE));
        assert_eq!(free.last(), Some(&(CLOSE_MINUTE - SESSION_MINUTES)));
    }

    #[test]
    fn session_must_fit_inside_window() {
        // ventana de solo media hora: ninguna sesión de 60 min cabe
        assert!(compute_free_starts(Some((420, 450)), &[]).is_empty());
    }

    #[test]
    fn back_to_back_bookings_leave_gaps_only() {
        let free = compute_free_starts(window(6, 9), &[(360, 420), (420, 480)]);
        // 06:00-08:00 ocupado; solo 08:00 queda
        assert_eq!(free, vec![480]);
    }

    #[test]
    fn slot_labels() {
        assert_eq!(slot_label(420), "07:00-08:00");
        assert_eq!(slot_label(570), "09:30-10:30");
    }

    #[test]
    fn parse_window_accepts_grid_times() {
        let (start, end) = parse_window("07:00-14:30").unwrap();
        assert_eq!(minute_of(start), 420);
        assert_eq!(minute_of(end), 870);
        assert!(parse_window(" 06:00 - 22:00 ").is_some());
    }

    #[test]
    fn parse_window_rejects_bad_input() {
        assert!(parse_window("07:15-14:00").is_none()); // fuera de rejilla
        assert!(parse_window("14:00-07:00").is_none()); // invertida
        assert!(parse_window("05:00-10:00").is_none()); // antes de abrir
        assert!(parse_window("20:00-23:00").is_none()); // después de cerrar
        assert!(parse_window("mañana").is_none());
        assert!(parse_window("07:00").is_none());
    }

    #[test]
    fn minute_time_round_trip() {
        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(time_from_minute(minute_of(time)), time);
    }
}
