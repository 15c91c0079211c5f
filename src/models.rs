use chrono::NaiveDateTime;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct User {
    pub id: i32,
    pub telegram_id: i64,
    pub name: String,
    pub username: Option<String>,
    pub role: String,
    pub approved: bool,
}

#[derive(Debug, FromRow)]
pub struct TrainerProfile {
    pub user_id: i32,
    pub bio: Option<String>,
    pub specialties: Option<String>,
    pub price_cents: i64,
    pub portfolio_url: Option<String>,
    pub rating_sum: i64,
    pub rating_count: i64,
}

/// Fila combinada users + trainer_profiles para los listados del cliente.
#[derive(Debug, FromRow)]
pub struct TrainerCard {
    pub user_id: i32,
    pub name: String,
    pub specialties: Option<String>,
    pub price_cents: i64,
    pub rating_sum: i64,
    pub rating_count: i64,
}

/// Fila combinada para mostrar reservas con nombres de ambas partes.
#[derive(Debug, FromRow)]
pub struct BookingInfo {
    pub id: i32,
    pub client_id: i32,
    pub trainer_id: i32,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub status: String,
    pub client_name: String,
    pub trainer_name: String,
    pub price_cents: i64,
}

#[derive(Debug, FromRow)]
pub struct Payment {
    pub id: i32,
    pub booking_id: i32,
    pub amount_cents: i64,
    pub commission_cents: i64,
    pub trainer_cents: i64,
    pub method: String,
    pub status: String,
    pub external_id: Option<String>,
    pub voucher_reference: Option<String>,
    pub voucher_expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, FromRow)]
pub struct Conversation {
    pub id: i32,
    pub client_id: i32,
    pub trainer_id: i32,
    pub client_unread: i32,
    pub trainer_unread: i32,
    pub last_message_at: NaiveDateTime,
}

#[derive(Debug, FromRow)]
pub struct ChatMessage {
    pub id: i32,
    pub conversation_id: i32,
    pub sender_id: i32,
    pub body: String,
    pub sent_at: NaiveDateTime,
}

#[derive(Debug, FromRow)]
pub struct Review {
    pub id: i32,
    pub booking_id: i32,
    pub client_id: i32,
    pub trainer_id: i32,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<BookingStatus> {
        match raw {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "🕐 Pendiente",
            BookingStatus::Confirmed => "✅ Confirmada",
            BookingStatus::Completed => "🏁 Completada",
            BookingStatus::Cancelled => "❌ Cancelada",
        }
    }
}

/// Etiqueta para un status crudo de la base; los desconocidos se muestran tal cual.
pub fn booking_status_label(raw: &str) -> &str {
    match BookingStatus::parse(raw) {
        Some(status) => status.label(),
        None => raw,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<PaymentStatus> {
        match raw {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "expired" => Some(PaymentStatus::Expired),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "🕐 Pago pendiente",
            PaymentStatus::Paid => "💰 Pagado",
            PaymentStatus::Expired => "⌛ Vencido",
            PaymentStatus::Failed => "⚠️ Rechazado",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentMethod {
    Card,
    Oxxo,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Oxxo => "oxxo",
        }
    }
}

/// Centavos MXN a texto, ej. 45000 -> "$450.00 MXN".
pub fn format_mxn(cents: i64) -> String {
    format!("${}.{:02} MXN", cents / 100, (cents % 100).abs())
}

/// Promedio de calificaciones con un decimal, o un aviso si no hay reseñas.
pub fn format_rating(rating_sum: i64, rating_count: i64) -> String {
    if rating_count == 0 {
        "sin reseñas todavía".to_string()
    } else {
        let average = rating_sum as f64 / rating_count as f64;
        format!("⭐ {:.1} ({} reseñas)", average, rating_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_status_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("nueva"), None);
    }

    #[test]
    fn unknown_status_label_passes_through() {
        assert_eq!(booking_status_label("pending"), "🕐 Pendiente");
        assert_eq!(booking_status_label("archivada"), "archivada");
    }

    #[test]
    fn mxn_formatting() {
        assert_eq!(format_mxn(45000), "$450.00 MXN");
        assert_eq!(format_mxn(5), "$0.05 MXN");
        assert_eq!(format_mxn(100), "$1.00 MXN");
    }

    #[test]
    fn rating_formatting() {
        assert_eq!(format_rating(0, 0), "sin reseñas todavía");
        assert_eq!(format_rating(9, 2), "⭐ 4.5 (2 reseñas)");
    }
}
