use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Payment, PaymentMethod};

/// Cliente del procesador de pagos. El secreto vive del lado del servidor;
/// el procesador expone cargos con tarjeta (URL de checkout alojado) y
/// fichas de pago en efectivo OXXO (referencia + vencimiento).
#[derive(Debug, Clone)]
pub struct PaymentsClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    amount: i64,
    currency: &'static str,
    description: &'a str,
    method: &'a str,
    reference: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChargeResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub voucher: Option<VoucherDetails>,
}

#[derive(Debug, Deserialize)]
pub struct VoucherDetails {
    pub reference: String,
    pub expires_at: DateTime<Utc>,
}

impl PaymentsClient {
    pub fn new(base_url: String, secret_key: String) -> PaymentsClient {
        PaymentsClient {
            http: reqwest::Client::new(),
            base_url,
            secret_key,
        }
    }

    /// Crea un cargo con tarjeta; devuelve id externo y URL de checkout.
    pub async fn create_card_charge(
        &self,
        amount_cents: i64,
        description: &str,
        reference: &str,
    ) -> Result<ChargeResponse, AppError> {
        let charge = self.create_charge(amount_cents, description, "card", reference).await?;
        if charge.checkout_url.is_none() {
            return Err(AppError::payments_protocol(
                "cargo con tarjeta sin checkout_url",
            ));
        }
        Ok(charge)
    }

    /// Emite una ficha OXXO; devuelve referencia y fecha de vencimiento.
    pub async fn create_oxxo_voucher(
        &self,
        amount_cents: i64,
        description: &str,
        reference: &str,
    ) -> Result<ChargeResponse, AppError> {
        let charge = self.create_charge(amount_cents, description, "oxxo", reference).await?;
        if charge.voucher.is_none() {
            return Err(AppError::payments_protocol("cargo oxxo sin voucher"));
        }
        Ok(charge)
    }

    async fn create_charge(
        &self,
        amount_cents: i64,
        description: &str,
        method: &str,
        reference: &str,
    ) -> Result<ChargeResponse, AppError> {
        let body = ChargeRequest {
            amount: amount_cents,
            currency: "mxn",
            description,
            method,
            reference,
        };

        let response = self
            .http
            .post(format!("{}/v1/charges", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChargeResponse>()
            .await?;

        Ok(response)
    }

    /// Consulta el estado actual de un cargo ya creado.
    pub async fn fetch_charge(&self, external_id: &str) -> Result<ChargeResponse, AppError> {
        let response = self
            .http
            .get(format!("{}/v1/charges/{}", self.base_url, external_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?
            .json::<ChargeResponse>()
            .await?;

        Ok(response)
    }
}

/// Reparte el monto entre plataforma y entrenador. El residuo de la
/// división entera queda del lado de la plataforma.
pub fn split_commission(amount_cents: i64, percent: u32) -> (i64, i64) {
    let commission = amount_cents * percent as i64 / 100;
    let remainder = amount_cents * percent as i64 % 100;
    let commission = if remainder > 0 { commission + 1 } else { commission };
    (commission, amount_cents - commission)
}

pub async fn record_payment(
    pool: &PgPool,
    booking_id: i32,
    amount_cents: i64,
    commission_cents: i64,
    trainer_cents: i64,
    method: PaymentMethod,
    external_id: &str,
    voucher_reference: Option<&str>,
    voucher_expires_at: Option<NaiveDateTime>,
) -> Result<i32, AppError> {
    let payment_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO payments (booking_id, amount_cents, commission_cents, trainer_cents,
                               method, status, external_id, voucher_reference, voucher_expires_at)
         VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8)
         RETURNING id",
    )
    .bind(booking_id)
    .bind(amount_cents)
    .bind(commission_cents)
    .bind(trainer_cents)
    .bind(method.as_str())
    .bind(external_id)
    .bind(voucher_reference)
    .bind(voucher_expires_at)
    .fetch_one(pool)
    .await?;

    Ok(payment_id)
}

pub async fn find_payment(pool: &PgPool, payment_id: i32) -> Result<Option<Payment>, AppError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT id, booking_id, amount_cents, commission_cents, trainer_cents,
                method, status, external_id, voucher_reference, voucher_expires_at
         FROM payments WHERE id = $1",
    )
    .bind(payment_id)
    .fetch_optional(pool)
    .await?;
    Ok(payment)
}

pub async fn find_payment_by_booking(
    pool: &PgPool,
    booking_id: i32,
) -> Result<Option<Payment>, AppError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT id, booking_id, amount_cents, commission_cents, trainer_cents,
                method, status, external_id, voucher_reference, voucher_expires_at
         FROM payments WHERE booking_id = $1
         ORDER BY id DESC",
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;
    Ok(payment)
}

pub async fn set_payment_status(
    pool: &PgPool,
    payment_id: i32,
    status: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE payments SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(payment_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exact_when_divisible() {
        // 15% de $500.00
        assert_eq!(split_commission(50000, 15), (7500, 42500));
        assert_eq!(split_commission(50000, 0), (0, 50000));
        assert_eq!(split_commission(50000, 100), (50000, 0));
    }

    #[test]
    fn split_remainder_goes_to_platform() {
        // 15% de $3.33 = 49.95 centavos -> 50 para la plataforma
        let (commission, trainer) = split_commission(333, 15);
        assert_eq!(commission, 50);
        assert_eq!(trainer, 283);
        assert_eq!(commission + trainer, 333);
    }

    #[test]
    fn split_never_loses_a_centavo() {
        for amount in [1, 99, 101, 4999, 123457] {
            for percent in [0, 1, 15, 50, 99, 100] {
                let (commission, trainer) = split_commission(amount, percent);
                assert_eq!(commission + trainer, amount);
                assert!(commission >= 0 && trainer >= 0);
            }
        }
    }

    #[test]
    fn charge_response_parses_voucher() {
        let raw = r#"{
            "id": "ch_123",
            "status": "pending",
            "voucher": {"reference": "93000123456789", "expires_at": "2026-08-08T23:59:59Z"}
        }"#;
        let charge: ChargeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(charge.id, "ch_123");
        assert!(charge.checkout_url.is_none());
        let voucher = charge.voucher.unwrap();
        assert_eq!(voucher.reference, "93000123456789");
    }

    #[test]
    fn charge_response_parses_card() {
        let raw = r#"{"id": "ch_9", "status": "pending", "checkout_url": "https://pay.example/ch_9"}"#;
        let charge: ChargeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(charge.checkout_url.as_deref(), Some("https://pay.example/ch_9"));
        assert!(charge.voucher.is_none());
    }
}
