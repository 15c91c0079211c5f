use sqlx::PgPool;

use crate::error::AppError;
use crate::models::Review;

/// Reseña con los nombres que piden los listados.
#[derive(Debug, sqlx::FromRow)]
pub struct ReviewInfo {
    pub id: i32,
    pub rating: i16,
    pub comment: Option<String>,
    pub client_name: String,
    pub trainer_name: String,
}

pub async fn has_review(pool: &PgPool, booking_id: i32) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM reviews WHERE booking_id = $1)",
    )
    .bind(booking_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Inserta la reseña y luego actualiza el agregado denormalizado del
/// entrenador. Son dos escrituras independientes; si la segunda falla el
/// agregado queda corto hasta la siguiente recalculada manual.
pub async fn create_review(
    pool: &PgPool,
    booking_id: i32,
    client_id: i32,
    trainer_id: i32,
    rating: i16,
    comment: Option<&str>,
) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("la calificación va de 1 a 5"));
    }
    if has_review(pool, booking_id).await? {
        return Err(AppError::validation("esta sesión ya tiene reseña"));
    }

    sqlx::query(
        "INSERT INTO reviews (booking_id, client_id, trainer_id, rating, comment)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(booking_id)
    .bind(client_id)
    .bind(trainer_id)
    .bind(rating)
    .bind(comment)
    .execute(pool)
    .await?;

    sqlx::query(
        "UPDATE trainer_profiles
         SET rating_sum = rating_sum + $1, rating_count = rating_count + 1
         WHERE user_id = $2",
    )
    .bind(rating as i64)
    .bind(trainer_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Reseñas recientes de un entrenador para su tarjeta pública.
pub async fn trainer_reviews(
    pool: &PgPool,
    trainer_id: i32,
    limit: i64,
) -> Result<Vec<ReviewInfo>, AppError> {
    let reviews = sqlx::query_as::<_, ReviewInfo>(
        "SELECT r.id, r.rating, r.comment, c.name as client_name, t.name as trainer_name
         FROM reviews r
         JOIN users c ON c.id = r.client_id
         JOIN users t ON t.id = r.trainer_id
         WHERE r.trainer_id = $1
         ORDER BY r.created_at DESC
         LIMIT $2",
    )
    .bind(trainer_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

/// Reseñas más recientes de toda la plataforma (moderación).
pub async fn recent_reviews(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<ReviewInfo>, AppError> {
    let reviews = sqlx::query_as::<_, ReviewInfo>(
        "SELECT r.id, r.rating, r.comment, c.name as client_name, t.name as trainer_name
         FROM reviews r
         JOIN users c ON c.id = r.client_id
         JOIN users t ON t.id = r.trainer_id
         ORDER BY r.created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

pub async fn count_reviews(pool: &PgPool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Borra una reseña (moderación) y descuenta el agregado del entrenador.
pub async fn delete_review(pool: &PgPool, review_id: i32) -> Result<bool, AppError> {
    let review = sqlx::query_as::<_, Review>(
        "SELECT id, booking_id, client_id, trainer_id, rating, comment
         FROM reviews WHERE id = $1",
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?;

    let review = match review {
        Some(review) => review,
        None => return Ok(false),
    };

    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(pool)
        .await?;

    sqlx::query(
        "UPDATE trainer_profiles
         SET rating_sum = GREATEST(rating_sum - $1, 0),
             rating_count = GREATEST(rating_count - 1, 0)
         WHERE user_id = $2",
    )
    .bind(review.rating as i64)
    .bind(review.trainer_id)
    .execute(pool)
    .await?;

    Ok(true)
}

/// Estrellas para los listados: "★★★★☆".
pub fn stars(rating: i16) -> String {
    let filled = rating.clamp(0, 5) as usize;
    let mut out = String::new();
    for _ in 0..filled {
        out.push('★');
    }
    for _ in filled..5 {
        out.push('☆');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stars_render() {
        assert_eq!(stars(4), "★★★★☆");
        assert_eq!(stars(0), "☆☆☆☆☆");
        assert_eq!(stars(5), "★★★★★");
        assert_eq!(stars(9), "★★★★★");
    }
}
