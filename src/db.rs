use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn get_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Da de alta (o re-marca) las cuentas de administrador configuradas.
pub async fn seed_admins(pool: &PgPool, admin_telegram_ids: &[i64]) -> Result<(), sqlx::Error> {
    for telegram_id in admin_telegram_ids {
        sqlx::query(
            "INSERT INTO users (telegram_id, name, role, approved)
             VALUES ($1, 'Admin', 'admin', TRUE)
             ON CONFLICT (telegram_id) DO UPDATE SET role = 'admin', approved = TRUE",
        )
        .bind(telegram_id)
        .execute(pool)
        .await?;
    }
    Ok(())
}
