use crate::error::DbError;
use crate::models::Service;
use crate::DbClient;
use sqlx::Row;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct SqlServiceRepository {
    db_client: DbClient,
}

impl SqlServiceRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    pub async fn init_schema(&self) -> Result<(), DbError> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                shop_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                price DOUBLE NOT NULL,
                duration_minutes BIGINT NOT NULL
            )
        "#;
        self.db_client.execute(query).await?;
        Ok(())
    }

    fn map_row(row: &sqlx::any::AnyRow) -> Service {
        Service {
            id: row.try_get("id").ok(),
            shop_id: row.try_get("shop_id").unwrap_or_default(),
            name: row.try_get("name").unwrap_or_default(),
            description: row.try_get("description").ok(),
            price: row.try_get("price").unwrap_or_default(),
            duration_minutes: row.try_get("duration_minutes").unwrap_or_default(),
        }
    }

    pub async fn create(&self, service: &Service) -> Result<Service, DbError> {
        debug!("Creating service {} for shop {}", service.name, service.shop_id);
        let query = r#"
            INSERT INTO services (shop_id, name, description, price, duration_minutes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, shop_id, name, description, price, duration_minutes
        "#;
        let row = sqlx::query(query)
            .bind(service.shop_id)
            .bind(&service.name)
            .bind(&service.description)
            .bind(service.price)
            .bind(service.duration_minutes)
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert service: {}", e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(Self::map_row(&row))
    }

    pub async fn find_by_id(&self, id: i64, shop_id: i64) -> Result<Option<Service>, DbError> {
        let query = "SELECT id, shop_id, name, description, price, duration_minutes FROM services WHERE id = $1 AND shop_id = $2";
        let row = sqlx::query(query)
            .bind(id)
            .bind(shop_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(row.as_ref().map(Self::map_row))
    }

    /// Ordered by `id` — the source's service lists are presented in
    /// insertion order, which a strictly-increasing autoincrement id matches.
    pub async fn find_by_shop(&self, shop_id: i64) -> Result<Vec<Service>, DbError> {
        let query =
            "SELECT id, shop_id, name, description, price, duration_minutes FROM services WHERE shop_id = $1 ORDER BY id";
        let rows = sqlx::query(query)
            .bind(shop_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(rows.iter().map(Self::map_row).collect())
    }
}
