use crate::error::DbError;
use crate::models::Professional;
use crate::DbClient;
use sqlx::Row;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct SqlProfessionalRepository {
    db_client: DbClient,
}

impl SqlProfessionalRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    pub async fn init_schema(&self) -> Result<(), DbError> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS professionals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                shop_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                display_order BIGINT NOT NULL DEFAULT 0,
                UNIQUE(shop_id, name)
            )
        "#;
        self.db_client.execute(query).await?;
        Ok(())
    }

    fn map_row(row: &sqlx::any::AnyRow) -> Professional {
        Professional {
            id: row.try_get("id").ok(),
            shop_id: row.try_get("shop_id").unwrap_or_default(),
            name: row.try_get("name").unwrap_or_default(),
            active: row.try_get("active").unwrap_or(true),
            display_order: row.try_get("display_order").unwrap_or_default(),
        }
    }

    pub async fn create(&self, professional: &Professional) -> Result<Professional, DbError> {
        debug!(
            "Creating professional {} for shop {}",
            professional.name, professional.shop_id
        );
        let query = r#"
            INSERT INTO professionals (shop_id, name, active, display_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id, shop_id, name, active, display_order
        "#;
        let row = sqlx::query(query)
            .bind(professional.shop_id)
            .bind(&professional.name)
            .bind(professional.active)
            .bind(professional.display_order)
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert professional: {}", e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(Self::map_row(&row))
    }

    pub async fn find_by_id(
        &self,
        id: i64,
        shop_id: i64,
    ) -> Result<Option<Professional>, DbError> {
        let query =
            "SELECT id, shop_id, name, active, display_order FROM professionals WHERE id = $1 AND shop_id = $2";
        let row = sqlx::query(query)
            .bind(id)
            .bind(shop_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(row.as_ref().map(Self::map_row))
    }

    /// Active professionals for a shop, ordered by `display_order` — the
    /// order the staff-selection list is shown in and the order
    /// `pick_any_available` scans when auto-assigning.
    pub async fn find_active_by_shop(&self, shop_id: i64) -> Result<Vec<Professional>, DbError> {
        let query = "SELECT id, shop_id, name, active, display_order FROM professionals WHERE shop_id = $1 AND active = true ORDER BY display_order, id";
        let rows = sqlx::query(query)
            .bind(shop_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(rows.iter().map(Self::map_row).collect())
    }
}
