use crate::client::DbTransaction;
use crate::error::DbError;
use crate::models::{Reservation, ReservationStatus};
use crate::DbClient;
use sqlx::Row;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct SqlReservationRepository {
    db_client: DbClient,
}

impl SqlReservationRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    pub async fn init_schema(&self) -> Result<(), DbError> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                shop_id BIGINT NOT NULL,
                service_id BIGINT NOT NULL,
                professional_id BIGINT,
                customer_name TEXT NOT NULL,
                customer_phone TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                duration_minutes BIGINT NOT NULL,
                status TEXT NOT NULL DEFAULT 'confirmed',
                external_event_id TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(shop_id, professional_id, date, start_time)
            )
        "#;
        self.db_client.execute(query).await?;
        Ok(())
    }

    /// The underlying client, for callers that need a transaction spanning
    /// more than one repository call (the commit protocol's capacity check
    /// + insert).
    pub fn db_client(&self) -> &DbClient {
        &self.db_client
    }

    const COLUMNS: &'static str = "id, shop_id, service_id, professional_id, customer_name, customer_phone, date, start_time, duration_minutes, status, external_event_id";

    fn map_row(row: &sqlx::any::AnyRow) -> Reservation {
        let status: String = row.try_get("status").unwrap_or_default();
        Reservation {
            id: row.try_get("id").ok(),
            shop_id: row.try_get("shop_id").unwrap_or_default(),
            service_id: row.try_get("service_id").unwrap_or_default(),
            professional_id: row.try_get("professional_id").ok(),
            customer_name: row.try_get("customer_name").unwrap_or_default(),
            customer_phone: row.try_get("customer_phone").unwrap_or_default(),
            date: row.try_get("date").unwrap_or_default(),
            start_time: row.try_get("start_time").unwrap_or_default(),
            duration_minutes: row.try_get("duration_minutes").unwrap_or_default(),
            status: ReservationStatus::from_str(&status),
            external_event_id: row.try_get("external_event_id").ok(),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Reservation>, DbError> {
        let query = format!("SELECT {} FROM reservations WHERE id = $1", Self::COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(row.as_ref().map(Self::map_row))
    }

    /// All confirmed reservations for a shop on a date — the read path used
    /// by the availability calculator's capacity count.
    pub async fn find_confirmed_by_shop_date(
        &self,
        shop_id: i64,
        date: &str,
    ) -> Result<Vec<Reservation>, DbError> {
        let query = format!(
            "SELECT {} FROM reservations WHERE shop_id = $1 AND date = $2 AND status = 'confirmed'",
            Self::COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(shop_id)
            .bind(date)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(rows.iter().map(Self::map_row).collect())
    }

    /// Future confirmed reservations for a phone number at this shop —
    /// candidates for the cancellation flow's `ask_phone` step.
    pub async fn find_confirmed_future_by_phone(
        &self,
        shop_id: i64,
        phone: &str,
        today: &str,
    ) -> Result<Vec<Reservation>, DbError> {
        let query = format!(
            "SELECT {} FROM reservations WHERE shop_id = $1 AND customer_phone = $2 AND status = 'confirmed' AND date >= $3 ORDER BY date, start_time",
            Self::COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(shop_id)
            .bind(phone)
            .bind(today)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(rows.iter().map(Self::map_row).collect())
    }

    /// Best-effort: sets `external_event_id` after the calendar publish
    /// succeeds. Failure here is logged but never fails the commit.
    pub async fn set_external_event_id(
        &self,
        id: i64,
        event_id: &str,
    ) -> Result<(), DbError> {
        let query = "UPDATE reservations SET external_event_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2";
        sqlx::query(query)
            .bind(event_id)
            .bind(id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to persist external_event_id for reservation {}: {}", id, e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(())
    }

    /// Reads confirmed reservations for a shop/date inside an in-flight
    /// transaction, so the capacity count and the insert that follows see a
    /// consistent snapshot. `lock` requests `SELECT ... FOR UPDATE`, which
    /// only the non-SQLite backends accept — callers gate it on
    /// `DbClient::supports_row_locks`.
    pub async fn find_confirmed_by_shop_date_for_update(
        &self,
        tx: &mut DbTransaction<'_>,
        shop_id: i64,
        date: &str,
        lock: bool,
    ) -> Result<Vec<Reservation>, DbError> {
        let mut query = format!(
            "SELECT {} FROM reservations WHERE shop_id = $1 AND date = $2 AND status = 'confirmed'",
            Self::COLUMNS
        );
        if lock {
            query.push_str(" FOR UPDATE");
        }
        let rows = sqlx::query(&query)
            .bind(shop_id)
            .bind(date)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(rows.iter().map(Self::map_row).collect())
    }

    /// Inserts a new confirmed reservation inside an in-flight transaction.
    /// The caller is expected to have already locked the slot and re-checked
    /// capacity in that same transaction via
    /// `find_confirmed_by_shop_date_for_update` — this is the atomic insert
    /// step of the commit, not a standalone availability check. The table's
    /// `UNIQUE(shop_id, professional_id, date, start_time)` constraint is a
    /// backstop against a professional double-booking the exact slot; it
    /// does not by itself cap shop-wide capacity since distinct `NULL`
    /// professional rows are not considered equal by the constraint.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_confirmed_tx(
        &self,
        tx: &mut DbTransaction<'_>,
        shop_id: i64,
        service_id: i64,
        professional_id: Option<i64>,
        customer_name: &str,
        customer_phone: &str,
        date: &str,
        start_time: &str,
        duration_minutes: i64,
    ) -> Result<i64, DbError> {
        let query = r#"
            INSERT INTO reservations
                (shop_id, service_id, professional_id, customer_name, customer_phone, date, start_time, duration_minutes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'confirmed')
            RETURNING id
        "#;
        let row = sqlx::query(query)
            .bind(shop_id)
            .bind(service_id)
            .bind(professional_id)
            .bind(customer_name)
            .bind(customer_phone)
            .bind(date)
            .bind(start_time)
            .bind(duration_minutes)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                let wrapped = DbError::SqlxError(e);
                if wrapped.is_unique_violation() {
                    wrapped
                } else {
                    DbError::QueryError(wrapped.to_string())
                }
            })?;
        row.try_get("id").map_err(|e| DbError::QueryError(e.to_string()))
    }

    /// All confirmed reservations for a shop/date/professional — the
    /// per-professional capacity check used when staff selection is enabled.
    pub async fn find_confirmed_by_shop_date_professional(
        &self,
        shop_id: i64,
        date: &str,
        professional_id: i64,
    ) -> Result<Vec<Reservation>, DbError> {
        let query = format!(
            "SELECT {} FROM reservations WHERE shop_id = $1 AND date = $2 AND professional_id = $3 AND status = 'confirmed'",
            Self::COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(shop_id)
            .bind(date)
            .bind(professional_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(rows.iter().map(Self::map_row).collect())
    }

    pub async fn mark_cancelled(&self, id: i64) -> Result<bool, DbError> {
        debug!("Marking reservation {} cancelled", id);
        let query = "UPDATE reservations SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = 'confirmed'";
        let result = sqlx::query(query)
            .bind(id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
