//! PostgreSQL-backed store for bill-service.

use crate::models::{
    Bill, BillChanges, BillItem, BillLine, CreateCustomer, CreateService, Customer, NewBill,
    Service, UpdateCustomer, UpdateService,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{Store, StoreError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{info, instrument, warn};

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, address, created_at, updated_at, is_deleted";

const SERVICE_COLUMNS: &str = "id, name, description, price, created_at, updated_at, is_deleted";

const BILL_SELECT: &str = r#"
    SELECT b.id, b.bill_number, b.customer_id, c.name AS customer_name,
           b.total, b.date, b.is_paid, b.created_at, b.updated_at, b.is_deleted
    FROM bills b
    LEFT JOIN customers c ON c.id = b.customer_id
"#;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "bill-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Load items for every bill in `bills`, ordered by position.
    async fn attach_items(&self, bills: &mut [Bill]) -> Result<(), StoreError> {
        if bills.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = bills.iter().map(|b| b.id).collect();
        let items = sqlx::query_as::<_, BillItem>(
            r#"
            SELECT i.id, i.bill_id, i.service_id, s.name AS service_name,
                   i.position, i.quantity, i.unit_price, i.line_total
            FROM bill_items i
            LEFT JOIN services s ON s.id = i.service_id
            WHERE i.bill_id = ANY($1)
            ORDER BY i.bill_id, i.position, i.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for item in items {
            if let Some(bill) = bills.iter_mut().find(|b| b.id == item.bill_id) {
                bill.items.push(item);
            }
        }
        Ok(())
    }

    /// Header, items and total of a new bill. Runs inside the caller's transaction.
    async fn write_bill(conn: &mut PgConnection, bill: &NewBill<'_>) -> Result<i64, StoreError> {
        let bill_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bills (bill_number, customer_id, total, date, is_paid)
            VALUES ($1, $2, 0, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&bill.bill_number)
        .bind(bill.customer_id)
        .bind(bill.date)
        .bind(bill.is_paid)
        .fetch_one(&mut *conn)
        .await?;

        Self::write_items(conn, bill_id, &bill.draft.lines).await?;
        Self::write_total(conn, bill_id, bill.draft.total).await?;

        Ok(bill_id)
    }

    async fn write_items(
        conn: &mut PgConnection,
        bill_id: i64,
        lines: &[BillLine],
    ) -> Result<(), StoreError> {
        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO bill_items (bill_id, service_id, position, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(bill_id)
            .bind(line.service_id)
            .bind(position as i32)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn write_total(
        conn: &mut PgConnection,
        bill_id: i64,
        total: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE bills SET total = $2, updated_at = NOW() WHERE id = $1")
            .bind(bill_id)
            .bind(total)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Header changes and optional item replacement. `None` when the bill is gone.
    async fn write_changes(
        conn: &mut PgConnection,
        id: i64,
        changes: &BillChanges,
    ) -> Result<Option<i64>, StoreError> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE bills
            SET customer_id = COALESCE($2, customer_id),
                date = COALESCE($3, date),
                is_paid = COALESCE($4, is_paid),
                updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.customer_id)
        .bind(changes.date)
        .bind(changes.is_paid)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(bill_id) = updated else {
            return Ok(None);
        };

        if let Some(draft) = &changes.draft {
            sqlx::query("DELETE FROM bill_items WHERE bill_id = $1")
                .bind(bill_id)
                .execute(&mut *conn)
                .await?;
            Self::write_items(conn, bill_id, &draft.lines).await?;
            Self::write_total(conn, bill_id, draft.total).await?;
        }

        Ok(Some(bill_id))
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Customer Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE is_deleted = FALSE ORDER BY id",
            CUSTOMER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(customers)
    }

    #[instrument(skip(self), fields(customer_id = id))]
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE id = $1 AND is_deleted = FALSE",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(customer)
    }

    #[instrument(skip(self, input))]
    async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (name, email, phone, address)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        info!(customer_id = customer.id, "Customer created");
        Ok(customer)
    }

    #[instrument(skip(self, input), fields(customer_id = id))]
    async fn update_customer(
        &self,
        id: i64,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = id))]
    async fn delete_customer(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE customers SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Service Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_services"])
            .start_timer();

        let services = sqlx::query_as::<_, Service>(&format!(
            "SELECT {} FROM services WHERE is_deleted = FALSE ORDER BY id",
            SERVICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(services)
    }

    #[instrument(skip(self), fields(service_id = id))]
    async fn get_service(&self, id: i64) -> Result<Option<Service>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_service"])
            .start_timer();

        let service = sqlx::query_as::<_, Service>(&format!(
            "SELECT {} FROM services WHERE id = $1 AND is_deleted = FALSE",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(service)
    }

    #[instrument(skip(self, input))]
    async fn create_service(&self, input: &CreateService) -> Result<Service, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_service"])
            .start_timer();

        let service = sqlx::query_as::<_, Service>(&format!(
            r#"
            INSERT INTO services (name, description, price)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            SERVICE_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        info!(service_id = service.id, "Service created");
        Ok(service)
    }

    #[instrument(skip(self, input), fields(service_id = id))]
    async fn update_service(
        &self,
        id: i64,
        input: &UpdateService,
    ) -> Result<Option<Service>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_service"])
            .start_timer();

        let service = sqlx::query_as::<_, Service>(&format!(
            r#"
            UPDATE services
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING {}
            "#,
            SERVICE_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(service)
    }

    #[instrument(skip(self), fields(service_id = id))]
    async fn delete_service(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE services SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Bill Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_bills"])
            .start_timer();

        let mut bills = sqlx::query_as::<_, Bill>(&format!(
            "{} WHERE b.is_deleted = FALSE ORDER BY b.id",
            BILL_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;
        self.attach_items(&mut bills).await?;

        timer.observe_duration();
        Ok(bills)
    }

    #[instrument(skip(self), fields(bill_id = id))]
    async fn get_bill(&self, id: i64) -> Result<Option<Bill>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_bill"])
            .start_timer();

        let bill = sqlx::query_as::<_, Bill>(&format!(
            "{} WHERE b.id = $1 AND b.is_deleted = FALSE",
            BILL_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(bill) = bill else {
            return Ok(None);
        };
        let mut bills = vec![bill];
        self.attach_items(&mut bills).await?;

        timer.observe_duration();
        Ok(bills.pop())
    }

    #[instrument(skip(self))]
    async fn max_bill_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["max_bill_number"])
            .start_timer();

        let number: Option<String> = sqlx::query_scalar(
            r#"
            SELECT bill_number
            FROM bills
            WHERE starts_with(bill_number, $1)
            ORDER BY bill_number COLLATE "C" DESC
            LIMIT 1
            "#,
        )
        .bind(prefix)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(number)
    }

    #[instrument(skip(self, bill), fields(bill_number = %bill.bill_number))]
    async fn insert_bill(&self, bill: &NewBill<'_>) -> Result<Bill, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_bill"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let bill_id = match Self::write_bill(&mut *tx, bill).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        timer.observe_duration();

        self.get_bill(bill_id).await?.ok_or_else(|| {
            StoreError::Backend(format!("Bill {} not readable after commit", bill_id))
        })
    }

    #[instrument(skip(self, changes), fields(bill_id = id))]
    async fn update_bill(
        &self,
        id: i64,
        changes: &BillChanges,
    ) -> Result<Option<Bill>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_bill"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let updated = match Self::write_changes(&mut *tx, id, changes).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                return Err(e);
            }
        };

        let Some(bill_id) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };
        tx.commit().await?;

        timer.observe_duration();
        self.get_bill(bill_id).await
    }

    #[instrument(skip(self), fields(bill_id = id))]
    async fn toggle_bill_paid(&self, id: i64) -> Result<Option<Bill>, StoreError> {
        let toggled: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE bills
            SET is_paid = NOT is_paid, updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match toggled {
            Some(bill_id) => self.get_bill(bill_id).await,
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(bill_id = id))]
    async fn delete_bill(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE bills SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
