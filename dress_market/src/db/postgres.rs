//! PostgreSQL implementation of the storage traits.
//!
//! Row locks are taken with `SELECT ... FOR UPDATE`, so two transactions
//! touching the same user, item or order run one after the other. The second
//! one re-reads the row after the first commits; for competing orders on one
//! item it then sees a reserved item and fails with `ItemNotAvailable`.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::str::FromStr;
use std::sync::Arc;

use super::{
    errors::{StoreError, StoreResult},
    repository::{MarketStore, MarketTx, OrderCounts},
};
use crate::accounts::{NewUser, User, UserId};
use crate::inventory::{Item, ItemFilter, ItemId, NewItem};
use crate::ledger::{Balances, LedgerEntry, NewLedgerEntry};
use crate::orders::{NewOrder, Order, OrderFilter, OrderId, OrderWithItem};

const USER_COLUMNS: &str =
    "id, email, name, trust_score, wallet_balance, escrow_balance, avatar, created_at";

const ITEM_FIELDS: [&str; 15] = [
    "id",
    "title",
    "category",
    "brand",
    "size",
    "condition",
    "transaction_type",
    "sale_price",
    "rent_price",
    "deposit",
    "image",
    "status",
    "verified",
    "seller_id",
    "created_at",
];

const ORDER_COLUMNS: &str = "id, item_id, buyer_id, seller_id, order_type, status, escrow_amount, \
     deposit_locked, days_remaining, action_required, dispute_reason, created_at, updated_at";

const ENTRY_COLUMNS: &str =
    "id, user_id, order_id, entry_type, amount, wallet_after, escrow_after, description, created_at";

/// Prefix for item columns in order/item joins
const JOINED_ITEM_PREFIX: &str = "i_";

fn item_columns() -> String {
    ITEM_FIELDS.join(", ")
}

fn joined_item_columns() -> String {
    ITEM_FIELDS
        .iter()
        .map(|field| format!("i.{field} AS {JOINED_ITEM_PREFIX}{field}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_column<T>(row: &PgRow, table: &'static str, column: &str) -> StoreResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: String| StoreError::corrupt(table, e))
}

fn parse_optional_column<T>(row: &PgRow, table: &'static str, column: &str) -> StoreResult<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse().map_err(|e: String| StoreError::corrupt(table, e)))
        .transpose()
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        trust_score: row.try_get("trust_score")?,
        balances: Balances::new(row.try_get("wallet_balance")?, row.try_get("escrow_balance")?),
        avatar: row.try_get("avatar")?,
        created_at: row.try_get("created_at")?,
    })
}

fn item_from_row(row: &PgRow, prefix: &str) -> StoreResult<Item> {
    let col = |field: &str| format!("{prefix}{field}");
    Ok(Item {
        id: row.try_get(col("id").as_str())?,
        title: row.try_get(col("title").as_str())?,
        category: row.try_get(col("category").as_str())?,
        brand: row.try_get(col("brand").as_str())?,
        size: row.try_get(col("size").as_str())?,
        condition: row.try_get(col("condition").as_str())?,
        transaction_type: parse_column(row, "items", &col("transaction_type"))?,
        sale_price: row.try_get(col("sale_price").as_str())?,
        rent_price: row.try_get(col("rent_price").as_str())?,
        deposit: row.try_get(col("deposit").as_str())?,
        image: row.try_get(col("image").as_str())?,
        status: parse_column(row, "items", &col("status"))?,
        verified: row.try_get(col("verified").as_str())?,
        seller_id: row.try_get(col("seller_id").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
    })
}

fn order_from_row(row: &PgRow) -> StoreResult<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        buyer_id: row.try_get("buyer_id")?,
        seller_id: row.try_get("seller_id")?,
        order_type: parse_column(row, "orders", "order_type")?,
        status: parse_column(row, "orders", "status")?,
        escrow_amount: row.try_get("escrow_amount")?,
        deposit_locked: row.try_get("deposit_locked")?,
        days_remaining: row.try_get("days_remaining")?,
        action_required: parse_optional_column(row, "orders", "action_required")?,
        dispute_reason: row.try_get("dispute_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> StoreResult<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        order_id: row.try_get("order_id")?,
        entry_type: parse_column(row, "ledger_entries", "entry_type")?,
        amount: row.try_get("amount")?,
        wallet_after: row.try_get("wallet_after")?,
        escrow_after: row.try_get("escrow_after")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn counts_from_row(row: &PgRow) -> StoreResult<OrderCounts> {
    let open: i64 = row.try_get("open")?;
    let total: i64 = row.try_get("total")?;
    Ok(OrderCounts {
        open: open as usize,
        total: total as usize,
    })
}

/// Map unique-constraint violations onto [`StoreError::Conflict`]
fn map_write_error(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &error
        && db_error.is_unique_violation()
    {
        return StoreError::Conflict(db_error.message().to_string());
    }
    StoreError::Database(error)
}

/// PostgreSQL-backed market store
#[derive(Clone)]
pub struct PgMarketStore {
    pool: Arc<PgPool>,
}

impl PgMarketStore {
    /// Create a new store over a connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn begin(&self) -> StoreResult<Box<dyn MarketTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMarketTx { tx: Some(tx) }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (email, name, trust_score, avatar)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.trust_score)
            .bind(&user.avatar)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(map_write_error)?;
        user_from_row(&row)
    }

    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_item(&self, item: &NewItem) -> StoreResult<Item> {
        let sql = format!(
            "INSERT INTO items (title, category, brand, size, condition, transaction_type,
                                sale_price, rent_price, deposit, image, verified, seller_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {}",
            item_columns()
        );
        let row = sqlx::query(&sql)
            .bind(&item.title)
            .bind(&item.category)
            .bind(&item.brand)
            .bind(&item.size)
            .bind(&item.condition)
            .bind(item.transaction_type.as_str())
            .bind(item.sale_price)
            .bind(item.rent_price)
            .bind(item.deposit)
            .bind(&item.image)
            .bind(item.verified)
            .bind(item.seller_id)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(map_write_error)?;
        item_from_row(&row, "")
    }

    async fn find_item(&self, item_id: ItemId) -> StoreResult<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", item_columns());
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(|r| item_from_row(r, "")).transpose()
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR seller_id = $2)
             ORDER BY id",
            item_columns()
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.seller_id)
            .fetch_all(self.pool.as_ref())
            .await?;
        rows.iter().map(|r| item_from_row(r, "")).collect()
    }

    async fn find_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderWithItem>> {
        let sql = format!(
            "SELECT o.*, {}
             FROM orders o
             JOIN items i ON i.id = o.item_id
             WHERE ($1::BIGINT IS NULL OR o.buyer_id = $1 OR o.seller_id = $1)
               AND ($2::TEXT IS NULL OR o.status = $2)
             ORDER BY o.created_at DESC, o.id DESC",
            joined_item_columns()
        );
        let rows = sqlx::query(&sql)
            .bind(filter.participant)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderWithItem {
                    order: order_from_row(row)?,
                    item: item_from_row(row, JOINED_ITEM_PREFIX)?,
                })
            })
            .collect()
    }

    async fn ledger_entries(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

/// Open PostgreSQL transaction. Dropping it unfinished rolls back.
pub struct PgMarketTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgMarketTx {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionFinished)
    }
}

#[async_trait]
impl MarketTx for PgMarketTx {
    async fn lock_user(&mut self, user_id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.conn()?)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn lock_item(&mut self, item_id: ItemId) -> StoreResult<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = $1 FOR UPDATE", item_columns());
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(self.conn()?)
            .await?;
        row.as_ref().map(|r| item_from_row(r, "")).transpose()
    }

    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(self.conn()?)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn lock_active_rentals(&mut self) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE status = 'active_rental' AND days_remaining > 0
             ORDER BY id
             FOR UPDATE"
        );
        let rows = sqlx::query(&sql).fetch_all(self.conn()?).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn count_orders_for_user(&mut self, user_id: UserId) -> StoreResult<OrderCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE status <> 'closed') AS open, COUNT(*) AS total
            FROM orders
            WHERE buyer_id = $1 OR seller_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.conn()?)
        .await?;
        counts_from_row(&row)
    }

    async fn count_orders_for_item(&mut self, item_id: ItemId) -> StoreResult<OrderCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE status <> 'closed') AS open, COUNT(*) AS total
            FROM orders
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_one(self.conn()?)
        .await?;
        counts_from_row(&row)
    }

    async fn update_balances(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query("UPDATE users SET wallet_balance = $2, escrow_balance = $3 WHERE id = $1")
            .bind(user.id)
            .bind(user.balances.wallet)
            .bind(user.balances.escrow)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn update_item_status(&mut self, item: &Item) -> StoreResult<()> {
        sqlx::query("UPDATE items SET status = $2 WHERE id = $1")
            .bind(item.id)
            .bind(item.status.as_str())
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> StoreResult<Order> {
        let sql = format!(
            "INSERT INTO orders (item_id, buyer_id, seller_id, order_type, status, escrow_amount,
                                 deposit_locked, days_remaining, action_required)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order.item_id)
            .bind(order.buyer_id)
            .bind(order.seller_id)
            .bind(order.order_type.as_str())
            .bind(order.status.as_str())
            .bind(order.escrow_amount)
            .bind(order.deposit_locked)
            .bind(order.days_remaining)
            .bind(order.action_required.map(|a| a.as_str()))
            .fetch_one(self.conn()?)
            .await
            .map_err(map_write_error)?;
        order_from_row(&row)
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, days_remaining = $3, action_required = $4,
                dispute_reason = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.days_remaining)
        .bind(order.action_required.map(|a| a.as_str()))
        .bind(&order.dispute_reason)
        .bind(order.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &NewLedgerEntry) -> StoreResult<LedgerEntry> {
        let sql = format!(
            "INSERT INTO ledger_entries (user_id, order_id, entry_type, amount,
                                         wallet_after, escrow_after, description)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ENTRY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(entry.user_id)
            .bind(entry.order_id)
            .bind(entry.entry_type.as_str())
            .bind(entry.amount)
            .bind(entry.wallet_after)
            .bind(entry.escrow_after)
            .bind(&entry.description)
            .fetch_one(self.conn()?)
            .await?;
        entry_from_row(&row)
    }

    async fn delete_user(&mut self, user_id: UserId) -> StoreResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn delete_item(&mut self, item_id: ItemId) -> StoreResult<()> {
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionFinished)?;
        tx.commit().await?;
        Ok(())
    }
}
