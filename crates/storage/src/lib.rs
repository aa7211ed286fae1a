use std::{collections::HashMap, str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    QueryBuilder, Sqlite, SqlitePool, Transaction,
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use gestularia_core::pricing::PricedOrder;
use gestularia_core::types::{Order, OrderItem, OrderStatus, Product, Store, User};

const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for merchant accounts.
    pub fn users(&self) -> UserRepository {
        UserRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for tenant stores.
    pub fn stores(&self) -> StoreRepository {
        StoreRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for store catalogs.
    pub fn products(&self) -> ProductRepository {
        ProductRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for orders and their items.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A persisted value could not be converted into its domain type.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("column {column} holds an invalid decimal: {value}")]
    Decimal { column: &'static str, value: String },
    #[error("column {column} holds an out of range integer: {value}")]
    Integer { column: &'static str, value: i64 },
    #[error("unknown order status: {0}")]
    Status(String),
}

/// Repository for merchant accounts.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Returns the user with `email`, creating it on first sight.
    pub async fn upsert_by_email(
        &self,
        email: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<User, UserError> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(user);
        }

        let timestamp = to_rfc3339(now);
        sqlx::query(
            "INSERT INTO users (id, email, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(name)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        self.find_by_email(email).await?.ok_or(UserError::Vanished)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_domain))
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, UserError> {
        let row =
            sqlx::query_as::<_, UserRow>("SELECT id, email, name, created_at FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(UserRow::into_domain))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user row disappeared right after insert")]
    Vanished,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for tenant stores.
#[derive(Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
}

const STORE_COLUMNS: &str = "id, user_id, name, slug, description, primary_color, \
     background_color, is_active, created_at, updated_at";

impl StoreRepository {
    /// Inserts a store, enforcing slug uniqueness and one store per user.
    pub async fn insert(&self, store: &NewStore<'_>) -> Result<Store, StoreError> {
        if self.find_by_slug(store.slug).await?.is_some() {
            return Err(StoreError::SlugTaken);
        }
        if self.find_by_owner(store.user_id).await?.is_some() {
            return Err(StoreError::OwnerAlreadyHasStore);
        }

        let timestamp = to_rfc3339(store.created_at);
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO stores \
             (id, user_id, name, slug, description, primary_color, background_color, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?) \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(store.user_id)
        .bind(store.name)
        .bind(store.slug)
        .bind(store.description)
        .bind(store.primary_color)
        .bind(store.background_color)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_UNIQUE) =>
            {
                if db_err.message().contains("stores.slug") {
                    StoreError::SlugTaken
                } else {
                    StoreError::OwnerAlreadyHasStore
                }
            }
            other => StoreError::Database(other),
        })?;

        Ok(row.into_domain())
    }

    /// Loads the store owned by `user_id`, if any.
    pub async fn find_by_owner(&self, user_id: &str) -> Result<Option<Store>, StoreError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoreRow::into_domain))
    }

    /// Loads the store for a tenant slug.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Store>, StoreError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoreRow::into_domain))
    }

    /// Toggles storefront visibility.
    pub async fn set_active(
        &self,
        store_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE stores SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(to_rfc3339(now))
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Parameters required to create a store.
pub struct NewStore<'a> {
    pub user_id: &'a str,
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub primary_color: &'a str,
    pub background_color: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: String,
    user_id: String,
    name: String,
    slug: String,
    description: Option<String>,
    primary_color: String,
    background_color: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoreRow {
    fn into_domain(self) -> Store {
        Store {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            primary_color: self.primary_color,
            background_color: self.background_color,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("slug is already in use")]
    SlugTaken,
    #[error("user already owns a store")]
    OwnerAlreadyHasStore,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for store catalogs. Every call is scoped by store id.
#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

const PRODUCT_COLUMNS: &str =
    "id, store_id, name, description, price, image, is_active, created_at, updated_at";

impl ProductRepository {
    pub async fn insert(&self, product: &NewProduct<'_>) -> Result<Product, ProductError> {
        let timestamp = to_rfc3339(product.created_at);
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products \
             (id, store_id, name, description, price, image, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(product.store_id)
        .bind(product.name)
        .bind(product.description)
        .bind(product.price.to_string())
        .bind(product.image)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain()?)
    }

    /// Lists the store's products, newest first.
    pub async fn list_for_store(&self, store_id: &str) -> Result<Vec<Product>, ProductError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE store_id = ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    /// Lists the products visible on the public storefront, newest first.
    pub async fn list_active_for_store(
        &self,
        store_id: &str,
    ) -> Result<Vec<Product>, ProductError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE store_id = ? AND is_active = 1 \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    pub async fn find_for_store(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> Result<Option<Product>, ProductError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND store_id = ?"
        ))
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProductRow::into_domain)
            .transpose()
            .map_err(ProductError::from)
    }

    /// Fetches the subset of `product_ids` that belongs to `store_id`.
    pub async fn find_many_in_store(
        &self,
        store_id: &str,
        product_ids: &[&str],
    ) -> Result<Vec<Product>, ProductError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = "
        ));
        builder.push_bind(store_id);
        builder.push(" AND id IN (");
        let mut ids = builder.separated(", ");
        for product_id in product_ids {
            ids.push_bind(*product_id);
        }
        ids.push_unseparated(")");

        let rows = builder
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }

    /// Replaces the editable fields of a product. Returns `None` when the
    /// product does not exist in `store_id`.
    pub async fn update(
        &self,
        store_id: &str,
        product_id: &str,
        changes: &ProductChanges<'_>,
    ) -> Result<Option<Product>, ProductError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products \
             SET name = ?, description = ?, price = ?, image = ?, \
                 is_active = COALESCE(?, is_active), updated_at = ? \
             WHERE id = ? AND store_id = ? \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.price.to_string())
        .bind(changes.image)
        .bind(changes.is_active)
        .bind(to_rfc3339(changes.updated_at))
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProductRow::into_domain)
            .transpose()
            .map_err(ProductError::from)
    }

    /// Deletes a product. Returns `false` when it does not exist in `store_id`.
    pub async fn delete(&self, store_id: &str, product_id: &str) -> Result<bool, ProductError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND store_id = ?")
            .bind(product_id)
            .bind(store_id)
            .execute(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db_err)
                    if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY) =>
                {
                    ProductError::InUse
                }
                other => ProductError::Database(other),
            })?;
        Ok(result.rows_affected() > 0)
    }
}

/// Parameters required to create a product.
pub struct NewProduct<'a> {
    pub store_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub image: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Full replacement of a product's editable fields.
pub struct ProductChanges<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub image: Option<&'a str>,
    /// `None` keeps the current value.
    pub is_active: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    store_id: String,
    name: String,
    description: Option<String>,
    price: String,
    image: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_domain(self) -> Result<Product, DecodeError> {
        Ok(Product {
            price: parse_decimal("products.price", &self.price)?,
            id: self.id,
            store_id: self.store_id,
            name: self.name,
            description: self.description,
            image: self.image,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_all(rows: Vec<ProductRow>) -> Result<Vec<Product>, ProductError> {
    rows.into_iter()
        .map(|row| row.into_domain().map_err(ProductError::from))
        .collect()
}

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("product is referenced by existing orders")]
    InUse,
    #[error("failed to decode product: {0}")]
    Decode(#[from] DecodeError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for orders. Every read and write is scoped by store id.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

const ORDER_COLUMNS: &str = "id, store_id, customer_name, customer_email, customer_phone, \
     notes, total, status, created_at, updated_at";

const ORDER_ITEM_SELECT: &str = r#"
SELECT oi.id,
       oi.order_id,
       oi.product_id,
       oi.quantity,
       oi.price,
       p.store_id AS product_store_id,
       p.name AS product_name,
       p.description AS product_description,
       p.price AS product_price,
       p.image AS product_image,
       p.is_active AS product_is_active,
       p.created_at AS product_created_at,
       p.updated_at AS product_updated_at
  FROM order_items AS oi
  JOIN orders AS o ON o.id = oi.order_id
  JOIN products AS p ON p.id = oi.product_id
"#;

impl OrderRepository {
    /// Persists an order and all of its items as one unit.
    pub async fn create(
        &self,
        order: &PricedOrder,
        created_at: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let order_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;
        let written = match self
            .insert_order(&mut tx, &order_id, order, created_at)
            .await
        {
            Ok(()) => self.insert_items(&mut tx, &order_id, order).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    stage = "storage",
                    error = %rollback_err,
                    "failed to roll back order transaction"
                );
            }
            return Err(err);
        }
        tx.commit().await?;

        self.find_for_store(&order.store_id, &order_id)
            .await?
            .ok_or(OrderError::Vanished)
    }

    async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        order: &PricedOrder,
        created_at: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let timestamp = to_rfc3339(created_at);
        sqlx::query(
            "INSERT INTO orders \
             (id, store_id, customer_name, customer_email, customer_phone, notes, total, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(&order.store_id)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(&order.customer.notes)
        .bind(order.total.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_items(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        order: &PricedOrder,
    ) -> Result<(), OrderError> {
        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price, position) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(order_id)
            .bind(&line.product_id)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Loads one order of `store_id` with its items.
    pub async fn find_for_store(
        &self,
        store_id: &str,
        order_id: &str,
    ) -> Result<Option<Order>, OrderError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ? AND store_id = ?"
        ))
        .bind(order_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            "{ORDER_ITEM_SELECT} WHERE oi.order_id = ? AND o.store_id = ? ORDER BY oi.position"
        ))
        .bind(order_id)
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = assemble(vec![row], items)?;
        Ok(orders.pop())
    }

    /// Lists all orders of a store, newest first.
    pub async fn list_for_store(&self, store_id: &str) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE store_id = ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        let items = self.items_for_store(store_id).await?;
        assemble(rows, items)
    }

    /// Lists the non-cancelled orders of a store in creation order.
    pub async fn list_sales_for_store(&self, store_id: &str) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE store_id = ? AND status <> 'CANCELLED' \
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        let items = self.items_for_store(store_id).await?;
        assemble(rows, items)
    }

    async fn items_for_store(&self, store_id: &str) -> Result<Vec<OrderItemRow>, OrderError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "{ORDER_ITEM_SELECT} WHERE o.store_id = ? ORDER BY oi.order_id, oi.position"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sets the status of an order owned by `store_id`.
    ///
    /// Returns `None` both when the order does not exist and when it belongs
    /// to another store.
    pub async fn update_status(
        &self,
        store_id: &str,
        order_id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, OrderError> {
        let result =
            sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND store_id = ?")
                .bind(status.as_str())
                .bind(to_rfc3339(now))
                .bind(order_id)
                .bind(store_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_for_store(store_id, order_id).await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    store_id: String,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    notes: Option<String>,
    total: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self, items: Vec<OrderItem>) -> Result<Order, DecodeError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|err| DecodeError::Status(err.0))?;
        Ok(Order {
            total: parse_decimal("orders.total", &self.total)?,
            status,
            id: self.id,
            store_id: self.store_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
    quantity: i64,
    price: String,
    product_store_id: String,
    product_name: String,
    product_description: Option<String>,
    product_price: String,
    product_image: Option<String>,
    product_is_active: bool,
    product_created_at: DateTime<Utc>,
    product_updated_at: DateTime<Utc>,
}

impl OrderItemRow {
    fn into_domain(self) -> Result<OrderItem, DecodeError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| DecodeError::Integer {
            column: "order_items.quantity",
            value: self.quantity,
        })?;
        let product = Product {
            id: self.product_id.clone(),
            store_id: self.product_store_id,
            name: self.product_name,
            description: self.product_description,
            price: parse_decimal("products.price", &self.product_price)?,
            image: self.product_image,
            is_active: self.product_is_active,
            created_at: self.product_created_at,
            updated_at: self.product_updated_at,
        };
        Ok(OrderItem {
            price: parse_decimal("order_items.price", &self.price)?,
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            quantity,
            product,
        })
    }
}

/// Attaches item rows to their orders, preserving the order of `rows`.
fn assemble(rows: Vec<OrderRow>, items: Vec<OrderItemRow>) -> Result<Vec<Order>, OrderError> {
    let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for item in items {
        let item = item.into_domain()?;
        by_order.entry(item.order_id.clone()).or_default().push(item);
    }

    rows.into_iter()
        .map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.into_domain(items).map_err(OrderError::from)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order row disappeared right after commit")]
    Vanished,
    #[error("failed to decode order: {0}")]
    Decode(#[from] DecodeError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn parse_decimal(column: &'static str, value: &str) -> Result<Decimal, DecodeError> {
    Decimal::from_str(value).map_err(|_| DecodeError::Decimal {
        column,
        value: value.to_string(),
    })
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
