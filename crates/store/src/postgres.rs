use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartId, CartLineId, LocationId, Money, MovementId, OrderId, OrderItemId, ProductId,
    Properties, TransactionId, UserId, VariantId,
};
use domain::{
    Address, Cart, CartLine, CatalogVariant, FinancialStatus, FulfillmentStatus, InventoryLevel,
    InventoryLocation, InventoryMovement, InventoryPolicy, InventorySummary, MovementType, Order,
    OrderItem, OrderStatus, OrderTotals, Product, ProductVariant, Transaction, TransactionKind,
    TransactionStatus,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LevelQuery, MovementQuery, OrderQuery, Result, StoreError,
    store::{Store, StoreTx},
};

const VARIANT_COLUMNS: &str = r#"
    v.id, v.product_id, v.title, v.sku, v.is_active, v.price_cents, v.inventory_policy,
    v.inventory_quantity, p.name AS product_name, p.is_active AS product_is_active,
    p.brand, p.thumbnail
"#;

const CART_COLUMNS: &str = "id, user_id, session_id, currency, created_at, updated_at, expires_at";

const LINE_COLUMNS: &str = "id, cart_id, variant_id, quantity, properties, created_at, updated_at";

const LOCATION_COLUMNS: &str = "id, name, address, is_active, created_at, updated_at";

const LEVEL_COLUMNS: &str =
    "variant_id, location_id, available, committed, on_hand, reserved, updated_at";

const MOVEMENT_COLUMNS: &str = r#"
    id, variant_id, location_id, movement_type, quantity, delta, reference_type, reference_id,
    notes, created_at
"#;

const ORDER_COLUMNS: &str = r#"
    id, order_number, user_id, email, status, financial_status, fulfillment_status,
    subtotal_price_cents, total_tax_cents, total_shipping_cents, total_discounts_cents,
    total_price_cents, currency, shipping_address, billing_address, notes, is_active,
    created_at, updated_at, processed_at, cancelled_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, order_id, variant_id, product_id, quantity, price_cents, title, variant_title, sku,
    vendor, thumbnail, properties
"#;

const TRANSACTION_COLUMNS: &str = r#"
    id, order_id, parent_id, kind, status, amount_cents, currency, gateway,
    gateway_reference, error_message, created_at, processed_at
"#;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// Unit of work backed by a single SQL transaction.
pub struct PostgresTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn unique_violation(entity: &'static str, key: impl ToString) -> impl FnOnce(sqlx::Error) -> StoreError {
    let key = key.to_string();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return StoreError::UniqueViolation { entity, key };
        }
        StoreError::Database(e)
    }
}

fn quantity_from_row(row: &PgRow) -> Result<u32> {
    let quantity: i32 = row.try_get("quantity")?;
    u32::try_from(quantity).map_err(|_| StoreError::corrupt("quantity", quantity))
}

fn properties_from_row(row: &PgRow) -> Result<Properties> {
    let value: serde_json::Value = row.try_get("properties")?;
    Ok(serde_json::from_value(value)?)
}

fn address_from_row(row: &PgRow, column: &'static str) -> Result<Option<Address>> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    Ok(value.map(serde_json::from_value).transpose()?)
}

fn parse_column<T>(row: &PgRow, column: &'static str, parse: fn(&str) -> Option<T>) -> Result<T> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| StoreError::corrupt(column, raw))
}

fn row_to_catalog_variant(row: PgRow) -> Result<CatalogVariant> {
    let product_id = ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?);
    Ok(CatalogVariant {
        variant: ProductVariant {
            id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id,
            title: row.try_get("title")?,
            sku: row.try_get("sku")?,
            is_active: row.try_get("is_active")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            inventory_policy: parse_column(&row, "inventory_policy", InventoryPolicy::parse)?,
            inventory_quantity: row.try_get("inventory_quantity")?,
        },
        product: Product {
            id: product_id,
            name: row.try_get("product_name")?,
            is_active: row.try_get("product_is_active")?,
            brand: row.try_get("brand")?,
            thumbnail: row.try_get("thumbnail")?,
        },
    })
}

fn row_to_cart(row: PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: row.try_get::<Option<Uuid>, _>("user_id")?.map(UserId::from_uuid),
        session_id: row.try_get("session_id")?,
        currency: row.try_get("currency")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn row_to_line(row: PgRow) -> Result<CartLine> {
    Ok(CartLine {
        id: CartLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        quantity: quantity_from_row(&row)?,
        properties: properties_from_row(&row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_location(row: PgRow) -> Result<InventoryLocation> {
    Ok(InventoryLocation {
        id: LocationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_level(row: PgRow) -> Result<InventoryLevel> {
    Ok(InventoryLevel {
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        location_id: LocationId::from_uuid(row.try_get::<Uuid, _>("location_id")?),
        available: row.try_get("available")?,
        committed: row.try_get("committed")?,
        on_hand: row.try_get("on_hand")?,
        reserved: row.try_get("reserved")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_movement(row: PgRow) -> Result<InventoryMovement> {
    Ok(InventoryMovement {
        id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        location_id: LocationId::from_uuid(row.try_get::<Uuid, _>("location_id")?),
        movement_type: parse_column(&row, "movement_type", MovementType::parse)?,
        quantity: row.try_get("quantity")?,
        delta: row.try_get("delta")?,
        reference_type: row.try_get("reference_type")?,
        reference_id: row.try_get("reference_id")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: quantity_from_row(&row)?,
        price: Money::from_cents(row.try_get("price_cents")?),
        title: row.try_get("title")?,
        variant_title: row.try_get("variant_title")?,
        sku: row.try_get("sku")?,
        vendor: row.try_get("vendor")?,
        thumbnail: row.try_get("thumbnail")?,
        properties: properties_from_row(&row)?,
    })
}

/// Maps an order header row; items are attached by the caller.
fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_number: row.try_get("order_number")?,
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        email: row.try_get("email")?,
        status: parse_column(&row, "status", OrderStatus::parse)?,
        financial_status: parse_column(&row, "financial_status", FinancialStatus::parse)?,
        fulfillment_status: parse_column(&row, "fulfillment_status", FulfillmentStatus::parse)?,
        totals: OrderTotals {
            subtotal_price: Money::from_cents(row.try_get("subtotal_price_cents")?),
            total_tax: Money::from_cents(row.try_get("total_tax_cents")?),
            total_shipping: Money::from_cents(row.try_get("total_shipping_cents")?),
            total_discounts: Money::from_cents(row.try_get("total_discounts_cents")?),
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
        },
        currency: row.try_get("currency")?,
        shipping_address: address_from_row(&row, "shipping_address")?,
        billing_address: address_from_row(&row, "billing_address")?,
        notes: row.try_get("notes")?,
        is_active: row.try_get("is_active")?,
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        processed_at: row.try_get("processed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn row_to_transaction(row: PgRow) -> Result<Transaction> {
    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")?
            .map(TransactionId::from_uuid),
        kind: parse_column(&row, "kind", TransactionKind::parse)?,
        status: parse_column(&row, "status", TransactionStatus::parse)?,
        amount: Money::from_cents(row.try_get("amount_cents")?),
        currency: row.try_get("currency")?,
        gateway: row.try_get("gateway")?,
        gateway_reference: row.try_get("gateway_reference")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

impl PostgresTx {
    async fn fetch_variant(&mut self, id: VariantId, lock: bool) -> Result<Option<CatalogVariant>> {
        let mut sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants v JOIN products p ON p.id = v.product_id WHERE v.id = $1"
        );
        if lock {
            sql.push_str(" FOR UPDATE OF v");
        }
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_catalog_variant).transpose()
    }

    async fn fetch_cart(
        &mut self,
        column: &'static str,
        key: Uuid,
        lock: bool,
    ) -> Result<Option<Cart>> {
        let mut sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE {column} = $1");
        if lock {
            sql.push_str(" FOR UPDATE");
        }
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_cart).transpose()
    }

    async fn fetch_order(&mut self, id: OrderId, lock: bool) -> Result<Option<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        if lock {
            sql.push_str(" FOR UPDATE");
        }
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = vec![row_to_order(row)?];
        self.attach_items(&mut orders).await?;
        Ok(orders.pop())
    }

    async fn attach_items(&mut self, orders: &mut [Order]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position ASC"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        for row in rows {
            let item = row_to_item(row)?;
            if let Some(order) = orders.iter_mut().find(|o| o.id == item.order_id) {
                order.items.push(item);
            }
        }
        Ok(())
    }

    /// Builds the WHERE clause shared by order listing and counting.
    fn order_filter(query: &OrderQuery) -> (String, usize) {
        let mut sql = String::from(" WHERE 1=1");
        let mut param_count = 0;
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if !query.include_inactive {
            sql.push_str(" AND is_active");
        }
        (sql, param_count)
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn get_variant(&mut self, id: VariantId) -> Result<Option<CatalogVariant>> {
        self.fetch_variant(id, false).await
    }

    async fn lock_variant(&mut self, id: VariantId) -> Result<Option<CatalogVariant>> {
        self.fetch_variant(id, true).await
    }

    async fn first_active_variant_of_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<CatalogVariant>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {VARIANT_COLUMNS}
            FROM product_variants v JOIN products p ON p.id = v.product_id
            WHERE v.product_id = $1 AND v.is_active
            ORDER BY v.created_at ASC, v.id ASC
            LIMIT 1
            "#
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_catalog_variant).transpose()
    }

    async fn try_debit_variant(&mut self, id: VariantId, quantity: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET inventory_quantity = inventory_quantity - $2
            WHERE id = $1 AND inventory_quantity >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_variant_inventory(&mut self, id: VariantId, quantity: i64) -> Result<()> {
        let result = sqlx::query("UPDATE product_variants SET inventory_quantity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("variant", id));
        }
        Ok(())
    }

    async fn upsert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, is_active, brand, thumbnail)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, is_active = EXCLUDED.is_active,
                brand = EXCLUDED.brand, thumbnail = EXCLUDED.thumbnail
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.is_active)
        .bind(&product.brand)
        .bind(&product.thumbnail)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_variant(&mut self, variant: &ProductVariant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_variants
                (id, product_id, title, sku, is_active, price_cents, inventory_policy, inventory_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, sku = EXCLUDED.sku, is_active = EXCLUDED.is_active,
                price_cents = EXCLUDED.price_cents, inventory_policy = EXCLUDED.inventory_policy,
                inventory_quantity = EXCLUDED.inventory_quantity
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(variant.product_id.as_uuid())
        .bind(&variant.title)
        .bind(&variant.sku)
        .bind(variant.is_active)
        .bind(variant.price.cents())
        .bind(variant.inventory_policy.as_str())
        .bind(variant.inventory_quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_cart(&mut self, id: CartId) -> Result<Option<Cart>> {
        self.fetch_cart("id", id.as_uuid(), false).await
    }

    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.fetch_cart("user_id", user_id.as_uuid(), false).await
    }

    async fn lock_cart(&mut self, id: CartId) -> Result<Option<Cart>> {
        self.fetch_cart("id", id.as_uuid(), true).await
    }

    async fn lock_user_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.fetch_cart("user_id", user_id.as_uuid(), true).await
    }

    async fn find_cart_by_session(&mut self, session_id: &str) -> Result<Option<Cart>> {
        let row = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE session_id = $1"))
            .bind(session_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_cart).transpose()
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, session_id, currency, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.map(|u| u.as_uuid()))
        .bind(&cart.session_id)
        .bind(&cart.currency)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_violation("cart", cart.id))?;
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE carts
            SET user_id = $2, session_id = $3, currency = $4, updated_at = $5, expires_at = $6
            WHERE id = $1
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.map(|u| u.as_uuid()))
        .bind(&cart.session_id)
        .bind(&cart.currency)
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_violation("cart", cart.id))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart", cart.id));
        }
        Ok(())
    }

    async fn delete_expired_carts(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM carts WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 ORDER BY seq ASC"
        ))
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_line).collect()
    }

    async fn get_cart_line(&mut self, id: CartLineId) -> Result<Option<CartLine>> {
        let row = sqlx::query(&format!("SELECT {LINE_COLUMNS} FROM cart_lines WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_line).transpose()
    }

    async fn upsert_cart_line(&mut self, line: &CartLine) -> Result<CartLine> {
        let properties = serde_json::to_value(&line.properties)?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_lines (id, cart_id, variant_id, quantity, properties, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ON CONSTRAINT unique_cart_variant DO UPDATE
            SET quantity = EXCLUDED.quantity, properties = EXCLUDED.properties,
                updated_at = EXCLUDED.updated_at
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(line.id.as_uuid())
        .bind(line.cart_id.as_uuid())
        .bind(line.variant_id.as_uuid())
        .bind(line.quantity as i32)
        .bind(properties)
        .bind(line.created_at)
        .bind(line.updated_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_line(row)
    }

    async fn delete_cart_line(&mut self, id: CartLineId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart_lines(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_location(&mut self, id: LocationId) -> Result<Option<InventoryLocation>> {
        let row = sqlx::query(&format!(
            "SELECT {LOCATION_COLUMNS} FROM inventory_locations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_location).transpose()
    }

    async fn find_location_by_name(&mut self, name: &str) -> Result<Option<InventoryLocation>> {
        let row = sqlx::query(&format!(
            "SELECT {LOCATION_COLUMNS} FROM inventory_locations WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_location).transpose()
    }

    async fn insert_location(&mut self, location: &InventoryLocation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_locations (id, name, address, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(&location.address)
        .bind(location.is_active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_violation("location", &location.name))?;
        Ok(())
    }

    async fn update_location(&mut self, location: &InventoryLocation) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_locations
            SET name = $2, address = $3, is_active = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(&location.address)
        .bind(location.is_active)
        .bind(location.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_violation("location", &location.name))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("location", location.id));
        }
        Ok(())
    }

    async fn list_locations(&mut self, include_inactive: bool) -> Result<Vec<InventoryLocation>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOCATION_COLUMNS} FROM inventory_locations WHERE is_active OR $1 ORDER BY name ASC"
        ))
        .bind(include_inactive)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_location).collect()
    }

    async fn lock_level(
        &mut self,
        variant_id: VariantId,
        location_id: LocationId,
    ) -> Result<Option<InventoryLevel>> {
        let row = sqlx::query(&format!(
            "SELECT {LEVEL_COLUMNS} FROM inventory_levels WHERE variant_id = $1 AND location_id = $2 FOR UPDATE"
        ))
        .bind(variant_id.as_uuid())
        .bind(location_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_level).transpose()
    }

    async fn upsert_level(&mut self, level: &InventoryLevel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_levels
                (variant_id, location_id, available, committed, on_hand, reserved, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ON CONSTRAINT unique_variant_location DO UPDATE
            SET available = EXCLUDED.available, committed = EXCLUDED.committed,
                on_hand = EXCLUDED.on_hand, reserved = EXCLUDED.reserved,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(level.variant_id.as_uuid())
        .bind(level.location_id.as_uuid())
        .bind(level.available)
        .bind(level.committed)
        .bind(level.on_hand)
        .bind(level.reserved)
        .bind(level.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_levels(&mut self, query: &LevelQuery) -> Result<Vec<InventoryLevel>> {
        let mut sql = format!("SELECT {LEVEL_COLUMNS} FROM inventory_levels WHERE 1=1");
        let mut param_count = 0;

        if query.variant_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND variant_id = ${param_count}"));
        }
        if query.location_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND location_id = ${param_count}"));
        }
        if query.max_available.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND available <= ${param_count}"));
        }

        sql.push_str(" ORDER BY available ASC, variant_id ASC, location_id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(variant_id) = query.variant_id {
            sqlx_query = sqlx_query.bind(variant_id.as_uuid());
        }
        if let Some(location_id) = query.location_id {
            sqlx_query = sqlx_query.bind(location_id.as_uuid());
        }
        if let Some(max) = query.max_available {
            sqlx_query = sqlx_query.bind(max);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(row_to_level).collect()
    }

    async fn sum_available(&mut self, variant_id: VariantId) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(available), 0)::BIGINT FROM inventory_levels WHERE variant_id = $1",
        )
        .bind(variant_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total)
    }

    async fn insert_movement(&mut self, movement: &InventoryMovement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements
                (id, variant_id, location_id, movement_type, quantity, delta,
                 reference_type, reference_id, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.variant_id.as_uuid())
        .bind(movement.location_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.delta)
        .bind(&movement.reference_type)
        .bind(&movement.reference_id)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_movements(&mut self, query: &MovementQuery) -> Result<Vec<InventoryMovement>> {
        let mut sql = format!("SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE 1=1");
        let mut param_count = 0;

        if query.variant_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND variant_id = ${param_count}"));
        }
        if query.location_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND location_id = ${param_count}"));
        }
        if query.movement_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND movement_type = ${param_count}"));
        }
        if query.reference_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND reference_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY seq DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(variant_id) = query.variant_id {
            sqlx_query = sqlx_query.bind(variant_id.as_uuid());
        }
        if let Some(location_id) = query.location_id {
            sqlx_query = sqlx_query.bind(location_id.as_uuid());
        }
        if let Some(movement_type) = query.movement_type {
            sqlx_query = sqlx_query.bind(movement_type.as_str());
        }
        if let Some(ref reference_id) = query.reference_id {
            sqlx_query = sqlx_query.bind(reference_id.clone());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(row_to_movement).collect()
    }

    async fn inventory_summary(&mut self, low_stock_threshold: i64) -> Result<InventorySummary> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM product_variants WHERE is_active) AS active_variants,
                (SELECT COUNT(*) FROM inventory_locations WHERE is_active) AS active_locations,
                (SELECT COUNT(*) FROM product_variants
                    WHERE is_active AND inventory_quantity <= $1) AS low_stock_variants,
                (SELECT COUNT(*) FROM product_variants
                    WHERE is_active AND inventory_quantity <= 0) AS out_of_stock_variants,
                (SELECT COALESCE(SUM(available), 0)::BIGINT FROM inventory_levels) AS total_stock_units
            "#,
        )
        .bind(low_stock_threshold)
        .fetch_one(&mut *self.tx)
        .await?;

        let count = |column: &str| -> Result<u64> { Ok(row.try_get::<i64, _>(column)?.max(0) as u64) };
        Ok(InventorySummary {
            active_variants: count("active_variants")?,
            active_locations: count("active_locations")?,
            low_stock_variants: count("low_stock_variants")?,
            out_of_stock_variants: count("out_of_stock_variants")?,
            total_stock_units: row.try_get("total_stock_units")?,
        })
    }

    async fn last_order_number(&mut self, prefix: &str) -> Result<Option<String>> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(prefix)
            .execute(&mut *self.tx)
            .await?;

        let last: Option<String> = sqlx::query_scalar(
            "SELECT MAX(order_number) FROM orders WHERE order_number LIKE $1 || '%'",
        )
        .bind(prefix)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(last)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let shipping = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let billing = order
            .billing_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, order_number, user_id, email, status, financial_status, fulfillment_status,
                 subtotal_price_cents, total_tax_cents, total_shipping_cents, total_discounts_cents,
                 total_price_cents, currency, shipping_address, billing_address, notes, is_active,
                 created_at, updated_at, processed_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.user_id.as_uuid())
        .bind(&order.email)
        .bind(order.status.as_str())
        .bind(order.financial_status.as_str())
        .bind(order.fulfillment_status.as_str())
        .bind(order.totals.subtotal_price.cents())
        .bind(order.totals.total_tax.cents())
        .bind(order.totals.total_shipping.cents())
        .bind(order.totals.total_discounts.cents())
        .bind(order.totals.total_price.cents())
        .bind(&order.currency)
        .bind(shipping)
        .bind(billing)
        .bind(&order.notes)
        .bind(order.is_active)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.processed_at)
        .bind(order.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_violation("order", &order.order_number))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, position, variant_id, product_id, quantity, price_cents,
                     title, variant_title, sku, vendor, thumbnail, properties)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(item.variant_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(item.price.cents())
            .bind(&item.title)
            .bind(&item.variant_title)
            .bind(&item.sku)
            .bind(&item.vendor)
            .bind(&item.thumbnail)
            .bind(serde_json::to_value(&item.properties)?)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, false).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, true).await
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, financial_status = $3, fulfillment_status = $4, email = $5,
                notes = $6, is_active = $7, updated_at = $8, processed_at = $9, cancelled_at = $10
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.financial_status.as_str())
        .bind(order.fulfillment_status.as_str())
        .bind(&order.email)
        .bind(&order.notes)
        .bind(order.is_active)
        .bind(order.updated_at)
        .bind(order.processed_at)
        .bind(order.cancelled_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", order.id));
        }
        Ok(())
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Vec<Order>> {
        let (filter, mut param_count) = Self::order_filter(query);
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY created_at DESC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&mut *self.tx).await?;
        let mut orders = rows
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(&mut orders).await?;
        Ok(orders)
    }

    async fn count_orders(&mut self, query: &OrderQuery) -> Result<u64> {
        let (filter, _) = Self::order_filter(query);
        let sql = format!("SELECT COUNT(*) FROM orders{filter}");

        let mut sqlx_query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }

        let count = sqlx_query.fetch_one(&mut *self.tx).await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, order_id, parent_id, kind, status, amount_cents, currency, gateway,
                 gateway_reference, error_message, created_at, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.order_id.as_uuid())
        .bind(transaction.parent_id.map(|id| id.as_uuid()))
        .bind(transaction.kind.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.amount.cents())
        .bind(&transaction.currency)
        .bind(&transaction.gateway)
        .bind(&transaction.gateway_reference)
        .bind(&transaction.error_message)
        .bind(transaction.created_at)
        .bind(transaction.processed_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, gateway_reference = $3, error_message = $4, processed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.status.as_str())
        .bind(&transaction.gateway_reference)
        .bind(&transaction.error_message)
        .bind(transaction.processed_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("transaction", transaction.id));
        }
        Ok(())
    }

    async fn get_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_transaction).transpose()
    }

    async fn list_transactions(&mut self, order_id: OrderId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1 ORDER BY seq ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
