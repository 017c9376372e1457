//! # Catalog Repository
//!
//! Categories, suppliers, customers and products.
//!
//! ## Product Writes
//! ```text
//! read  ──► Product { version: 7 }
//!             │  stock ledger mutates in memory
//!             ▼
//! UPDATE products SET ..., version = version + 1
//!  WHERE id = ? AND version = 7
//!             │
//!             ├── 1 row  ──► product.version = 8
//!             └── 0 rows ──► DbError::StaleWrite (transaction retried)
//! ```

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use depot_core::{Category, Customer, Product, Supplier};

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Lists products ordered by name.
    pub async fn list_products(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, name, category_id, supplier_id, description, unit, color_code,
                stock, package, piece, buying_price, selling_price, receipt_no,
                version, created_by, created_at, updated_at
            FROM products
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_by, created_at FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        fetch_supplier(&self.pool, id).await
    }

    pub async fn get_customer(&self, id: &str) -> DbResult<Option<Customer>> {
        fetch_customer(&self.pool, id).await
    }
}

// =============================================================================
// Categories
// =============================================================================

pub async fn insert_category<'e, E: SqliteExecutor<'e>>(exec: E, category: &Category) -> DbResult<()> {
    debug!(id = %category.id, name = %category.name, "Inserting category");

    sqlx::query("INSERT INTO categories (id, name, created_by, created_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.created_by)
        .bind(category.created_at)
        .execute(exec)
        .await?;

    Ok(())
}

pub async fn category_name_taken<'e, E: SqliteExecutor<'e>>(exec: E, name: &str) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE name = ?1")
        .bind(name)
        .fetch_one(exec)
        .await?;

    Ok(count > 0)
}

// =============================================================================
// Suppliers / Customers
// =============================================================================

pub async fn insert_supplier<'e, E: SqliteExecutor<'e>>(exec: E, supplier: &Supplier) -> DbResult<()> {
    debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

    sqlx::query(
        r#"
        INSERT INTO suppliers (id, name, contact_info, tin_number, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&supplier.id)
    .bind(&supplier.name)
    .bind(&supplier.contact_info)
    .bind(&supplier.tin_number)
    .bind(&supplier.created_by)
    .bind(supplier.created_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn fetch_supplier<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<Supplier>> {
    let supplier = sqlx::query_as::<_, Supplier>(
        "SELECT id, name, contact_info, tin_number, created_by, created_at FROM suppliers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(supplier)
}

pub async fn insert_customer<'e, E: SqliteExecutor<'e>>(exec: E, customer: &Customer) -> DbResult<()> {
    debug!(id = %customer.id, name = %customer.name, "Inserting customer");

    sqlx::query(
        r#"
        INSERT INTO customers (
            id, name, phone, tin_number, vat_number, fs_number,
            zone, city, sub_city, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.tin_number)
    .bind(&customer.vat_number)
    .bind(&customer.fs_number)
    .bind(&customer.zone)
    .bind(&customer.city)
    .bind(&customer.sub_city)
    .bind(&customer.created_by)
    .bind(customer.created_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn fetch_customer<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT
            id, name, phone, tin_number, vat_number, fs_number,
            zone, city, sub_city, created_by, created_at
        FROM customers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(customer)
}

// =============================================================================
// Products
// =============================================================================

pub async fn fetch_product<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT
            id, name, category_id, supplier_id, description, unit, color_code,
            stock, package, piece, buying_price, selling_price, receipt_no,
            version, created_by, created_at, updated_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(product)
}

/// Whether a product with the same name, category and color code exists.
///
/// `IS` compares NULLs as equal, which the unique index does not.
pub async fn product_identity_taken<'e, E: SqliteExecutor<'e>>(
    exec: E,
    name: &str,
    category_id: Option<&str>,
    color_code: Option<&str>,
) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products WHERE name = ?1 AND category_id IS ?2 AND color_code IS ?3",
    )
    .bind(name)
    .bind(category_id)
    .bind(color_code)
    .fetch_one(exec)
    .await?;

    Ok(count > 0)
}

pub async fn insert_product<'e, E: SqliteExecutor<'e>>(exec: E, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, name = %product.name, stock = ?product.stock, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, category_id, supplier_id, description, unit, color_code,
            stock, package, piece, buying_price, selling_price, receipt_no,
            version, created_by, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10, ?11, ?12, ?13,
            ?14, ?15, ?16, ?17
        )
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.category_id)
    .bind(&product.supplier_id)
    .bind(&product.description)
    .bind(&product.unit)
    .bind(&product.color_code)
    .bind(product.stock)
    .bind(product.package)
    .bind(product.piece)
    .bind(product.buying_price)
    .bind(product.selling_price)
    .bind(product.receipt_no)
    .bind(product.version)
    .bind(&product.created_by)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Writes stock, package and receipt_no with a version check.
///
/// On success `product.version` is advanced to the stored value.
pub async fn update_product_stock<'e, E: SqliteExecutor<'e>>(
    exec: E,
    product: &mut Product,
) -> DbResult<()> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = ?1, package = ?2, receipt_no = ?3, updated_at = ?4, version = version + 1
        WHERE id = ?5 AND version = ?6
        "#,
    )
    .bind(product.stock)
    .bind(product.package)
    .bind(product.receipt_no)
    .bind(now)
    .bind(&product.id)
    .bind(product.version)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        debug!(id = %product.id, version = product.version, "Product version check failed");
        return Err(DbError::stale("Product", product.id.as_str()));
    }

    product.version += 1;
    product.updated_at = now;
    debug!(
        id = %product.id,
        stock = ?product.stock,
        package = ?product.package,
        version = product.version,
        "Product stock written"
    );
    Ok(())
}

pub async fn delete_product<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}
