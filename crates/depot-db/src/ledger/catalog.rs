//! # Catalog Operations
//!
//! Categories, suppliers, customers and products. Products are the only
//! catalog rows the order ledger writes back to, always through a version
//! check.

use chrono::Utc;
use tracing::{debug, info};

use super::Ledger;
use crate::error::{DbError, DbResult};
use crate::repository::catalog;
use depot_core::request::{NewCustomer, NewProduct, NewSupplier, Restock};
use depot_core::stock::{initial_stock, restock_packages, restock_units};
use depot_core::validation::{validate_name, validate_new_product};
use depot_core::{new_id, Actor, Category, CoreError, Customer, Product, Supplier};

impl Ledger {
    /// Creates a category.
    ///
    /// ## Errors
    /// `IntegrityConflict` when the name is taken.
    pub async fn create_category(&self, actor: &Actor, name: &str) -> DbResult<Category> {
        validate_name("name", name)?;
        let category = Category {
            id: new_id(),
            name: name.trim().to_string(),
            created_by: Some(actor.name.clone()),
            created_at: Utc::now(),
        };

        let created = self
            .run("create_category", move |conn| {
                let category = category.clone();
                Box::pin(async move {
                    if catalog::category_name_taken(&mut *conn, &category.name).await? {
                        return Err(CoreError::IntegrityConflict {
                            entity: "category".to_string(),
                            key: "name".to_string(),
                        }
                        .into());
                    }
                    catalog::insert_category(&mut *conn, &category).await?;
                    Ok(category)
                })
            })
            .await?;

        info!(id = %created.id, name = %created.name, "Category created");
        Ok(created)
    }

    pub async fn create_supplier(&self, actor: &Actor, request: NewSupplier) -> DbResult<Supplier> {
        validate_name("name", &request.name)?;
        let supplier = Supplier {
            id: new_id(),
            name: request.name.trim().to_string(),
            contact_info: request.contact_info,
            tin_number: request.tin_number,
            created_by: Some(actor.name.clone()),
            created_at: Utc::now(),
        };

        catalog::insert_supplier(self.db.pool(), &supplier).await?;
        info!(id = %supplier.id, name = %supplier.name, "Supplier created");
        Ok(supplier)
    }

    pub async fn create_customer(&self, actor: &Actor, request: NewCustomer) -> DbResult<Customer> {
        validate_name("name", &request.name)?;
        let customer = Customer {
            id: new_id(),
            name: request.name.trim().to_string(),
            phone: request.phone,
            tin_number: request.tin_number,
            vat_number: request.vat_number,
            fs_number: request.fs_number,
            zone: request.zone,
            city: request.city,
            sub_city: request.sub_city,
            created_by: Some(actor.name.clone()),
            created_at: Utc::now(),
        };

        catalog::insert_customer(self.db.pool(), &customer).await?;
        info!(id = %customer.id, name = %customer.name, "Customer created");
        Ok(customer)
    }

    /// Creates a product.
    ///
    /// With both `package` and `piece` the stock is `package × piece`; with
    /// only a stock and a piece size the package count is derived from it.
    ///
    /// ## Errors
    /// - `IntegrityConflict` for a duplicate name, category and color code
    /// - `NotFound` for an unknown category or supplier
    pub async fn create_product(&self, actor: &Actor, request: NewProduct) -> DbResult<Product> {
        validate_new_product(&request)?;
        let stock = initial_stock(request.package, request.piece, request.stock)?;
        let package = match (request.package, request.piece, stock) {
            (Some(package), _, _) => Some(package),
            (None, Some(piece), Some(stock)) if piece > 0 => Some(stock.div_euclid(piece)),
            _ => None,
        };

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            name: request.name.trim().to_string(),
            category_id: request.category_id,
            supplier_id: request.supplier_id,
            description: request.description,
            unit: request.unit,
            color_code: request.color_code,
            stock,
            package,
            piece: request.piece,
            buying_price: request.buying_price,
            selling_price: request.selling_price,
            receipt_no: request.receipt_no,
            version: 0,
            created_by: Some(actor.name.clone()),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .run("create_product", move |conn| {
                let product = product.clone();
                Box::pin(async move {
                    if let Some(id) = product.category_id.as_deref() {
                        let exists: i64 =
                            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?1")
                                .bind(id)
                                .fetch_one(&mut *conn)
                                .await?;
                        if exists == 0 {
                            return Err(DbError::not_found("Category", id));
                        }
                    }
                    super::supplier_label(&mut *conn, product.supplier_id.as_deref()).await?;

                    let taken = catalog::product_identity_taken(
                        &mut *conn,
                        &product.name,
                        product.category_id.as_deref(),
                        product.color_code.as_deref(),
                    )
                    .await?;
                    if taken {
                        return Err(CoreError::IntegrityConflict {
                            entity: "product".to_string(),
                            key: "name, category and color code".to_string(),
                        }
                        .into());
                    }

                    catalog::insert_product(&mut *conn, &product).await?;
                    Ok(product)
                })
            })
            .await?;

        info!(
            id = %created.id,
            name = %created.name,
            stock = ?created.stock,
            package = ?created.package,
            "Product created"
        );
        Ok(created)
    }

    /// Adds (or with negative counts removes) packages or loose units.
    pub async fn restock_product(
        &self,
        actor: &Actor,
        product_id: &str,
        restock: Restock,
    ) -> DbResult<Product> {
        let product_id = product_id.to_string();

        let product = self
            .run("restock_product", move |conn| {
                let product_id = product_id.clone();
                Box::pin(async move {
                    let mut product = catalog::fetch_product(&mut *conn, &product_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Product", product_id.as_str()))?;
                    match restock {
                        Restock::Packages(count) => restock_packages(&mut product, count)?,
                        Restock::Units(count) => restock_units(&mut product, count)?,
                    }
                    catalog::update_product_stock(&mut *conn, &mut product).await?;
                    Ok(product)
                })
            })
            .await?;

        info!(
            id = %product.id,
            user = %actor.name,
            restock = ?restock,
            stock = ?product.stock,
            package = ?product.package,
            "Product restocked"
        );
        Ok(product)
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Product> {
        self.db
            .catalog()
            .get_product(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Removes a product from the catalog. Order items keep their name
    /// snapshot and lose the reference.
    pub async fn delete_product(&self, actor: &Actor, id: &str) -> DbResult<bool> {
        let deleted = catalog::delete_product(self.db.pool(), id).await?;
        debug!(id = %id, user = %actor.name, deleted, "Product delete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admin, ledger, stocked_product};
    use depot_core::{Money, ValidationError};

    #[tokio::test]
    async fn test_duplicate_category_name() {
        let ledger = ledger().await;
        ledger.create_category(&admin(), "Paint").await.unwrap();

        let err = ledger.create_category(&admin(), "Paint").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(CoreError::IntegrityConflict { ref entity, .. }) if entity == "category"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_product_identity() {
        let ledger = ledger().await;
        let paint = ledger.create_category(&admin(), "Paint").await.unwrap();
        let request = NewProduct {
            name: "Emulsion 4L".to_string(),
            category_id: Some(paint.id.clone()),
            color_code: Some("W-01".to_string()),
            stock: Some(12),
            ..NewProduct::default()
        };
        ledger.create_product(&admin(), request.clone()).await.unwrap();

        let err = ledger.create_product(&admin(), request.clone()).await.unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::IntegrityConflict { .. })));

        // a different color is a different product
        let other = NewProduct {
            color_code: Some("B-02".to_string()),
            ..request
        };
        assert!(ledger.create_product(&admin(), other).await.is_ok());
    }

    #[tokio::test]
    async fn test_product_stock_from_packages() {
        let ledger = ledger().await;
        let product = ledger
            .create_product(
                &admin(),
                NewProduct {
                    name: "Tiles 60x60".to_string(),
                    package: Some(10),
                    piece: Some(4),
                    stock: Some(3),
                    ..NewProduct::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(product.stock, Some(40));
        assert_eq!(product.package, Some(10));

        let derived = stocked_product(&ledger, "Blocks", 105, Some(10), None, 100).await;
        assert_eq!(derived.package, Some(10));
    }

    #[tokio::test]
    async fn test_create_product_rejects_unknown_category() {
        let ledger = ledger().await;
        let err = ledger
            .create_product(
                &admin(),
                NewProduct {
                    name: "Nails".to_string(),
                    category_id: Some("missing".to_string()),
                    ..NewProduct::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_product_validates_payload() {
        let ledger = ledger().await;
        let err = ledger
            .create_product(
                &admin(),
                NewProduct {
                    name: "Glue".to_string(),
                    selling_price: Some(Money::from_cents(-1)),
                    ..NewProduct::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(CoreError::Validation(ValidationError::Negative { .. }))
        ));
    }

    #[tokio::test]
    async fn test_restock_packages_and_units() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Tiles", 105, Some(10), None, 100).await;

        let restocked = ledger
            .restock_product(&admin(), &product.id, Restock::Packages(2))
            .await
            .unwrap();
        assert_eq!(restocked.stock, Some(125));
        assert_eq!(restocked.package, Some(12));

        let trimmed = ledger
            .restock_product(&admin(), &product.id, Restock::Units(-6))
            .await
            .unwrap();
        assert_eq!(trimmed.stock, Some(119));
        assert_eq!(trimmed.package, Some(11));

        let err = ledger
            .restock_product(&admin(), &product.id, Restock::Units(-500))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::InsufficientStock { .. })));
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(119));
    }

    #[tokio::test]
    async fn test_delete_product() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Putty", 3, None, None, 900).await;

        assert!(ledger.delete_product(&admin(), &product.id).await.unwrap());
        assert!(!ledger.delete_product(&admin(), &product.id).await.unwrap());
        assert!(matches!(
            ledger.get_product(&product.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
