//! # Seed Data Generator
//!
//! Populates a database with a small demo ledger for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (depot.toml / DEPOT__DATABASE__PATH)
//! cargo run -p depot-db --bin seed
//!
//! # Specify database path
//! cargo run -p depot-db --bin seed -- --db ./data/depot.db
//!
//! # Read a specific configuration file
//! cargo run -p depot-db --bin seed -- --config ./depot.toml
//! ```
//!
//! ## Generated Data
//! - Categories, one supplier and two customers
//! - Products stocked by units and by packages
//! - A receipted order (with VAT) and a part-paid order
//! - A supplier purchase with two expenses
//! - A performa customer with a Receipt and a No Receipt performa

use std::env;
use std::path::PathBuf;

use depot_core::request::{
    CreateOrder, CreatePerformaCustomer, CreatePurchaseSupplier, LineInput, NewCustomer,
    NewExpense, NewOrderItem, NewProduct, NewSupplier, PerformaEntry,
};
use depot_core::{Actor, Money, PaymentStatus, ReceiptMode, Role};
use depot_db::{Ledger, LedgerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo products: (name, category, stock, piece, package, selling price in cents)
const PRODUCTS: &[(&str, &str, i64, Option<i64>, Option<i64>, i64)] = &[
    ("Cement 50kg", "Building", 200, None, None, 850),
    ("Rebar 12mm", "Building", 500, None, None, 1200),
    ("Ceramic Tiles 60x60", "Finishing", 0, Some(4), Some(25), 1500),
    ("Emulsion Paint 4L", "Finishing", 60, Some(6), None, 2400),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,depot_db=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from configuration)");
                println!("  -c, --config <PATH>   Configuration file (default: ./depot.toml)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    let ledger = Ledger::open(&config).await?;
    info!(path = %config.database.path.display(), "Connected to database");

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(ledger.database().pool())
        .await?;
    if existing > 0 {
        println!("Database already has {} products, skipping seed.", existing);
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let admin = Actor::new("Admin", "admin@depot.local", Role::Admin);

    // Catalog
    let building = ledger.create_category(&admin, "Building").await?;
    let finishing = ledger.create_category(&admin, "Finishing").await?;
    let supplier = ledger
        .create_supplier(
            &admin,
            NewSupplier {
                name: "Habesha Cement".to_string(),
                ..NewSupplier::default()
            },
        )
        .await?;
    let contractor = ledger
        .create_customer(
            &admin,
            NewCustomer {
                name: "Abebe Construction".to_string(),
                city: Some("Addis Ababa".to_string()),
                ..NewCustomer::default()
            },
        )
        .await?;

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (name, category, stock, piece, package, price) in PRODUCTS {
        let category_id = match *category {
            "Building" => building.id.clone(),
            _ => finishing.id.clone(),
        };
        let product = ledger
            .create_product(
                &admin,
                NewProduct {
                    name: name.to_string(),
                    category_id: Some(category_id),
                    supplier_id: Some(supplier.id.clone()),
                    stock: (*stock > 0).then_some(*stock),
                    piece: *piece,
                    package: *package,
                    selling_price: Some(Money::from_cents(*price)),
                    buying_price: Some(Money::from_cents(price * 70 / 100)),
                    ..NewProduct::default()
                },
            )
            .await?;
        products.push(product);
    }
    println!("✓ Created {} products", products.len());

    // Orders
    let receipted = ledger
        .create_order(
            &admin,
            CreateOrder {
                customer_id: Some(contractor.id.clone()),
                receipt: ReceiptMode::Receipt,
                payment_status: PaymentStatus::Paid,
                paid_amount: Money::zero(),
                items: vec![
                    order_line(&products[0].id, Some(20), None),
                    order_line(&products[2].id, None, Some(3)),
                ],
            },
        )
        .await?;
    let part_paid = ledger
        .create_order(
            &admin,
            CreateOrder {
                customer_id: None,
                receipt: ReceiptMode::NoReceipt,
                payment_status: PaymentStatus::Pending,
                paid_amount: Money::from_cents(5000),
                items: vec![order_line(&products[1].id, Some(10), None)],
            },
        )
        .await?;
    println!("✓ Created 2 orders");

    // Purchases
    let purchase = ledger
        .create_purchase_supplier(
            &admin,
            CreatePurchaseSupplier {
                supplier_id: Some(supplier.id.clone()),
                payment_status: PaymentStatus::Pending,
                expenses: vec![
                    NewExpense {
                        payment_status: PaymentStatus::Paid,
                        paid_amount: Money::zero(),
                        lines: vec![purchase_line("Cement 50kg", 200, 600)],
                    },
                    NewExpense {
                        payment_status: PaymentStatus::Pending,
                        paid_amount: Money::from_cents(100_000),
                        lines: vec![purchase_line("Rebar 12mm", 300, 800)],
                    },
                ],
            },
        )
        .await?;
    println!("✓ Created purchase supplier");

    // Performas
    let performa = ledger
        .create_performa_customer(
            &admin,
            CreatePerformaCustomer {
                customer_id: Some(contractor.id.clone()),
                performas: vec![
                    PerformaEntry {
                        id: None,
                        receipt: Some(ReceiptMode::Receipt),
                        lines: vec![purchase_line("Emulsion Paint 4L", 12, 2400)],
                    },
                    PerformaEntry {
                        id: None,
                        receipt: Some(ReceiptMode::NoReceipt),
                        lines: vec![purchase_line("Ceramic Tiles 60x60", 40, 1500)],
                    },
                ],
            },
        )
        .await?;
    println!("✓ Created performa customer");

    println!();
    println!("{}", serde_json::to_string_pretty(&receipted)?);
    println!("{}", serde_json::to_string_pretty(&part_paid)?);
    println!("{}", serde_json::to_string_pretty(&purchase)?);
    println!("{}", serde_json::to_string_pretty(&performa)?);

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

fn order_line(product_id: &str, quantity: Option<i64>, package: Option<i64>) -> NewOrderItem {
    NewOrderItem {
        product_id: product_id.to_string(),
        quantity,
        package,
        unit_price: None,
        unit: None,
    }
}

fn purchase_line(product: &str, quantity: i64, unit_price_cents: i64) -> LineInput {
    LineInput {
        id: None,
        product: product.to_string(),
        unit: None,
        description: None,
        quantity,
        unit_price: Money::from_cents(unit_price_cents),
    }
}
