//! Fixtures shared by the storage and ledger tests.

use depot_core::request::{NewCustomer, NewProduct, NewSupplier};
use depot_core::{Actor, Customer, Money, Product, Role, Supplier};

use crate::config::LedgerSettings;
use crate::ledger::Ledger;
use crate::pool::{Database, DbConfig};

pub fn actor(role: Role) -> Actor {
    let name = match role {
        Role::Admin => "Almaz",
        Role::Manager => "Bekele",
        Role::SalesManager => "Chaltu",
        Role::Salesman => "Dawit",
    };
    Actor::new(name, format!("{}@depot.test", name.to_lowercase()), role)
}

pub fn admin() -> Actor {
    actor(Role::Admin)
}

/// Ledger over a fresh in-memory database.
pub async fn ledger() -> Ledger {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let settings = LedgerSettings {
        retry_backoff_ms: 1,
        ..LedgerSettings::default()
    };
    Ledger::new(db, settings)
}

pub async fn stocked_product(
    ledger: &Ledger,
    name: &str,
    stock: i64,
    piece: Option<i64>,
    package: Option<i64>,
    selling_cents: i64,
) -> Product {
    ledger
        .create_product(
            &admin(),
            NewProduct {
                name: name.to_string(),
                stock: Some(stock),
                piece,
                package,
                selling_price: Some(Money::from_cents(selling_cents)),
                ..NewProduct::default()
            },
        )
        .await
        .unwrap()
}

pub async fn customer(ledger: &Ledger, name: &str) -> Customer {
    ledger
        .create_customer(
            &admin(),
            NewCustomer {
                name: name.to_string(),
                ..NewCustomer::default()
            },
        )
        .await
        .unwrap()
}

pub async fn supplier(ledger: &Ledger, name: &str) -> Supplier {
    ledger
        .create_supplier(
            &admin(),
            NewSupplier {
                name: name.to_string(),
                ..NewSupplier::default()
            },
        )
        .await
        .unwrap()
}
