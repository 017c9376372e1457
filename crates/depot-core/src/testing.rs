//! Builders shared by the unit tests.

use chrono::Utc;

use crate::money::Money;
use crate::types::*;

pub fn actor(role: Role) -> Actor {
    Actor::new("Abebe", "abebe@depot.test", role)
}

/// Product with the given stock, piece and package and no prices.
pub fn product(stock: i64, piece: Option<i64>, package: Option<i64>) -> Product {
    let now = Utc::now();
    Product {
        id: new_id(),
        name: "Cement 50kg".to_string(),
        category_id: None,
        supplier_id: None,
        description: None,
        unit: Some("Bag".to_string()),
        color_code: None,
        stock: Some(stock),
        package,
        piece,
        buying_price: None,
        selling_price: None,
        receipt_no: None,
        version: 0,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn priced(mut product: Product, selling: i64, buying: Option<i64>) -> Product {
    product.selling_price = Some(Money::from_cents(selling));
    product.buying_price = buying.map(Money::from_cents);
    product
}

pub fn order(receipt: ReceiptMode, payment_status: PaymentStatus) -> Order {
    Order::new(&actor(Role::Admin), None, receipt, payment_status, None)
}
