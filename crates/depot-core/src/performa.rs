//! # Performa Aggregate
//!
//! Pro-forma quotes: customer → performas → line products. Same recompute
//! pattern as purchases, with VAT on Receipt performas and no payment
//! state.

use chrono::Utc;

use crate::error::CoreResult;
use crate::money::Money;
use crate::purchase::merge_lines;
use crate::request::PerformaEntry;
use crate::types::{new_id, Actor, PerformaCustomer, PerformaPerforma, PerformaProduct, ReceiptMode, TaxRate};

pub fn new_customer(
    actor: &Actor,
    customer_id: Option<String>,
    customer_name: Option<String>,
) -> PerformaCustomer {
    let now = Utc::now();
    PerformaCustomer {
        id: new_id(),
        customer_id,
        customer_name,
        total_amount: Money::zero(),
        created_by: actor.name.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Builds a performa and its lines. The receipt mode defaults to Receipt.
pub fn new_performa(
    actor: &Actor,
    customer: &PerformaCustomer,
    entry: &PerformaEntry,
    rate: TaxRate,
) -> CoreResult<(PerformaPerforma, Vec<PerformaProduct>)> {
    let now = Utc::now();
    let mut performa = PerformaPerforma {
        id: new_id(),
        customer_level_id: customer.id.clone(),
        customer_name: customer.customer_name.clone(),
        receipt: entry.receipt.unwrap_or(ReceiptMode::Receipt),
        sub_total: Money::zero(),
        vat: Money::zero(),
        total: Money::zero(),
        created_by: actor.name.clone(),
        issued_date: now,
        updated_at: now,
    };

    let mut lines = Vec::with_capacity(entry.lines.len());
    merge_lines(&performa.id, &mut lines, &entry.lines)?;
    recompute_performa(&mut performa, &lines, rate);
    Ok((performa, lines))
}

/// `sub_total = Σ lines`, VAT on Receipt only, `total = sub_total + vat`.
pub fn recompute_performa(performa: &mut PerformaPerforma, lines: &[PerformaProduct], rate: TaxRate) {
    let sub_total: Money = lines.iter().map(|l| l.total_price).sum();
    performa.sub_total = sub_total;
    performa.vat = if performa.receipt.is_receipt() {
        sub_total.calculate_tax(rate)
    } else {
        Money::zero()
    };
    performa.total = performa.sub_total + performa.vat;
    performa.updated_at = Utc::now();
}

/// `total_amount = Σ performa.total`.
pub fn rollup_customer(customer: &mut PerformaCustomer, performas: &[PerformaPerforma]) {
    customer.total_amount = performas.iter().map(|p| p.total).sum();
    customer.updated_at = Utc::now();
}
