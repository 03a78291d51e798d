//! Invoice validation: date parsing and amount consistency.
//!
//! Everything here is pure. Nothing touches storage, so the same checks run
//! before create and update.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::AppError;
use crate::models::invoice::{InvoiceDraft, InvoiceRequest, NewInvoiceItem};

/// Largest absolute difference at which a declared amount still matches.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Exclusive upper bound for money values, the range of a `NUMERIC(14,2)` column.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Decimal places stored for money values and the tax rate.
pub const MONEY_SCALE: u32 = 2;

const DATE_FORMAT_ERROR: &str = "invalid date format, use YYYY-MM-DD";

/// The invoice total that failed the consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountField {
    Subtotal,
    TaxAmount,
    Total,
}

impl AmountField {
    /// Name of the field in request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountField::Subtotal => "subtotal",
            AmountField::TaxAmount => "taxAmount",
            AmountField::Total => "total",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AmountField::Subtotal => "subtotal",
            AmountField::TaxAmount => "tax amount",
            AmountField::Total => "total",
        }
    }
}

/// A declared amount that does not match the value computed from the items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct AmountMismatch {
    pub field: AmountField,
    pub expected: Decimal,
    pub received: Decimal,
}

impl fmt::Display for AmountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatch: expected {}, got {}",
            self.field.label(),
            self.expected.round_dp(2),
            self.received.round_dp(2)
        )
    }
}

/// Parses a strict `YYYY-MM-DD` calendar date.
///
/// chrono alone accepts `2024-1-5` and signed years, so the shape is checked
/// byte by byte first.
pub fn parse_date(text: &str) -> Result<NaiveDate, AppError> {
    let bytes = text.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if !well_formed {
        return Err(AppError::Validation(DATE_FORMAT_ERROR.to_string()));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(DATE_FORMAT_ERROR.to_string()))
}

pub fn check_tax_rate(tax_rate: Decimal) -> Result<(), AppError> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(
            "tax rate must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Rejects values the storage columns cannot hold exactly: negatives, more
/// than two decimal places, and magnitudes of `MAX_AMOUNT` or more.
pub fn check_money(name: &str, value: Decimal) -> Result<(), AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::Validation(format!("{} must not be negative", name)));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(AppError::Validation(format!(
            "{} must have at most {} decimal places",
            name, MONEY_SCALE
        )));
    }
    if value >= MAX_AMOUNT {
        return Err(AppError::Validation(format!(
            "{} must be less than {}",
            name, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Recomputes subtotal, tax and total from the item amounts and compares
/// them, in that order, against the declared values.
///
/// The first mismatch wins. Inputs are expected to have passed
/// [`check_money`], which keeps the arithmetic far from `Decimal` overflow.
pub fn check_amounts(
    item_amounts: impl IntoIterator<Item = Decimal>,
    subtotal: Decimal,
    tax_rate: Decimal,
    tax_amount: Decimal,
    total: Decimal,
) -> Result<(), AmountMismatch> {
    let expected_subtotal: Decimal = item_amounts.into_iter().sum();
    let expected_tax = expected_subtotal * tax_rate / Decimal::ONE_HUNDRED;
    let expected_total = expected_subtotal + expected_tax;

    let checks = [
        (AmountField::Subtotal, expected_subtotal, subtotal),
        (AmountField::TaxAmount, expected_tax, tax_amount),
        (AmountField::Total, expected_total, total),
    ];

    for (field, expected, received) in checks {
        if (received - expected).abs() > AMOUNT_TOLERANCE {
            return Err(AmountMismatch {
                field,
                expected,
                received,
            });
        }
    }

    Ok(())
}

/// Runs every business check on an already shape-validated request and
/// returns the draft a repository can persist.
pub fn validate_invoice(req: InvoiceRequest) -> Result<InvoiceDraft, AppError> {
    let date = parse_date(&req.date)?;
    check_tax_rate(req.tax_rate)?;
    if req.tax_rate.normalize().scale() > MONEY_SCALE {
        return Err(AppError::Validation(format!(
            "taxRate must have at most {} decimal places",
            MONEY_SCALE
        )));
    }

    check_money("subtotal", req.subtotal)?;
    check_money("taxAmount", req.tax_amount)?;
    check_money("total", req.total)?;
    for item in &req.items {
        check_money("item rate", item.rate)?;
        check_money("item amount", item.amount)?;
    }

    check_amounts(
        req.items.iter().map(|i| i.amount),
        req.subtotal,
        req.tax_rate,
        req.tax_amount,
        req.total,
    )?;

    Ok(InvoiceDraft {
        invoice_number: req.invoice_number,
        date,
        from_name: req.from_name,
        from_email: req.from_email,
        to_name: req.to_name,
        to_email: req.to_email,
        tax_rate: req.tax_rate,
        subtotal: req.subtotal,
        tax_amount: req.tax_amount,
        total: req.total,
        items: req
            .items
            .into_iter()
            .map(|i| NewInvoiceItem {
                description: i.description,
                quantity: i.quantity,
                rate: i.rate,
                amount: i.amount,
            })
            .collect(),
    })
}
