//! Billing aggregator.
//!
//! Turns the usage ledger for a calendar month into a priced draft invoice.
//! Quantities are bucketed by unit only, so input and output tokens are priced
//! alike.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use saturn_core::{InvoiceId, TenantId};
use saturn_store::{Invoice, InvoiceLineItem, InvoiceStatus, Store, UsageEvent, UsageUnit};

use crate::error::{ControlError, Result};
use crate::types::{CostEstimate, PriceBook};
use crate::usage;

/// A calendar month, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl BillingPeriod {
    /// Parse a `YYYY-MM` period.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::BadRequest` if the period is malformed.
    pub fn parse(period: &str) -> Result<Self> {
        let invalid = || ControlError::BadRequest("Invalid period format, expected YYYY-MM".into());

        let (year, month) = period.split_once('-').ok_or_else(invalid)?;
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(year) || !all_digits(month) || year.len() > 4 || month.len() > 2 {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .filter(|_| year >= 1)
            .ok_or_else(invalid)?;

        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;

        Ok(Self { start, end })
    }

    /// First day of the period.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day after the period.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// The period as a UTC timestamp window.
    #[must_use]
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start.and_time(NaiveTime::MIN).and_utc(),
            self.end.and_time(NaiveTime::MIN).and_utc(),
        )
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.start.year(), self.start.month())
    }
}

/// Price usage events: one line per unit (tokens, calls, seconds) and the
/// total rounded to two decimals.
#[must_use]
pub fn price(events: &[UsageEvent], prices: &PriceBook) -> (Vec<InvoiceLineItem>, Decimal) {
    let lines: Vec<InvoiceLineItem> = UsageUnit::ALL
        .iter()
        .map(|&unit| {
            let quantity = events
                .iter()
                .filter(|e| e.unit == unit)
                .fold(0u64, |acc, e| acc.saturating_add(e.quantity));
            let unit_price = match unit {
                UsageUnit::Tokens => prices.tokens,
                UsageUnit::Calls => prices.calls,
                UsageUnit::Seconds => prices.seconds,
            };
            InvoiceLineItem {
                item: unit,
                quantity,
                unit_price,
                amount: unit_price * Decimal::from(quantity),
            }
        })
        .collect();

    let total = lines.iter().map(|line| line.amount).sum::<Decimal>().round_dp(2);
    (lines, total)
}

/// Generate and persist a new draft invoice for `period`.
///
/// Every call appends a new draft; earlier drafts for the same period are kept.
///
/// # Errors
///
/// Returns `ControlError::BadRequest` if the period is malformed.
pub fn generate_invoice<S: Store>(
    store: &S,
    tenant: &TenantId,
    period: &str,
    currency: &str,
    prices: &PriceBook,
) -> Result<Invoice> {
    let period = BillingPeriod::parse(period)?;
    let (start, end) = period.window();
    let events = usage::list_in_window(store, tenant, start, end)?;
    let (line_items, total) = price(&events, prices);

    let invoice = store.insert_invoice(Invoice {
        invoice_id: InvoiceId::generate(),
        tenant_id: tenant.clone(),
        period_start: period.start(),
        period_end: period.end(),
        currency: currency.to_string(),
        subtotal: total,
        total,
        status: InvoiceStatus::Draft,
        line_items,
        seq: 0,
        created_at: Utc::now(),
    })?;

    tracing::info!(
        invoice_id = %invoice.invoice_id,
        period = %period,
        total = %invoice.total,
        "Generated invoice"
    );

    Ok(invoice)
}

/// Price a period without persisting anything.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn estimate<S: Store>(
    store: &S,
    tenant: &TenantId,
    period: &BillingPeriod,
    currency: &str,
    prices: &PriceBook,
) -> Result<CostEstimate> {
    let (start, end) = period.window();
    let events = usage::list_in_window(store, tenant, start, end)?;
    let (_, total) = price(&events, prices);

    Ok(CostEstimate {
        currency: currency.to_string(),
        total,
    })
}

/// Get an invoice.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the invoice doesn't exist for the tenant.
pub fn get_invoice<S: Store>(
    store: &S,
    tenant: &TenantId,
    invoice_id: &InvoiceId,
) -> Result<Invoice> {
    store
        .get_invoice(tenant, invoice_id)?
        .ok_or_else(|| ControlError::NotFound("invoice".to_string()))
}
