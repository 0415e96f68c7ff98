use serde::{Deserialize, Serialize};

/// Default GST rate applied to the discounted subtotal.
pub const DEFAULT_TAX_RATE: f64 = 0.18;

/// Flat convenience fee added after tax, in the booking currency.
pub const DEFAULT_SERVICE_FEE: f64 = 50.0;

/// Deterministic price breakdown for a quantity of one seat type. Never
/// persisted; always recomputed from live inputs so a stale quote can't be
/// acted on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingQuote {
    pub subtotal: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub service_fee: f64,
    pub total: f64,
}

/// Compute the quote: discount applies to the subtotal before tax, and the
/// service fee is flat. Out-of-range discounts are rejected rather than
/// clamped so a promo-validator bug surfaces immediately.
pub fn compute_quote(
    unit_price: f64,
    quantity: u32,
    discount_percent: f64,
    tax_rate: f64,
    service_fee: f64,
) -> Result<PricingQuote, PricingError> {
    if quantity == 0 {
        return Err(PricingError::ZeroQuantity);
    }
    if !unit_price.is_finite() || unit_price < 0.0 {
        return Err(PricingError::InvalidUnitPrice(unit_price));
    }
    if !(0.0..=100.0).contains(&discount_percent) {
        return Err(PricingError::DiscountOutOfRange(discount_percent));
    }

    let subtotal = unit_price * quantity as f64;
    let discount_amount = subtotal * discount_percent / 100.0;
    let taxable = subtotal - discount_amount;
    let tax_amount = taxable * tax_rate;
    let total = taxable + tax_amount + service_fee;

    Ok(PricingQuote {
        subtotal,
        discount_percent,
        discount_amount,
        tax_rate,
        tax_amount,
        service_fee,
        total,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    #[error("invalid unit price: {0}")]
    InvalidUnitPrice(f64),

    #[error("discount percent out of range: {0}")]
    DiscountOutOfRange(f64),
}
