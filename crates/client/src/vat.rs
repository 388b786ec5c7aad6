//! VAT classification and net/VAT/gross splits.
//!
//! Expense types map to a classification through a fixed table. A code in
//! neither list is an error: misclassifying an expense books the wrong tax.

use serde::{Deserialize, Serialize};

use crate::error::CrunchError;
use crate::money::{Money, VatRate};

// ── Classification tables ───────────────────────────────────────────

const EXEMPT_EXPENSE_TYPES: &[&str] = &[
    "GENERAL_INSURANCE",
    "MILEAGE_ALLOWANCE",
    "MEDICAL_INSURANCE_CONTRIBUTIONS",
    "BANK_CHARGES",
    "PENSION_SCHEME_CONTRIBUTIONS",
    "PUBLIC_TRANSPORT",
];

const LIABLE_EXPENSE_TYPES: &[&str] = &[
    "ACCOUNTANCY",
    "CHILDCARE_VOUCHER_ADMIN_FEES",
    "WEB_HOSTING_CLOUD_SERVICES",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VatClassification {
    Exempt,
    Liable,
}

/// Tag carried by sales invoice lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VatType {
    Standard,
    OutsideScope,
}

impl From<VatClassification> for VatType {
    fn from(c: VatClassification) -> Self {
        match c {
            VatClassification::Liable => VatType::Standard,
            VatClassification::Exempt => VatType::OutsideScope,
        }
    }
}

/// Invariant: `gross == net + vat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub net: Money,
    pub vat: Money,
    pub gross: Money,
}

/// Look up an expense type in the static tables.
pub fn classify(expense_type: &str) -> Result<VatClassification, CrunchError> {
    if EXEMPT_EXPENSE_TYPES.contains(&expense_type) {
        Ok(VatClassification::Exempt)
    } else if LIABLE_EXPENSE_TYPES.contains(&expense_type) {
        Ok(VatClassification::Liable)
    } else {
        Err(CrunchError::UnknownVatClassification(expense_type.to_string()))
    }
}

/// Expense (inward) split: `amount` is what was paid.
pub fn split(amount: Money, classification: VatClassification, rate: VatRate) -> Split {
    match classification {
        VatClassification::Exempt => Split {
            net: amount,
            vat: Money::ZERO,
            gross: amount,
        },
        VatClassification::Liable => {
            let vat = rate.apply(amount);
            Split {
                net: amount - vat,
                vat,
                gross: amount,
            }
        }
    }
}

/// Invoice (outward) split: `net` is `rate × quantity`, VAT is added on top.
pub fn invoice_split(net: Money, vat_type: VatType, rate: VatRate) -> Split {
    let vat = match vat_type {
        VatType::Standard => rate.apply(net),
        VatType::OutsideScope => Money::ZERO,
    };
    Split {
        net,
        vat,
        gross: net + vat,
    }
}

/// Session-scoped calculator carrying the configured VAT rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmountCalculator {
    rate: VatRate,
}

impl AmountCalculator {
    pub fn new(rate: VatRate) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> VatRate {
        self.rate
    }

    pub fn classify(&self, expense_type: &str) -> Result<VatClassification, CrunchError> {
        classify(expense_type)
    }

    pub fn split(&self, amount: Money, classification: VatClassification) -> Split {
        split(amount, classification, self.rate)
    }

    /// Classify then split an expense amount.
    pub fn expense_split(&self, amount: Money, expense_type: &str) -> Result<Split, CrunchError> {
        Ok(self.split(amount, self.classify(expense_type)?))
    }

    /// Net amount for an invoice line, rounded half-up to the penny.
    /// The quantity must be finite and not negative.
    pub fn line_amount(&self, unit_rate: Money, quantity: f64) -> Result<Money, CrunchError> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(CrunchError::InvalidQuantity(quantity));
        }
        Ok(Money::from_minor((unit_rate.minor() as f64 * quantity).round() as i64))
    }

    pub fn invoice_split(&self, net: Money, vat_type: VatType) -> Split {
        invoice_split(net, vat_type, self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbp(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn test_classify_tables() {
        for code in EXEMPT_EXPENSE_TYPES {
            assert_eq!(classify(code).unwrap(), VatClassification::Exempt, "{}", code);
        }
        for code in LIABLE_EXPENSE_TYPES {
            assert_eq!(classify(code).unwrap(), VatClassification::Liable, "{}", code);
        }
    }

    #[test]
    fn test_classify_unknown_is_error() {
        let err = classify("STATIONERY").unwrap_err();
        assert!(matches!(err, CrunchError::UnknownVatClassification(ref c) if c == "STATIONERY"));
        // Case matters
        assert!(classify("accountancy").is_err());
        assert!(classify("").is_err());
    }

    #[test]
    fn test_split_liable() {
        let s = split(gbp(10000), VatClassification::Liable, VatRate::STANDARD);
        assert_eq!(s, Split { net: gbp(8000), vat: gbp(2000), gross: gbp(10000) });
    }

    #[test]
    fn test_split_exempt() {
        let s = split(gbp(10000), VatClassification::Exempt, VatRate::STANDARD);
        assert_eq!(s, Split { net: gbp(10000), vat: Money::ZERO, gross: gbp(10000) });
    }

    #[test]
    fn test_split_rounds_half_up() {
        // 33.33 × 20% = 6.666 → 6.67
        let s = split(gbp(3333), VatClassification::Liable, VatRate::STANDARD);
        assert_eq!(s.vat, gbp(667));
        assert_eq!(s.net, gbp(2666));
        assert_eq!(s.net + s.vat, s.gross);
    }

    #[test]
    fn test_invoice_split() {
        let calc = AmountCalculator::new(VatRate::STANDARD);
        let net = calc.line_amount(gbp(5000), 3.0).unwrap();
        assert_eq!(net, gbp(15000));
        let s = calc.invoice_split(net, VatType::Standard);
        assert_eq!(s, Split { net: gbp(15000), vat: gbp(3000), gross: gbp(18000) });

        let s = calc.invoice_split(net, VatType::OutsideScope);
        assert_eq!(s.vat, Money::ZERO);
        assert_eq!(s.gross, gbp(15000));
    }

    #[test]
    fn test_line_amount_fractional_quantity() {
        let calc = AmountCalculator::default();
        assert_eq!(calc.line_amount(gbp(4500), 7.5).unwrap(), gbp(33750));
        assert_eq!(calc.line_amount(gbp(4500), 0.0).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_line_amount_rejects_bad_quantity() {
        let calc = AmountCalculator::default();
        for q in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -1.0] {
            assert!(matches!(calc.line_amount(gbp(4500), q), Err(CrunchError::InvalidQuantity(_))));
        }
    }

    #[test]
    fn test_expense_split_custom_rate() {
        let calc = AmountCalculator::new(VatRate::from_percent(17.5));
        let s = calc.expense_split(gbp(10000), "ACCOUNTANCY").unwrap();
        assert_eq!(s.vat, gbp(1750));
        assert_eq!(s.net, gbp(8250));
        assert!(calc.expense_split(gbp(10000), "UNKNOWN").is_err());
    }

    #[test]
    fn test_vat_type_wire_names() {
        assert_eq!(serde_json::to_value(VatType::Standard).unwrap(), "STANDARD");
        assert_eq!(serde_json::to_value(VatType::OutsideScope).unwrap(), "OUTSIDE_SCOPE");
    }
}
