//! # GST Split Rules
//!
//! One engine, four channel rules:
//!
//! | channel | interstate decision |
//! |---|---|
//! | amazon_mtr | customer state ≠ company state |
//! | amazon_str | always interstate (stock transfer, IGST only) |
//! | flipkart | customer state ≠ seller state (seller defaults to company) |
//! | pepperfry | MTR rule, after return-quantity adjustment of the base |
//!
//! Intrastate splits the rate in half across CGST and SGST; interstate puts
//! the whole rate on IGST. Each component rounds half-away-from-zero to the
//! paisa independently, so `cgst + sgst` may differ from the IGST path by
//! one paisa — the validation predicate allows exactly that.

use serde::{Deserialize, Serialize};

use gstx_core::{states, Channel, GstRate, Gstin, Money, NormalizedRow};

use crate::TaxError;

/// Result of one row's tax computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaxSplit {
    /// Validated rate slab.
    pub rate: GstRate,
    /// Taxable value after channel adjustments.
    pub taxable_value: Money,
    /// Shipping charges in the tax base.
    pub shipping_value: Money,
    /// Central GST.
    pub cgst: Money,
    /// State GST.
    pub sgst: Money,
    /// Integrated GST.
    pub igst: Money,
    /// Net quantity after returns.
    pub net_qty: i64,
    /// Returned quantity.
    pub returned_qty: i64,
}

impl TaxSplit {
    /// Total tax across components.
    pub fn total_tax(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }

    /// Whether the split satisfies the component invariant: CGST and SGST
    /// both zero or both nonzero, IGST exclusive with them, and the sum
    /// matching the rate within one paisa.
    pub fn is_valid(&self) -> bool {
        let intra = self.cgst.is_positive() || self.sgst.is_positive();
        let inter = self.igst.is_positive();
        if intra && inter {
            return false;
        }
        if self.cgst.is_positive() != self.sgst.is_positive() {
            return false;
        }
        let base = self.taxable_value + self.shipping_value;
        let expected = base.times_bps(self.rate.bps());
        self.total_tax().within(expected, 1)
    }
}

/// The channel-aware GST computation engine.
///
/// Stateless: all state comes from the company GSTIN captured at
/// construction and the row being computed.
#[derive(Debug, Clone)]
pub struct TaxRulesEngine {
    company_gstin: Gstin,
    company_state: &'static str,
}

impl TaxRulesEngine {
    /// Build an engine for a company registration.
    pub fn new(company_gstin: Gstin) -> Self {
        let company_state = company_gstin.state_abbrev();
        Self {
            company_gstin,
            company_state,
        }
    }

    /// The company's registered state abbreviation.
    pub fn company_state(&self) -> &'static str {
        self.company_state
    }

    /// The company GSTIN.
    pub fn company_gstin(&self) -> &Gstin {
        &self.company_gstin
    }

    /// Compute the split for one canonical row.
    pub fn compute_row(&self, row: &NormalizedRow) -> Result<TaxSplit, TaxError> {
        let rate =
            GstRate::from_bps(row.gst_rate_bps).ok_or(TaxError::InvalidRate(row.gst_rate_bps))?;
        match row.channel {
            Channel::AmazonMtr => self.compute_mtr_like(row, rate),
            Channel::AmazonStr => Ok(self.compute_str(row, rate)),
            Channel::Flipkart => self.compute_flipkart(row, rate),
            Channel::Pepperfry => self.compute_pepperfry(row, rate),
        }
    }

    fn compute_mtr_like(&self, row: &NormalizedRow, rate: GstRate) -> Result<TaxSplit, TaxError> {
        let intrastate = self.is_intrastate(&row.state_code)?;
        Ok(split(
            row.taxable_value,
            Money::ZERO,
            rate,
            intrastate,
            row.quantity,
            0,
        ))
    }

    fn compute_str(&self, row: &NormalizedRow, rate: GstRate) -> TaxSplit {
        // Stock transfers are IGST regardless of destination state.
        split(row.taxable_value, Money::ZERO, rate, false, row.quantity, 0)
    }

    fn compute_flipkart(&self, row: &NormalizedRow, rate: GstRate) -> Result<TaxSplit, TaxError> {
        let seller = row
            .seller_state
            .as_deref()
            .map(states::state_abbrev)
            .unwrap_or_else(|| self.company_state.to_string());
        let customer = resolve_state(&row.state_code)?;
        let intrastate = seller == customer;
        Ok(split(
            row.taxable_value,
            Money::ZERO,
            rate,
            intrastate,
            row.quantity,
            0,
        ))
    }

    fn compute_pepperfry(&self, row: &NormalizedRow, rate: GstRate) -> Result<TaxSplit, TaxError> {
        let total_qty = row.total_qty.unwrap_or(row.quantity.max(0)).max(0);
        let returned_qty = row.returned_qty.unwrap_or(0).max(0);

        let (taxable, net_qty) = if returned_qty > 0 && total_qty > 0 {
            let net = (total_qty - returned_qty).max(0);
            (row.taxable_value.times_ratio(net, total_qty), net)
        } else {
            (row.taxable_value, total_qty)
        };

        let intrastate = self.is_intrastate(&row.state_code)?;
        Ok(split(taxable, Money::ZERO, rate, intrastate, net_qty, returned_qty))
    }

    fn is_intrastate(&self, customer_state: &str) -> Result<bool, TaxError> {
        Ok(resolve_state(customer_state)? == self.company_state)
    }
}

fn resolve_state(state: &str) -> Result<String, TaxError> {
    if state.trim().is_empty() {
        return Err(TaxError::UnknownState(state.to_string()));
    }
    Ok(states::state_abbrev(state))
}

fn split(
    taxable: Money,
    shipping: Money,
    rate: GstRate,
    intrastate: bool,
    net_qty: i64,
    returned_qty: i64,
) -> TaxSplit {
    let base = taxable + shipping;
    let (cgst, sgst, igst) = if intrastate {
        let half = base.times_bps(rate.half_bps());
        (half, half, Money::ZERO)
    } else {
        (Money::ZERO, Money::ZERO, base.times_bps(rate.bps()))
    };
    TaxSplit {
        rate,
        taxable_value: taxable,
        shipping_value: shipping,
        cgst,
        sgst,
        igst,
        net_qty,
        returned_qty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::{Month, TransactionKind};

    fn engine() -> TaxRulesEngine {
        TaxRulesEngine::new(Gstin::new("06ABGCS4796R1ZA").unwrap())
    }

    fn row(channel: Channel, state: &str, taxable_paise: i64, rate_bps: i64) -> NormalizedRow {
        NormalizedRow {
            invoice_date: "2025-08-01".into(),
            kind: TransactionKind::Shipment,
            order_id: "O1".into(),
            sku: "SKU1".into(),
            asin: String::new(),
            quantity: 1,
            taxable_value: Money::from_paise(taxable_paise),
            gst_rate_bps: rate_bps,
            state_code: state.into(),
            seller_state: None,
            final_date: None,
            channel,
            gstin: "06ABGCS4796R1ZA".into(),
            month: Month::new("2025-08").unwrap(),
            is_return: false,
            total_qty: None,
            returned_qty: None,
        }
    }

    #[test]
    fn mtr_intrastate_splits_in_half() {
        let split = engine()
            .compute_row(&row(Channel::AmazonMtr, "HARYANA", 100_000, 1800))
            .unwrap();
        assert_eq!(split.cgst, Money::from_paise(9_000));
        assert_eq!(split.sgst, Money::from_paise(9_000));
        assert_eq!(split.igst, Money::ZERO);
        assert!(split.is_valid());
    }

    #[test]
    fn mtr_interstate_is_igst() {
        let split = engine()
            .compute_row(&row(Channel::AmazonMtr, "KARNATAKA", 105_900, 1800))
            .unwrap();
        assert_eq!(split.igst, Money::from_paise(19_062));
        assert_eq!(split.cgst, Money::ZERO);
        assert_eq!(split.sgst, Money::ZERO);
        assert!(split.is_valid());
    }

    #[test]
    fn str_forces_igst_even_in_state() {
        let split = engine()
            .compute_row(&row(Channel::AmazonStr, "HARYANA", 50_000, 1800))
            .unwrap();
        assert_eq!(split.igst, Money::from_paise(9_000));
        assert_eq!(split.cgst, Money::ZERO);
        assert!(split.is_valid());
    }

    #[test]
    fn flipkart_seller_state_defaults_to_company() {
        let mut r = row(Channel::Flipkart, "HARYANA", 100_000, 1800);
        let split = engine().compute_row(&r).unwrap();
        assert!(split.cgst.is_positive());

        r.seller_state = Some("KARNATAKA".into());
        let split = engine().compute_row(&r).unwrap();
        assert!(split.igst.is_positive());
    }

    #[test]
    fn pepperfry_return_adjustment() {
        let mut r = row(Channel::Pepperfry, "HARYANA", 40_000, 1800);
        r.quantity = 4;
        r.total_qty = Some(4);
        r.returned_qty = Some(1);
        let split = engine().compute_row(&r).unwrap();
        assert_eq!(split.taxable_value, Money::from_paise(30_000));
        assert_eq!(split.cgst, Money::from_paise(2_700));
        assert_eq!(split.sgst, Money::from_paise(2_700));
        assert_eq!(split.net_qty, 3);
        assert_eq!(split.returned_qty, 1);
    }

    #[test]
    fn off_slab_rate_is_rejected() {
        let err = engine()
            .compute_row(&row(Channel::AmazonMtr, "HARYANA", 100_000, 1500))
            .unwrap_err();
        assert_eq!(err, TaxError::InvalidRate(1500));
    }

    #[test]
    fn empty_state_is_unresolvable() {
        let err = engine()
            .compute_row(&row(Channel::AmazonMtr, "  ", 100_000, 1800))
            .unwrap_err();
        assert!(matches!(err, TaxError::UnknownState(_)));
    }

    #[test]
    fn zero_rate_is_all_zero() {
        let split = engine()
            .compute_row(&row(Channel::AmazonMtr, "HARYANA", 100_000, 0))
            .unwrap();
        assert_eq!(split.total_tax(), Money::ZERO);
        assert!(split.is_valid());
    }

    #[test]
    fn validation_rejects_mixed_components() {
        let mut split = engine()
            .compute_row(&row(Channel::AmazonMtr, "HARYANA", 100_000, 1800))
            .unwrap();
        split.igst = Money::from_paise(1);
        assert!(!split.is_valid());
    }
}
