//! # Universal Properties
//!
//! Property tests over the arithmetic core: tax-split determinism and
//! component exclusivity, money parse/format round-trips, and batch
//! conservation across arbitrary pivots.

use proptest::prelude::*;

use gstx_core::{Channel, GstRate, Gstin, Money, Month, NormalizedRow, TransactionKind};
use gstx_pivot::{pivot_rows, validate_split, split_batches};
use gstx_tax::{compute_taxes, TaxRulesEngine};
use gstx_masters::MappedRow;

const COMPANY_GSTIN: &str = "06ABGCS4796R1ZA";

fn arb_rate_bps() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(0i64),
        Just(500i64),
        Just(1200i64),
        Just(1800i64),
        Just(2800i64),
    ]
}

fn arb_state() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("HARYANA"),
        Just("KARNATAKA"),
        Just("DELHI"),
        Just("MAHARASHTRA"),
        Just("TAMIL NADU"),
    ]
}

fn mapped_row(
    channel: Channel,
    state: &str,
    taxable_paise: i64,
    rate_bps: i64,
    order: usize,
) -> MappedRow {
    MappedRow {
        row: NormalizedRow {
            invoice_date: "2025-08-01".into(),
            kind: TransactionKind::Shipment,
            order_id: format!("O{order}"),
            sku: "SKU1".into(),
            asin: String::new(),
            quantity: 1,
            taxable_value: Money::from_paise(taxable_paise),
            gst_rate_bps: rate_bps,
            state_code: state.into(),
            seller_state: None,
            final_date: None,
            channel,
            gstin: COMPANY_GSTIN.into(),
            month: Month::new("2025-08").unwrap(),
            is_return: false,
            total_qty: None,
            returned_qty: None,
        },
        fg: "Widget".into(),
        ledger_name: format!("Ledger {state}"),
        item_resolved: true,
        ledger_resolved: true,
    }
}

proptest! {
    /// cgst+sgst+igst equals round(total × rate) within one paisa, and the
    /// component pattern matches the channel rule.
    #[test]
    fn tax_split_matches_rate_and_rule(
        taxable in 1i64..50_000_000,
        rate_bps in arb_rate_bps(),
        state in arb_state(),
    ) {
        let engine = TaxRulesEngine::new(Gstin::new(COMPANY_GSTIN).unwrap());
        let row = mapped_row(Channel::AmazonMtr, state, taxable, rate_bps, 1);
        let split = engine.compute_row(&row.row).unwrap();

        let expected = Money::from_paise(taxable).times_bps(rate_bps);
        prop_assert!(split.total_tax().within(expected, 1));
        prop_assert!(split.is_valid());

        // Component exclusivity.
        let intra = split.cgst.is_positive() || split.sgst.is_positive();
        let inter = split.igst.is_positive();
        prop_assert!(!(intra && inter));
        if state == "HARYANA" && rate_bps > 0 {
            prop_assert!(intra, "company-state sale must be intrastate");
        }
    }

    /// The split is a pure function: recomputation yields identical output.
    #[test]
    fn tax_split_is_deterministic(
        taxable in 1i64..10_000_000,
        rate_bps in arb_rate_bps(),
        state in arb_state(),
    ) {
        let engine = TaxRulesEngine::new(Gstin::new(COMPANY_GSTIN).unwrap());
        let row = mapped_row(Channel::AmazonMtr, state, taxable, rate_bps, 1);
        let a = engine.compute_row(&row.row).unwrap();
        let b = engine.compute_row(&row.row).unwrap();
        prop_assert_eq!(a.cgst, b.cgst);
        prop_assert_eq!(a.sgst, b.sgst);
        prop_assert_eq!(a.igst, b.igst);
    }

    /// STR never emits central components, whatever the state.
    #[test]
    fn str_is_always_igst(
        taxable in 1i64..10_000_000,
        state in arb_state(),
    ) {
        let engine = TaxRulesEngine::new(Gstin::new(COMPANY_GSTIN).unwrap());
        let row = mapped_row(Channel::AmazonStr, state, taxable, 1800, 1);
        let split = engine.compute_row(&row.row).unwrap();
        prop_assert_eq!(split.cgst, Money::ZERO);
        prop_assert_eq!(split.sgst, Money::ZERO);
    }

    /// Money display/parse round-trips exactly.
    #[test]
    fn money_display_parse_roundtrip(paise in -1_000_000_000i64..1_000_000_000) {
        let money = Money::from_paise(paise);
        let parsed = Money::parse(&money.to_string()).unwrap();
        prop_assert_eq!(money, parsed);
    }

    /// Batch split conserves record counts and totals for arbitrary mixes
    /// of rates and states.
    #[test]
    fn batch_split_conserves_pivot_totals(
        rows in prop::collection::vec(
            (1i64..5_000_000, arb_rate_bps(), arb_state()),
            1..40,
        ),
    ) {
        let engine = TaxRulesEngine::new(Gstin::new(COMPANY_GSTIN).unwrap());
        let mapped: Vec<MappedRow> = rows
            .iter()
            .enumerate()
            .map(|(i, (taxable, rate, state))| {
                mapped_row(Channel::AmazonMtr, state, *taxable, *rate, i)
            })
            .collect();
        let (taxed, _) = compute_taxes(mapped, &engine);
        let (pivot, _) = pivot_rows(&taxed, Channel::AmazonMtr);

        let dir = tempfile::tempdir().unwrap();
        let (batches, validation) = split_batches(
            &pivot,
            Channel::AmazonMtr,
            COMPANY_GSTIN,
            &Month::new("2025-08").unwrap(),
            dir.path(),
        )
        .unwrap();

        prop_assert!(validation.passed);
        prop_assert_eq!(validation.batch_records, pivot.len());
        let revalidated = validate_split(&pivot, &batches);
        prop_assert!(revalidated.passed);

        // One file per distinct rate in the pivot.
        let distinct: std::collections::BTreeSet<i64> =
            pivot.iter().map(|r| r.gst_rate.bps()).collect();
        prop_assert_eq!(batches.len(), distinct.len());
    }
}

#[test]
fn gst_rate_label_matches_batch_name_fragment() {
    for rate in GstRate::all() {
        let label = rate.percent_label();
        assert!(!label.contains('.'), "labels are whole percents: {label}");
    }
}
