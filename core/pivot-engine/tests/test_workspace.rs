//! FILENAME: tests/test_workspace.rs
//! Integration tests for pivot slots and refresh.

mod common;

use common::{assert_number, body_cell, text, AppointmentFixture};
use pivot_engine::{
    AggregationType, FilterOperator, FilterSpec, PivotStatus, PivotWorkspace, ValueAgg,
};

fn fee_by_agent(ws: &mut PivotWorkspace) -> usize {
    let index = ws.add_pivot();
    ws.edit(index, |p| {
        p.layout.index_cols = vec!["Agent".to_string()];
        p.layout.value_agg_list = vec![ValueAgg::new("Fee", AggregationType::Sum)];
    })
    .unwrap();
    index
}

#[test]
fn test_refresh_stores_result_and_warnings() {
    let mut ws = PivotWorkspace::new();
    let index = fee_by_agent(&mut ws);
    ws.edit(index, |p| {
        p.filters = vec![
            FilterSpec::new("Extra2", FilterOperator::Equals, "Avibra"),
            FilterSpec::new("Nowhere", FilterOperator::Equals, "x"),
        ];
    })
    .unwrap();

    let status = ws
        .refresh(index, &AppointmentFixture::table(), &AppointmentFixture::clock())
        .unwrap()
        .clone();

    let computed = match status {
        PivotStatus::Computed(c) => c,
        other => panic!("expected a computed pivot, got {:?}", other),
    };
    assert_eq!(computed.filtered_rows, 3);
    assert_eq!(computed.warnings.len(), 1);

    let fee = ValueAgg::new("Fee", AggregationType::Sum);
    assert_number(body_cell(&computed.table, &[text("Cid")], &fee, &[]), 90.0);
}

#[test]
fn test_edit_invalidates_previous_result() {
    let mut ws = PivotWorkspace::new();
    let index = fee_by_agent(&mut ws);
    ws.refresh(index, &AppointmentFixture::table(), &AppointmentFixture::clock())
        .unwrap();
    assert!(ws.get(index).unwrap().status.table().is_some());

    ws.edit(index, |p| p.layout.margins_enabled = true).unwrap();
    assert!(ws.get(index).unwrap().status.is_pending());
}

#[test]
fn test_failures_are_kept_per_slot() {
    let mut ws = PivotWorkspace::new();
    let good = fee_by_agent(&mut ws);
    let empty = fee_by_agent(&mut ws);
    let unconfigured = ws.add_pivot();
    ws.edit(empty, |p| {
        p.filters = vec![FilterSpec::new("Agent", FilterOperator::Equals, "Nobody")];
    })
    .unwrap();

    let computed = ws.refresh_all(&AppointmentFixture::table(), &AppointmentFixture::clock());
    assert_eq!(computed, 1);
    assert!(ws.get(good).unwrap().status.table().is_some());
    assert_eq!(
        ws.get(empty).unwrap().status.error(),
        Some("No data after applying filters.")
    );
    assert_eq!(
        ws.get(unconfigured).unwrap().status.error(),
        Some("Select at least one row or column field.")
    );
}

#[test]
fn test_copied_filters_apply_to_targets() {
    let mut ws = PivotWorkspace::new();
    let source = fee_by_agent(&mut ws);
    let target = fee_by_agent(&mut ws);
    ws.edit(source, |p| {
        p.filters = vec![FilterSpec::relative("Booked", FilterOperator::IsCurrentMonth)];
    })
    .unwrap();

    assert_eq!(ws.copy_filters(source, &[target]), Ok(1));
    ws.refresh(target, &AppointmentFixture::table(), &AppointmentFixture::clock())
        .unwrap();

    let pivot = ws.get(target).unwrap().status.table().unwrap();
    assert_eq!(pivot.row_count(), 2);
}
