//! FILENAME: core/persistence/src/codegen.rs
//! Renders a pivot slot as a standalone Rust function.
//!
//! The generated function rebuilds the slot's filter chain and layout with the
//! public `pivot_engine` API and runs both against a caller-supplied table.
//! Output is deterministic: the same configuration always renders the same
//! text. Inert filters and inactive value pairs are left out, exactly as the
//! engine would ignore them.

use std::fmt::Write;

use engine::dates::to_iso;
use engine::CellValue;
use pivot_engine::{AggregationType, FilterOperator, FilterSpec, FilterValue, PivotConfig};

/// Rust source for a function `build_view(source: &Table)` equivalent to `config`.
pub fn generate_code(config: &PivotConfig) -> String {
    let layout = &config.layout;
    let mut out = String::new();

    out.push_str("use engine::{CellValue, Table};\n");
    out.push_str("use pivot_engine::{\n");
    out.push_str("    apply_filters, build_pivot, AggregationType, FilterOperator, FilterSpec, FilterValue,\n");
    out.push_str("    PivotError, PivotLayout, PivotTable, ValueAgg,\n");
    out.push_str("};\n\n");

    let _ = writeln!(out, "/// Pivot view {}.", rust_str(&config.name));
    out.push_str("pub fn build_view(source: &Table) -> Result<PivotTable, PivotError> {\n");

    out.push_str("    let filters: Vec<FilterSpec> = vec![\n");
    for filter in config.filters.iter().filter(|f| !f.is_inert()) {
        let _ = writeln!(out, "        {},", filter_expr(filter));
    }
    out.push_str("    ];\n\n");

    out.push_str("    let layout = PivotLayout {\n");
    let _ = writeln!(out, "        index_cols: {},", string_vec(&layout.index_cols));
    let _ = writeln!(out, "        column_cols: {},", string_vec(&layout.column_cols));
    out.push_str("        value_agg_list: vec![\n");
    for value in layout.value_agg_list.iter().filter(|v| v.is_active()) {
        let expr = match (value.agg_func, &value.value_col) {
            (AggregationType::Size, _) | (_, None) => "ValueAgg::size()".to_string(),
            (agg, Some(col)) => format!(
                "ValueAgg::new({}, AggregationType::{})",
                rust_str(col),
                aggregation_variant(agg)
            ),
        };
        let _ = writeln!(out, "            {},", expr);
    }
    out.push_str("        ],\n");
    let _ = writeln!(out, "        fill_value_enabled: {},", layout.fill_value_enabled);
    let fill = match &layout.fill_value {
        Some(value) if !value.is_empty() => format!("Some({})", cell_expr(value)),
        _ => "None".to_string(),
    };
    let _ = writeln!(out, "        fill_value: {},", fill);
    let _ = writeln!(out, "        margins_enabled: {},", layout.margins_enabled);
    let _ = writeln!(out, "        margins_name: {}.to_string(),", rust_str(&layout.margins_name));
    out.push_str("    };\n\n");

    out.push_str("    let filtered = apply_filters(source, &filters);\n");
    out.push_str("    for warning in &filtered.warnings {\n");
    out.push_str("        eprintln!(\"{}\", warning);\n");
    out.push_str("    }\n");
    out.push_str("    build_pivot(&filtered.table, &layout)\n");
    out.push_str("}\n");
    out
}

fn filter_expr(filter: &FilterSpec) -> String {
    let column = rust_str(filter.column.as_deref().unwrap_or_default());
    let operator = format!("FilterOperator::{}", operator_variant(filter.operator));

    match &filter.value {
        FilterValue::None => format!("FilterSpec::relative({}, {})", column, operator),
        FilterValue::Scalar(value) => {
            format!("FilterSpec::new({}, {}, {})", column, operator, cell_expr(value))
        }
        FilterValue::Range(start, end) if filter.operator == FilterOperator::IsBetween => {
            format!("FilterSpec::between({}, {}, {})", column, cell_expr(start), cell_expr(end))
        }
        FilterValue::Range(start, end) => format!(
            "FilterSpec {{ column: Some({}.to_string()), operator: {}, value: FilterValue::Range({}, {}) }}",
            column,
            operator,
            cell_expr(start),
            cell_expr(end)
        ),
    }
}

/// A `CellValue` constructor. Dates are written as ISO text, which every
/// date-aware operator parses back.
fn cell_expr(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "CellValue::Empty".to_string(),
        CellValue::Number(n) => format!("CellValue::Number({:?})", n),
        CellValue::Text(s) => format!("CellValue::text({})", rust_str(s)),
        CellValue::Boolean(b) => format!("CellValue::Boolean({})", b),
        CellValue::Date(dt) => format!("CellValue::text({})", rust_str(&to_iso(dt))),
    }
}

fn rust_str(s: &str) -> String {
    format!("{:?}", s)
}

fn string_vec(items: &[String]) -> String {
    let parts: Vec<String> = items.iter().map(|s| format!("{}.to_string()", rust_str(s))).collect();
    format!("vec![{}]", parts.join(", "))
}

fn operator_variant(op: FilterOperator) -> &'static str {
    match op {
        FilterOperator::Equals => "Equals",
        FilterOperator::NotEquals => "NotEquals",
        FilterOperator::Contains => "Contains",
        FilterOperator::NotContains => "NotContains",
        FilterOperator::In => "In",
        FilterOperator::NotIn => "NotIn",
        FilterOperator::GreaterThan => "GreaterThan",
        FilterOperator::LessThan => "LessThan",
        FilterOperator::GreaterThanOrEqual => "GreaterThanOrEqual",
        FilterOperator::LessThanOrEqual => "LessThanOrEqual",
        FilterOperator::IsExactly => "IsExactly",
        FilterOperator::IsNot => "IsNot",
        FilterOperator::IsAfter => "IsAfter",
        FilterOperator::IsOnOrAfter => "IsOnOrAfter",
        FilterOperator::IsBefore => "IsBefore",
        FilterOperator::IsOnOrBefore => "IsOnOrBefore",
        FilterOperator::IsBetween => "IsBetween",
        FilterOperator::IsCurrentMonth => "IsCurrentMonth",
        FilterOperator::IsPreviousMonth => "IsPreviousMonth",
        FilterOperator::IsNextMonth => "IsNextMonth",
        FilterOperator::IsCurrentYear => "IsCurrentYear",
        FilterOperator::IsPreviousYear => "IsPreviousYear",
        FilterOperator::IsNextYear => "IsNextYear",
    }
}

fn aggregation_variant(agg: AggregationType) -> &'static str {
    match agg {
        AggregationType::Sum => "Sum",
        AggregationType::Mean => "Mean",
        AggregationType::Median => "Median",
        AggregationType::Min => "Min",
        AggregationType::Max => "Max",
        AggregationType::Count => "Count",
        AggregationType::Size => "Size",
        AggregationType::Std => "Std",
        AggregationType::Var => "Var",
        AggregationType::Nunique => "Nunique",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pivot_engine::ValueAgg;

    fn config() -> PivotConfig {
        let mut config = PivotConfig::new("Fees \"Q2\"");
        config.filters = vec![
            FilterSpec::new("Extra2", FilterOperator::Equals, "Avibra"),
            FilterSpec::default(),
            FilterSpec::new("Fee", FilterOperator::GreaterThanOrEqual, 90.0),
            FilterSpec::relative("Booked", FilterOperator::IsCurrentMonth),
        ];
        config.layout.index_cols = vec!["Agent".to_string()];
        config.layout.value_agg_list = vec![
            ValueAgg::new("Fee", AggregationType::Median),
            ValueAgg::default(),
            ValueAgg::size(),
        ];
        config.layout.margins_enabled = true;
        config
    }

    #[test]
    fn renders_filters_in_order_and_skips_inert_ones() {
        let code = generate_code(&config());
        let equals = code.find("FilterSpec::new(\"Extra2\", FilterOperator::Equals, CellValue::text(\"Avibra\"))").unwrap();
        let fee = code.find("FilterSpec::new(\"Fee\", FilterOperator::GreaterThanOrEqual, CellValue::Number(90.0))").unwrap();
        let month = code.find("FilterSpec::relative(\"Booked\", FilterOperator::IsCurrentMonth)").unwrap();
        assert!(equals < fee && fee < month);
        assert_eq!(code.matches("FilterSpec::").count(), 3);
    }

    #[test]
    fn renders_layout() {
        let code = generate_code(&config());
        assert!(code.contains("index_cols: vec![\"Agent\".to_string()],"));
        assert!(code.contains("column_cols: vec![],"));
        assert!(code.contains("ValueAgg::new(\"Fee\", AggregationType::Median),"));
        assert_eq!(code.matches("ValueAgg::size()").count(), 1);
        assert!(code.contains("margins_enabled: true,"));
        assert!(code.contains("margins_name: \"All_Totals\".to_string(),"));
        assert!(code.contains("/// Pivot view \"Fees \\\"Q2\\\"\"."));
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(generate_code(&config()), generate_code(&config()));
    }

    #[test]
    fn dates_render_as_iso_text() {
        let mut config = config();
        let start = engine::dates::parse_datetime("2024-01-01").unwrap();
        config.filters = vec![FilterSpec::between("Booked", start, "2024-01-31")];
        let code = generate_code(&config);
        assert!(code.contains(
            "FilterSpec::between(\"Booked\", CellValue::text(\"2024-01-01T00:00:00\"), CellValue::text(\"2024-01-31\"))"
        ));
    }
}
