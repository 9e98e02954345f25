// medallion-core/src/domain/quality/rules.rs
//
// The seven firewall checks. Each one is a pure scan of the Bronze tables: no check
// reads another check's output, so their order only affects report layout.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::domain::quality::check::ColumnCompleteness;
use crate::domain::quality::disposition::Disposition;
use crate::domain::schema::datasets::{POS_SALES, SHIPMENTS, WAREHOUSE_INVENTORY, WEB_ORDERS};
use crate::domain::table::{Datasets, Table};

pub struct CheckContext<'a> {
    pub datasets: &'a Datasets,
    pub run_date: NaiveDate,
    /// Minimum non-null ratio (0..=1) for check 7.
    pub completeness_threshold: f64,
}

impl<'a> CheckContext<'a> {
    /// The dataset, if it was loaded and carries every column in `columns`.
    fn table(&self, dataset: &str, columns: &[&str]) -> Option<&'a Table> {
        self.datasets
            .get(dataset)
            .filter(|t| columns.iter().all(|c| t.has_column(c)))
    }
}

/// A violating row (or column, for check 7).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub dataset: String,
    pub row: Option<usize>,
    pub column: Option<String>,
    pub value: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub rows_checked: usize,
    pub violations: Vec<Violation>,
    pub column_metrics: Vec<ColumnCompleteness>,
}

pub struct CheckDefinition {
    pub id: u8,
    pub name: &'static str,
    pub rule: &'static str,
    /// Empty means "every dataset present".
    pub datasets: &'static [&'static str],
    pub disposition: Disposition,
    pub evaluate: fn(&CheckContext<'_>) -> Findings,
}

pub const SALES_QTY_RANGE: (i64, i64) = (1, 10_000);
pub const STOCK_QTY_RANGE: (i64, i64) = (0, 10_000);

const PRICE_COLUMNS: [(&str, &str); 2] = [(POS_SALES, "unit_price"), (WEB_ORDERS, "unit_price")];
const DATE_COLUMNS: [(&str, &str); 3] = [
    (POS_SALES, "invoice_date"),
    (WEB_ORDERS, "order_date"),
    (SHIPMENTS, "ship_date"),
];
const CUSTOMER_COLUMNS: [(&str, &str); 2] = [(POS_SALES, "customer_id"), (WEB_ORDERS, "customer_id")];
const COMPOSITE_KEYS: [(&str, &[&str]); 3] = [
    (POS_SALES, &["invoice_no", "product_id"]),
    (WEB_ORDERS, &["order_id"]),
    (SHIPMENTS, &["shipment_id"]),
];
const QUANTITY_COLUMNS: [(&str, &str, (i64, i64)); 3] = [
    (POS_SALES, "quantity", SALES_QTY_RANGE),
    (WEB_ORDERS, "quantity", SALES_QTY_RANGE),
    (WAREHOUSE_INVENTORY, "quantity_on_hand", STOCK_QTY_RANGE),
];

pub const CHECKS: [CheckDefinition; 7] = [
    CheckDefinition {
        id: 1,
        name: "No Negative Prices",
        rule: "unit_price >= 0",
        datasets: &[POS_SALES, WEB_ORDERS],
        disposition: Disposition::Quarantine,
        evaluate: check_negative_prices,
    },
    CheckDefinition {
        id: 2,
        name: "No Future Dates",
        rule: "date <= run_date",
        datasets: &[POS_SALES, WEB_ORDERS, SHIPMENTS],
        disposition: Disposition::Reject,
        evaluate: check_future_dates,
    },
    CheckDefinition {
        id: 3,
        name: "No Null Customer IDs",
        rule: "customer_id IS NOT NULL",
        datasets: &[POS_SALES, WEB_ORDERS],
        disposition: Disposition::FillSentinel,
        evaluate: check_null_customers,
    },
    CheckDefinition {
        id: 4,
        name: "No Duplicates",
        rule: "Composite key uniqueness",
        datasets: &[POS_SALES, WEB_ORDERS, SHIPMENTS],
        disposition: Disposition::DropDuplicate,
        evaluate: check_duplicates,
    },
    CheckDefinition {
        id: 5,
        name: "Referential Integrity",
        rule: "shipments.order_id exists in web_orders.order_id",
        datasets: &[SHIPMENTS, WEB_ORDERS],
        disposition: Disposition::RejectOrphan,
        evaluate: check_referential_integrity,
    },
    CheckDefinition {
        id: 6,
        name: "Quantity Range",
        rule: "1 <= quantity <= 10,000 (stock: 0 <= quantity_on_hand <= 10,000)",
        datasets: &[POS_SALES, WEB_ORDERS, WAREHOUSE_INVENTORY],
        disposition: Disposition::FlagOutlier,
        evaluate: check_quantity_range,
    },
    CheckDefinition {
        id: 7,
        name: "Column Completeness",
        rule: "non-null ratio per column >= threshold",
        datasets: &[],
        disposition: Disposition::ReportOnly,
        evaluate: check_completeness,
    },
];

fn violation(dataset: &str, row: usize, column: &str, value: String, reason: &str) -> Violation {
    Violation {
        dataset: dataset.to_string(),
        row: Some(row),
        column: Some(column.to_string()),
        value: Some(value),
        reason: reason.to_string(),
    }
}

// --- CHECK 1 ---
fn check_negative_prices(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    for (ds, col) in PRICE_COLUMNS {
        let Some(table) = ctx.table(ds, &[col]) else {
            continue;
        };
        findings.rows_checked += table.num_rows();
        for row in 0..table.num_rows() {
            // A null price is not negative; completeness covers it.
            match table.value(row, col).as_f64() {
                Some(price) if price < 0.0 => findings
                    .violations
                    .push(violation(ds, row, col, price.to_string(), "negative_unit_price")),
                _ => {}
            }
        }
    }
    findings
}

// --- CHECK 2 ---
fn check_future_dates(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    for (ds, col) in DATE_COLUMNS {
        let Some(table) = ctx.table(ds, &[col]) else {
            continue;
        };
        findings.rows_checked += table.num_rows();
        for row in 0..table.num_rows() {
            // A null date is a completeness problem (check 7), not a future one.
            if let Some(d) = table.value(row, col).as_date().filter(|d| *d > ctx.run_date) {
                findings
                    .violations
                    .push(violation(ds, row, col, d.to_string(), "future_date"));
            }
        }
    }
    findings
}

// --- CHECK 3 ---
fn check_null_customers(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    for (ds, col) in CUSTOMER_COLUMNS {
        let Some(table) = ctx.table(ds, &[col]) else {
            continue;
        };
        findings.rows_checked += table.num_rows();
        for row in 0..table.num_rows() {
            if table.value(row, col).is_blank() {
                findings
                    .violations
                    .push(violation(ds, row, col, String::new(), "null_customer_id"));
            }
        }
    }
    findings
}

// --- CHECK 4 ---
fn check_duplicates(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    for (ds, keys) in COMPOSITE_KEYS {
        let Some(table) = ctx.table(ds, keys) else {
            continue;
        };
        findings.rows_checked += table.num_rows();
        let mut seen = HashSet::with_capacity(table.num_rows());
        for row in 0..table.num_rows() {
            let key: Vec<String> = keys.iter().map(|k| table.value(row, k).key_repr()).collect();
            let display = key.join("|");
            // First occurrence wins.
            if !seen.insert(key) {
                findings.violations.push(Violation {
                    dataset: ds.to_string(),
                    row: Some(row),
                    column: Some(keys.join("+")),
                    value: Some(display),
                    reason: "duplicate_key".to_string(),
                });
            }
        }
    }
    findings
}

// --- CHECK 5 ---
fn check_referential_integrity(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    let (Some(child), Some(parent)) = (
        ctx.table(SHIPMENTS, &["order_id"]),
        ctx.table(WEB_ORDERS, &["order_id"]),
    ) else {
        return findings;
    };

    let parents: HashSet<&str> = (0..parent.num_rows())
        .filter_map(|r| parent.value(r, "order_id").as_str())
        .collect();

    findings.rows_checked += child.num_rows();
    for row in 0..child.num_rows() {
        let fk = child.value(row, "order_id");
        let resolved = fk.as_str().is_some_and(|id| parents.contains(id));
        if !resolved {
            findings.violations.push(violation(
                SHIPMENTS,
                row,
                "order_id",
                fk.to_string(),
                "orphan_order_id",
            ));
        }
    }
    findings
}

// --- CHECK 6 ---
fn check_quantity_range(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    for (ds, col, (min, max)) in QUANTITY_COLUMNS {
        let Some(table) = ctx.table(ds, &[col]) else {
            continue;
        };
        findings.rows_checked += table.num_rows();
        for row in 0..table.num_rows() {
            match table.value(row, col).as_i64() {
                Some(q) if (min..=max).contains(&q) => {}
                Some(q) => findings
                    .violations
                    .push(violation(ds, row, col, q.to_string(), "quantity_out_of_range")),
                None => findings
                    .violations
                    .push(violation(ds, row, col, String::new(), "quantity_missing")),
            }
        }
    }
    findings
}

// --- CHECK 7 ---
fn check_completeness(ctx: &CheckContext<'_>) -> Findings {
    let mut findings = Findings::default();
    let threshold_pct = ctx.completeness_threshold * 100.0;

    for (ds, table) in ctx.datasets {
        findings.rows_checked += table.num_rows();
        let total = table.num_rows();
        for column in table.column_names() {
            let non_null = (0..total)
                .filter(|r| !table.value(*r, column).is_blank())
                .count();
            // An empty table has nothing missing.
            let pct = if total == 0 {
                100.0
            } else {
                ((non_null as f64 / total as f64) * 1000.0).round() / 10.0
            };
            let below = pct < threshold_pct;
            if below {
                findings.violations.push(Violation {
                    dataset: ds.clone(),
                    row: None,
                    column: Some(column.to_string()),
                    value: Some(format!("{pct}%")),
                    reason: "low_completeness".to_string(),
                });
            }
            findings.column_metrics.push(ColumnCompleteness {
                source: ds.clone(),
                column: column.to_string(),
                total_rows: total,
                non_null_rows: non_null,
                completeness_pct: pct,
                below_threshold: below,
            });
        }
    }
    findings
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::table::{ColumnType, Field, Value};

    fn date(s: &str) -> Value {
        Value::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    fn ctx(datasets: &Datasets) -> CheckContext<'_> {
        CheckContext {
            datasets,
            run_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            completeness_threshold: 0.95,
        }
    }

    fn pos(rows: Vec<(&str, &str, Value, Value, Value)>) -> Table {
        let fields = vec![
            Field::new("invoice_no", ColumnType::String),
            Field::new("product_id", ColumnType::String),
            Field::new("invoice_date", ColumnType::Date),
            Field::new("quantity", ColumnType::Int),
            Field::new("unit_price", ColumnType::Float),
        ];
        let rows = rows
            .into_iter()
            .map(|(inv, prod, d, q, p)| vec![Value::str(inv), Value::str(prod), d, q, p])
            .collect();
        Table::try_new(fields, rows).unwrap()
    }

    fn single(name: &str, table: Table) -> Datasets {
        Datasets::from([(name.to_string(), table)])
    }

    #[test]
    fn test_check_table_is_ordered_by_id() {
        let ids: Vec<u8> = CHECKS.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(CHECKS[6].disposition, Disposition::ReportOnly);
    }

    #[test]
    fn test_negative_price_is_flagged_and_null_price_passes() {
        let data = single(
            POS_SALES,
            pos(vec![
                ("I1", "P1", date("2024-01-01"), Value::Int(1), Value::Float(-50.0)),
                ("I2", "P1", date("2024-01-01"), Value::Int(1), Value::Null),
                ("I3", "P1", date("2024-01-01"), Value::Int(1), Value::Float(10.0)),
            ]),
        );
        let f = check_negative_prices(&ctx(&data));
        assert_eq!(f.rows_checked, 3);
        assert_eq!(f.violations.len(), 1);
        assert_eq!(f.violations[0].row, Some(0));
    }

    #[test]
    fn test_future_dates_are_rejected_and_missing_dates_pass() {
        let data = single(
            POS_SALES,
            pos(vec![
                ("I1", "P1", date("2024-06-30"), Value::Int(1), Value::Float(1.0)),
                ("I2", "P1", date("2024-07-01"), Value::Int(1), Value::Float(1.0)),
                ("I3", "P1", Value::Null, Value::Int(1), Value::Float(1.0)),
            ]),
        );
        let f = check_future_dates(&ctx(&data));
        assert_eq!(f.rows_checked, 3);
        let rows: Vec<_> = f.violations.iter().map(|v| v.row).collect();
        assert_eq!(rows, vec![Some(1)]);
        assert_eq!(f.violations[0].reason, "future_date");
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let data = single(
            POS_SALES,
            pos(vec![
                ("I1", "P1", date("2024-01-01"), Value::Int(1), Value::Float(1.0)),
                ("I1", "P2", date("2024-01-01"), Value::Int(1), Value::Float(1.0)),
                ("I1", "P1", date("2024-01-02"), Value::Int(2), Value::Float(1.0)),
            ]),
        );
        let f = check_duplicates(&ctx(&data));
        assert_eq!(f.violations.len(), 1);
        assert_eq!(f.violations[0].row, Some(2));
        assert_eq!(f.violations[0].value.as_deref(), Some("I1|P1"));
    }

    #[test]
    fn test_orphan_shipments() -> anyhow::Result<()> {
        let web = Table::text(&["order_id"], vec![vec![Some("W1")], vec![Some("W2")]])?;
        let ship = Table::text(
            &["shipment_id", "order_id"],
            vec![vec![Some("S1"), Some("W1")], vec![Some("S2"), Some("W9")]],
        )?;
        let data = Datasets::from([
            (WEB_ORDERS.to_string(), web),
            (SHIPMENTS.to_string(), ship),
        ]);
        let f = check_referential_integrity(&ctx(&data));
        assert_eq!(f.rows_checked, 2);
        assert_eq!(f.violations.len(), 1);
        assert_eq!(f.violations[0].value.as_deref(), Some("W9"));
        Ok(())
    }

    #[test]
    fn test_referential_check_skips_when_parent_missing() -> anyhow::Result<()> {
        let ship = Table::text(&["shipment_id", "order_id"], vec![vec![Some("S1"), Some("W1")]])?;
        let data = single(SHIPMENTS, ship);
        assert_eq!(check_referential_integrity(&ctx(&data)), Findings::default());
        Ok(())
    }

    #[test]
    fn test_quantity_bounds() {
        let data = single(
            POS_SALES,
            pos(vec![
                ("I1", "P1", date("2024-01-01"), Value::Int(0), Value::Float(1.0)),
                ("I2", "P1", date("2024-01-01"), Value::Int(1), Value::Float(1.0)),
                ("I3", "P1", date("2024-01-01"), Value::Int(10_000), Value::Float(1.0)),
                ("I4", "P1", date("2024-01-01"), Value::Int(10_001), Value::Float(1.0)),
                ("I5", "P1", date("2024-01-01"), Value::Null, Value::Float(1.0)),
            ]),
        );
        let f = check_quantity_range(&ctx(&data));
        let rows: Vec<_> = f.violations.iter().filter_map(|v| v.row).collect();
        assert_eq!(rows, vec![0, 3, 4]);
    }

    #[test]
    fn test_completeness_metrics() -> anyhow::Result<()> {
        let table = Table::text(
            &["a", "b"],
            vec![
                vec![Some("x"), None],
                vec![Some("y"), Some("nan")],
                vec![Some("z"), Some("ok")],
            ],
        )?;
        let data = single(POS_SALES, table);
        let f = check_completeness(&ctx(&data));
        assert_eq!(f.column_metrics.len(), 2);
        assert_eq!(f.column_metrics[1].completeness_pct, 33.3);
        assert_eq!(f.violations.len(), 1);
        assert_eq!(f.violations[0].column.as_deref(), Some("b"));
        Ok(())
    }
}
