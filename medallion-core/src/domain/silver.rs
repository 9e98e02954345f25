// medallion-core/src/domain/silver.rs
//
// Bronze + firewall dispositions -> Silver. Fixed order:
//   1. dedupe (check 4)  2. exclusions (checks 1/2/5, then undated sales)  3. repairs (checks 3/6)  4. unify
// Bronze tables are borrowed and never modified.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use crate::domain::error::DomainError;
use crate::domain::quality::disposition::DispositionSet;
use crate::domain::quality::firewall::FirewallOutcome;
use crate::domain::schema::datasets::{POS_SALES, SHIPMENTS, WAREHOUSE_INVENTORY, WEB_ORDERS};
use crate::domain::schema::descriptor::UNKNOWN;
use crate::domain::schema::registry::{WEB_STORE_ID, row_id_column};
use crate::domain::schema::{SchemaRegistry, SchemaValidator};
use crate::domain::table::{ColumnType, Datasets, Field, Table, Value};

pub const DEFAULT_MAX_EXCLUSION_RATIO: f64 = 0.5;

/// Quarantine reason for a sale whose business date is null (missing or uncoercible).
pub const MISSING_BUSINESS_DATE: &str = "missing_business_date";

/// Whether a failing quality report stops the Silver build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    #[default]
    Advisory,
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilverConfig {
    pub gate: GateMode,
    /// Max share of (deduplicated) rows that step 2 may exclude, per dataset.
    pub max_exclusion_ratio: f64,
}

impl Default for SilverConfig {
    fn default() -> Self {
        Self {
            gate: GateMode::Advisory,
            max_exclusion_ratio: DEFAULT_MAX_EXCLUSION_RATIO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningStats {
    pub dataset: String,
    pub input_rows: usize,
    pub duplicates_dropped: usize,
    pub excluded: usize,
    /// Sales dropped for a null business date. Not counted in the exclusion ratio.
    pub undated: usize,
    pub repaired: usize,
    pub output_rows: usize,
}

#[derive(Debug, Clone)]
pub struct SilverOutput {
    pub unified_sales: Table,
    pub warehouse_inventory: Table,
    pub shipments: Table,
    pub quarantine: Table,
    pub stats: Vec<CleaningStats>,
}

pub fn quarantine_fields() -> Vec<Field> {
    vec![
        Field::new("source", ColumnType::String),
        Field::new("row_index", ColumnType::Int),
        Field::new("row_id", ColumnType::String),
        Field::new("check_ids", ColumnType::String),
        Field::new("reasons", ColumnType::String),
        Field::new("payload", ColumnType::String),
    ]
}

pub struct SilverTransformer {
    config: SilverConfig,
    registry: SchemaRegistry,
}

impl SilverTransformer {
    pub fn new(config: SilverConfig, registry: SchemaRegistry) -> Self {
        Self { config, registry }
    }

    #[instrument(skip_all, fields(gate = ?self.config.gate))]
    pub fn transform(
        &self,
        bronze: &Datasets,
        firewall: &FirewallOutcome,
    ) -> Result<SilverOutput, DomainError> {
        // 0. GATE
        if self.config.gate == GateMode::Blocking && firewall.report.has_issues() {
            return Err(DomainError::QualityGateFailed {
                failed_checks: firewall.report.failed_checks(),
            });
        }

        let mut quarantine = Table::new(quarantine_fields());
        let mut stats = Vec::new();

        // 1-3. PER-DATASET CLEANING
        let mut cleaned = Vec::with_capacity(4);
        for ds in [POS_SALES, WEB_ORDERS, WAREHOUSE_INVENTORY, SHIPMENTS] {
            let table = match bronze.get(ds) {
                Some(t) => t.clone(),
                None => {
                    warn!(dataset = ds, "Bronze dataset absent, treated as empty");
                    self.registry.get(ds)?.empty_table()
                }
            };
            let (table, stat) = self.clean(ds, &table, &firewall.dispositions, &mut quarantine)?;
            info!(
                "  🧹 {}: {} bronze -> {} clean (dupes={}, excluded={}, repaired={})",
                ds, stat.input_rows, stat.output_rows, stat.duplicates_dropped, stat.excluded, stat.repaired
            );
            stats.push(stat);
            cleaned.push(table);
        }

        let mut it = cleaned.into_iter();
        let (Some(pos), Some(web), Some(inventory), Some(shipments)) =
            (it.next(), it.next(), it.next(), it.next())
        else {
            return Err(DomainError::MalformedTable("cleaning lost a dataset".into()));
        };

        // 4. UNIFY
        let unified_sales = self.unify(pos, web)?;
        let shipments = with_delivery_days(shipments)?;

        info!(
            "  🔗 Unified: {} sales, {} quarantined",
            unified_sales.num_rows(),
            quarantine.num_rows()
        );

        Ok(SilverOutput {
            unified_sales,
            warehouse_inventory: inventory,
            shipments,
            quarantine,
            stats,
        })
    }

    fn clean(
        &self,
        dataset: &str,
        table: &Table,
        dispositions: &DispositionSet,
        quarantine: &mut Table,
    ) -> Result<(Table, CleaningStats), DomainError> {
        let input_rows = table.num_rows();
        let duplicates = dispositions.duplicates(dataset);
        let exclusions = dispositions.exclusions(dataset);

        // Every excluded row is kept for audit, including those also dropped as duplicates.
        for row in &exclusions {
            quarantine.push_row(quarantine_row(dataset, table, *row, dispositions))?;
        }

        let after_dedupe = input_rows - duplicates.len();
        let excluded = exclusions.difference(&duplicates).count();
        if after_dedupe > 0 {
            let ratio = excluded as f64 / after_dedupe as f64;
            if ratio > self.config.max_exclusion_ratio {
                return Err(DomainError::DataLossThresholdExceeded {
                    dataset: dataset.to_string(),
                    excluded,
                    total: after_dedupe,
                    ratio,
                    threshold: self.config.max_exclusion_ratio,
                });
            }
        }

        // A sale with no date has no place in dim_date.
        let undated: BTreeSet<usize> = match business_date_column(dataset) {
            Some(col) if table.has_column(col) => (0..input_rows)
                .filter(|r| !duplicates.contains(r) && !exclusions.contains(r))
                .filter(|r| table.value(*r, col).as_date().is_none())
                .collect(),
            _ => BTreeSet::new(),
        };
        if !undated.is_empty() {
            warn!(dataset, rows = undated.len(), "Sales without a business date quarantined");
        }
        for row in &undated {
            quarantine.push_row(audit_row(dataset, table, *row, String::new(), MISSING_BUSINESS_DATE))?;
        }

        let kept: Vec<usize> = (0..input_rows)
            .filter(|r| !duplicates.contains(r) && !exclusions.contains(r) && !undated.contains(r))
            .collect();
        let kept_set: BTreeSet<usize> = kept.iter().copied().collect();

        let mut out = table.clone();
        out.retain_rows(|r| kept_set.contains(&r));

        // Repairs, addressed by Bronze row index.
        let mut repaired = BTreeSet::new();
        let descriptor = self.registry.get(dataset)?;
        for (row, column) in dispositions.fills(dataset) {
            if let Ok(pos) = kept.binary_search(&row) {
                let fill = descriptor
                    .column(&column)
                    .map(|c| c.default.clone())
                    .unwrap_or_else(|| Value::str(UNKNOWN));
                out.set_value(pos, &column, fill)?;
                repaired.insert(row);
            }
        }

        if dataset != SHIPMENTS {
            let outliers = dispositions.outliers(dataset);
            out.add_column(Field::new("is_outlier", ColumnType::Bool), Value::Bool(false));
            for (pos, row) in kept.iter().enumerate() {
                if outliers.contains(row) {
                    out.set_value(pos, "is_outlier", Value::Bool(true))?;
                    repaired.insert(*row);
                }
            }
        }

        if dataset == POS_SALES || dataset == WEB_ORDERS {
            recompute_total_amount(&mut out)?;
        }

        let stats = CleaningStats {
            dataset: dataset.to_string(),
            input_rows,
            duplicates_dropped: duplicates.len(),
            excluded,
            undated: undated.len(),
            repaired: repaired.len(),
            output_rows: out.num_rows(),
        };
        Ok((out, stats))
    }

    fn unify(&self, mut pos: Table, mut web: Table) -> Result<Table, DomainError> {
        let descriptor = SchemaRegistry::unified_sales();

        pos.rename_column("invoice_no", "transaction_id");
        pos.rename_column("invoice_date", "transaction_date");
        pos.rename_column("store_city", "city");
        pos.add_column(Field::new("channel", ColumnType::String), Value::str("POS"));

        web.rename_column("order_id", "transaction_id");
        web.rename_column("order_date", "transaction_date");
        // Keep the customer's own city for SCD2 before it becomes the generic `city`.
        let customer_cities: Vec<Value> = (0..web.num_rows())
            .map(|r| web.value(r, "customer_city").clone())
            .collect();
        web.rename_column("customer_city", "city");
        web.add_column(Field::new("customer_city", ColumnType::String), Value::Null);
        for (r, v) in customer_cities.into_iter().enumerate() {
            web.set_value(r, "customer_city", v)?;
        }
        web.add_column(Field::new("store_id", ColumnType::String), Value::str(WEB_STORE_ID));
        web.add_column(Field::new("channel", ColumnType::String), Value::str("Web"));

        let mut unified = SchemaValidator::conform(&pos, &descriptor)?;
        unified.append(SchemaValidator::conform(&web, &descriptor)?)?;

        let text_columns: Vec<&str> = descriptor
            .columns
            .iter()
            .filter(|c| c.kind == ColumnType::String)
            .map(|c| c.name.as_str())
            .collect();
        descriptor.fill_nulls(&mut unified, &text_columns)?;

        let order: Vec<usize> = ["transaction_date", "channel", "transaction_id", "product_id"]
            .iter()
            .filter_map(|c| unified.column_index(c))
            .collect();
        unified.sort_rows_by(|a, b| {
            order
                .iter()
                .map(|i| a[*i].sort_cmp(&b[*i]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for row in 0..unified.num_rows() {
            unified.set_value(row, "sale_id", Value::Int(row as i64 + 1))?;
        }
        Ok(unified)
    }
}

fn quarantine_row(
    dataset: &str,
    table: &Table,
    row: usize,
    dispositions: &DispositionSet,
) -> Vec<Value> {
    let actions = dispositions.actions(dataset, row);
    let check_ids: BTreeSet<u8> = actions
        .iter()
        .filter(|a| a.disposition.excludes_row())
        .map(|a| a.check_id)
        .collect();
    let reasons: Vec<&str> = actions
        .iter()
        .filter(|a| a.disposition.excludes_row())
        .map(|a| a.reason.as_str())
        .collect();
    let check_ids = check_ids
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",");
    audit_row(dataset, table, row, check_ids, &reasons.join(","))
}

fn audit_row(dataset: &str, table: &Table, row: usize, check_ids: String, reasons: &str) -> Vec<Value> {
    let row_id = row_id_column(dataset)
        .and_then(|c| table.value(row, c).as_text())
        .map(Value::Str)
        .unwrap_or(Value::Null);

    vec![
        Value::str(dataset),
        Value::Int(row as i64),
        row_id,
        Value::Str(check_ids),
        Value::str(reasons),
        Value::str(table.row_json(row).to_string()),
    ]
}

fn business_date_column(dataset: &str) -> Option<&'static str> {
    match dataset {
        POS_SALES => Some("invoice_date"),
        WEB_ORDERS => Some("order_date"),
        _ => None,
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn recompute_total_amount(table: &mut Table) -> Result<(), DomainError> {
    for row in 0..table.num_rows() {
        let qty = table.value(row, "quantity").as_f64();
        let price = table.value(row, "unit_price").as_f64();
        if let (Some(q), Some(p)) = (qty, price) {
            table.set_value(row, "total_amount", Value::Float(round2(q * p)))?;
        }
    }
    Ok(())
}

fn with_delivery_days(mut shipments: Table) -> Result<Table, DomainError> {
    shipments.add_column(Field::new("delivery_days", ColumnType::Int), Value::Null);
    for row in 0..shipments.num_rows() {
        let ship = shipments.value(row, "ship_date").as_date();
        let delivered = shipments.value(row, "delivery_date").as_date();
        if let (Some(s), Some(d)) = (ship, delivered) {
            shipments.set_value(row, "delivery_days", Value::Int((d - s).num_days()))?;
        }
    }
    Ok(shipments)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::quality::QualityFirewall;
    use crate::domain::schema::ValidationMode;
    use chrono::NaiveDate;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn validated(dataset: &str, columns: &[&str], rows: Vec<Vec<&str>>) -> Table {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|c| if c.is_empty() { None } else { Some(c) }).collect())
            .collect();
        let raw = Table::text(columns, rows).unwrap();
        let registry = SchemaRegistry::retail();
        SchemaValidator::validate(&raw, registry.get(dataset).unwrap(), ValidationMode::Lenient)
            .unwrap()
            .table
    }

    const POS: [&str; 9] = [
        "invoice_no",
        "invoice_date",
        "store_id",
        "store_city",
        "customer_id",
        "product_id",
        "quantity",
        "unit_price",
        "total_amount",
    ];
    const WEB: [&str; 8] = [
        "order_id",
        "order_date",
        "customer_id",
        "customer_name",
        "customer_city",
        "product_id",
        "quantity",
        "unit_price",
    ];

    fn run(bronze: &Datasets, config: SilverConfig) -> Result<SilverOutput, DomainError> {
        let firewall = QualityFirewall::default().run(bronze, run_date());
        SilverTransformer::new(config, SchemaRegistry::retail()).transform(bronze, &firewall)
    }

    fn pos_rows(n: usize, negative_at: Option<usize>) -> Vec<Vec<String>> {
        (0..n)
            .map(|i| {
                let price = if Some(i) == negative_at { "-50" } else { "20" };
                vec![
                    format!("INV{i:03}"),
                    "2024-03-01".to_string(),
                    "S01".to_string(),
                    "Mumbai".to_string(),
                    "C1".to_string(),
                    "P1".to_string(),
                    "2".to_string(),
                    price.to_string(),
                    "0".to_string(),
                ]
            })
            .collect()
    }

    fn pos_table(rows: &[Vec<String>]) -> Table {
        validated(
            POS_SALES,
            &POS,
            rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect(),
        )
    }

    #[test]
    fn test_negative_price_row_is_quarantined() {
        // Scenario A
        let bronze = Datasets::from([(POS_SALES.to_string(), pos_table(&pos_rows(10, Some(4))))]);
        let out = run(&bronze, SilverConfig::default()).unwrap();

        assert_eq!(out.unified_sales.num_rows(), 9);
        assert_eq!(out.quarantine.num_rows(), 1);
        assert_eq!(out.quarantine.value(0, "row_id"), &Value::str("INV004"));
        assert_eq!(out.quarantine.value(0, "check_ids"), &Value::str("1"));
        // total_amount is recomputed from quantity x price.
        assert_eq!(out.unified_sales.value(0, "total_amount"), &Value::Float(40.0));
    }

    #[test]
    fn test_exclusion_ratio_over_threshold_halts() {
        let mut rows = pos_rows(4, None);
        for r in rows.iter_mut().take(3) {
            r[7] = "-1".to_string();
        }
        let bronze = Datasets::from([(POS_SALES.to_string(), pos_table(&rows))]);
        let err = run(&bronze, SilverConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DataLossThresholdExceeded { excluded: 3, total: 4, .. }
        ));
    }

    #[test]
    fn test_blocking_gate_refuses_failed_report() {
        let bronze = Datasets::from([(POS_SALES.to_string(), pos_table(&pos_rows(10, Some(0))))]);
        let config = SilverConfig {
            gate: GateMode::Blocking,
            ..SilverConfig::default()
        };
        assert!(matches!(
            run(&bronze, config),
            Err(DomainError::QualityGateFailed { .. })
        ));
    }

    #[test]
    fn test_duplicates_dropped_and_null_customer_filled() {
        let mut rows = pos_rows(3, None);
        rows[2][0] = "INV000".to_string();
        rows[1][4] = String::new();
        let bronze = Datasets::from([(POS_SALES.to_string(), pos_table(&rows))]);
        let out = run(&bronze, SilverConfig::default()).unwrap();

        assert_eq!(out.unified_sales.num_rows(), 2);
        assert_eq!(out.quarantine.num_rows(), 0);
        assert_eq!(out.stats[0].duplicates_dropped, 1);
        let customers: Vec<_> = (0..2)
            .map(|r| out.unified_sales.value(r, "customer_id").clone())
            .collect();
        assert!(customers.contains(&Value::str("UNKNOWN")));
    }

    #[test]
    fn test_unify_channels_and_sale_ids() {
        let pos = pos_table(&pos_rows(1, None));
        let web = validated(
            WEB_ORDERS,
            &WEB,
            vec![vec!["W1", "2024-02-01", "C9", "Asha", "Pune", "P2", "1", "15.5"]],
        );
        let bronze = Datasets::from([
            (POS_SALES.to_string(), pos),
            (WEB_ORDERS.to_string(), web),
        ]);
        let out = run(&bronze, SilverConfig::default()).unwrap();
        let sales = &out.unified_sales;

        assert_eq!(sales.column_names(), SchemaRegistry::unified_sales().columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>());
        // Web row is earlier, so it sorts first.
        assert_eq!(sales.value(0, "channel"), &Value::str("Web"));
        assert_eq!(sales.value(0, "sale_id"), &Value::Int(1));
        assert_eq!(sales.value(0, "store_id"), &Value::str(WEB_STORE_ID));
        assert_eq!(sales.value(0, "city"), &Value::str("Pune"));
        assert_eq!(sales.value(0, "customer_city"), &Value::str("Pune"));
        assert_eq!(sales.value(1, "channel"), &Value::str("POS"));
        assert_eq!(sales.value(1, "customer_name"), &Value::str("UNKNOWN"));
        assert_eq!(sales.value(1, "sale_id"), &Value::Int(2));
    }

    #[test]
    fn test_orphan_shipment_absent_from_silver() {
        // Scenario C
        let web = validated(
            WEB_ORDERS,
            &WEB,
            vec![vec!["W1", "2024-02-01", "C9", "Asha", "Pune", "P2", "1", "15.5"]],
        );
        let ship = validated(
            SHIPMENTS,
            &["shipment_id", "order_id", "ship_date", "delivery_date"],
            vec![
                vec!["S1", "W1", "2024-02-02", "2024-02-05"],
                vec!["S2", "W404", "2024-02-02", ""],
                vec!["S3", "W1", "2024-02-03", "2024-02-04"],
            ],
        );
        let bronze = Datasets::from([
            (WEB_ORDERS.to_string(), web),
            (SHIPMENTS.to_string(), ship),
        ]);
        let out = run(&bronze, SilverConfig::default()).unwrap();
        assert_eq!(out.shipments.num_rows(), 2);
        assert_eq!(out.shipments.value(0, "delivery_days"), &Value::Int(3));
        assert_eq!(out.quarantine.value(0, "row_id"), &Value::str("S2"));
        assert_eq!(out.quarantine.value(0, "check_ids"), &Value::str("5"));
    }

    #[test]
    fn test_future_dated_web_order_is_rejected() {
        let web = validated(
            WEB_ORDERS,
            &WEB,
            vec![
                vec!["W1", "2024-06-01", "C9", "Asha", "Pune", "P2", "1", "15.5"],
                vec!["W2", "2024-07-05", "C9", "Asha", "Pune", "P2", "2", "15.5"],
                vec!["W3", "2024-06-10", "C7", "Ravi", "Delhi", "P1", "1", "9.0"],
            ],
        );
        let bronze = Datasets::from([(WEB_ORDERS.to_string(), web)]);
        let out = run(&bronze, SilverConfig::default()).unwrap();

        let ids: Vec<_> = (0..out.unified_sales.num_rows())
            .map(|r| out.unified_sales.value(r, "transaction_id").clone())
            .collect();
        assert_eq!(ids, vec![Value::str("W1"), Value::str("W3")]);
        assert_eq!(out.quarantine.num_rows(), 1);
        assert_eq!(out.quarantine.value(0, "source"), &Value::str(WEB_ORDERS));
        assert_eq!(out.quarantine.value(0, "row_id"), &Value::str("W2"));
        assert_eq!(out.quarantine.value(0, "check_ids"), &Value::str("2"));
        assert_eq!(out.quarantine.value(0, "reasons"), &Value::str("future_date"));
    }

    #[test]
    fn test_shipments_without_ship_date_column_still_build() {
        // Lenient mode fills the absent ship_date with nulls.
        let ship = validated(
            SHIPMENTS,
            &["shipment_id", "order_id"],
            vec![vec!["S1", "W1"], vec!["S2", "W2"]],
        );
        let bronze = Datasets::from([(SHIPMENTS.to_string(), ship)]);
        let out = run(&bronze, SilverConfig::default()).unwrap();

        assert_eq!(out.shipments.num_rows(), 2);
        assert_eq!(out.shipments.value(0, "delivery_days"), &Value::Null);
        assert_eq!(out.quarantine.num_rows(), 0);
    }

    #[test]
    fn test_undated_sale_is_quarantined_outside_the_ratio() {
        let mut rows = pos_rows(3, None);
        rows[1][1] = "not-a-date".to_string();
        rows[2][1] = String::new();
        let bronze = Datasets::from([(POS_SALES.to_string(), pos_table(&rows))]);
        // 2 of 3 rows undated: over the 0.5 ratio, yet no halt.
        let out = run(&bronze, SilverConfig::default()).unwrap();

        assert_eq!(out.unified_sales.num_rows(), 1);
        assert_eq!(out.unified_sales.value(0, "transaction_id"), &Value::str("INV000"));
        assert_eq!(out.stats[0].undated, 2);
        assert_eq!(out.stats[0].excluded, 0);
        assert_eq!(out.quarantine.num_rows(), 2);
        assert_eq!(out.quarantine.value(0, "row_id"), &Value::str("INV001"));
        assert_eq!(out.quarantine.value(0, "check_ids"), &Value::str(""));
        assert_eq!(out.quarantine.value(1, "reasons"), &Value::str(MISSING_BUSINESS_DATE));
    }
}
