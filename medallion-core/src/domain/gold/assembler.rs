// medallion-core/src/domain/gold/assembler.rs
//
// Silver unified sales -> star schema. Gold is rebuilt in full on every run; only
// the key table and the customer history carry over from the previous Gold.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, instrument};

use crate::domain::error::DomainError;
use crate::domain::gold::keys::KeyAllocator;
use crate::domain::gold::scd::{CustomerDimension, CustomerObservation, ScdChanges};
use crate::domain::schema::datasets::{
    DIM_CUSTOMER, DIM_DATE, DIM_PRODUCT, DIM_STORE, FACT_SALES,
};
use crate::domain::schema::descriptor::UNKNOWN;
use crate::domain::schema::registry::WEB_STORE_ID;
use crate::domain::table::{ColumnType, Field, Table, Value};

/// Relative tolerance for the revenue conservation check.
const AMOUNT_TOLERANCE: f64 = 1e-6;

const FESTIVE_MONTHS: [u32; 4] = [10, 11, 12, 1];

/// Prior Gold state needed for a rebuild.
#[derive(Debug, Clone, Default)]
pub struct GoldHistory {
    pub keys: KeyAllocator,
    pub customers: CustomerDimension,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoldSummary {
    pub fact_rows: usize,
    pub total_revenue: f64,
    pub dimension_rows: BTreeMap<String, usize>,
    pub scd: ScdChanges,
}

#[derive(Debug, Clone)]
pub struct GoldOutput {
    pub dim_date: Table,
    pub dim_product: Table,
    pub dim_store: Table,
    pub dim_customer: Table,
    pub fact_sales: Table,
    pub keys: KeyAllocator,
    pub customers: CustomerDimension,
    pub summary: GoldSummary,
}

pub struct GoldAssembler;

impl GoldAssembler {
    #[instrument(skip_all, fields(run_date = %run_date, rows = sales.num_rows()))]
    pub fn assemble(
        sales: &Table,
        history: GoldHistory,
        run_date: NaiveDate,
    ) -> Result<GoldOutput, DomainError> {
        let GoldHistory {
            mut keys,
            mut customers,
        } = history;

        let dates = transaction_dates(sales)?;

        // 1. DIMENSIONS
        let observations = observe_customers(sales, &dates);
        let scd = customers.apply(&observations, run_date, &mut keys)?;

        let dim_date = build_dim_date(&dates, &mut keys)?;
        let dim_product = build_dim_product(sales, &mut keys)?;
        let dim_store = build_dim_store(sales, &mut keys)?;
        let dim_customer = customers.to_table()?;

        // 2. FACTS (as-of join on the customer dimension)
        let fact_sales = build_fact_sales(sales, &dates, &keys, &customers)?;

        // 3. STAR INVARIANTS
        verify_references(&fact_sales, "customer_sk", &dim_customer, DIM_CUSTOMER)?;
        verify_references(&fact_sales, "product_sk", &dim_product, DIM_PRODUCT)?;
        verify_references(&fact_sales, "store_sk", &dim_store, DIM_STORE)?;
        verify_references(&fact_sales, "date_key", &dim_date, DIM_DATE)?;

        let fact_total = fact_sales.sum("total_amount");
        let silver_total = sales.sum("total_amount");
        if (fact_total - silver_total).abs() > AMOUNT_TOLERANCE * silver_total.abs().max(1.0) {
            return Err(DomainError::ConservationViolation {
                fact_total,
                silver_total,
            });
        }

        let summary = GoldSummary {
            fact_rows: fact_sales.num_rows(),
            total_revenue: (fact_total * 100.0).round() / 100.0,
            dimension_rows: BTreeMap::from([
                (DIM_DATE.to_string(), dim_date.num_rows()),
                (DIM_PRODUCT.to_string(), dim_product.num_rows()),
                (DIM_STORE.to_string(), dim_store.num_rows()),
                (DIM_CUSTOMER.to_string(), dim_customer.num_rows()),
            ]),
            scd,
        };

        info!(
            "  ⭐ {}: {} rows, revenue {:.2}",
            FACT_SALES, summary.fact_rows, summary.total_revenue
        );

        Ok(GoldOutput {
            dim_date,
            dim_product,
            dim_store,
            dim_customer,
            fact_sales,
            keys,
            customers,
            summary,
        })
    }
}

fn transaction_dates(sales: &Table) -> Result<Vec<NaiveDate>, DomainError> {
    (0..sales.num_rows())
        .map(|r| {
            sales.value(r, "transaction_date").as_date().ok_or_else(|| {
                DomainError::OrphanFact {
                    fact: format!("sale_id {}", sales.value(r, "sale_id")),
                    dimension: DIM_DATE.to_string(),
                    natural_key: String::new(),
                }
            })
        })
        .collect()
}

fn text(sales: &Table, row: usize, column: &str) -> String {
    sales
        .value(row, column)
        .as_text()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Per customer: earliest business date, and latest known name and city.
/// A row's city is the customer's own city when known, else the city it was sold in.
fn observe_customers(sales: &Table, dates: &[NaiveDate]) -> Vec<CustomerObservation> {
    let mut order: Vec<usize> = (0..sales.num_rows()).collect();
    order.sort_by(|a, b| {
        dates[*a]
            .cmp(&dates[*b])
            .then_with(|| sales.value(*a, "sale_id").sort_cmp(sales.value(*b, "sale_id")))
    });

    let mut seen: BTreeMap<String, CustomerObservation> = BTreeMap::new();
    for row in order {
        let id = text(sales, row, "customer_id");
        let name = text(sales, row, "customer_name");
        let mut city = text(sales, row, "customer_city");
        if city == UNKNOWN {
            city = text(sales, row, "city");
        }

        let obs = seen.entry(id.clone()).or_insert_with(|| CustomerObservation {
            customer_id: id,
            customer_name: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            first_seen: dates[row],
        });
        obs.first_seen = obs.first_seen.min(dates[row]);
        if name != UNKNOWN {
            obs.customer_name = name;
        }
        if city != UNKNOWN {
            obs.city = city;
        }
    }
    seen.into_values().collect()
}

fn build_dim_date(dates: &[NaiveDate], keys: &mut KeyAllocator) -> Result<Table, DomainError> {
    let fields = vec![
        Field::new("date_key", ColumnType::Int),
        Field::new("full_date", ColumnType::Date),
        Field::new("year", ColumnType::Int),
        Field::new("quarter", ColumnType::Int),
        Field::new("month", ColumnType::Int),
        Field::new("month_name", ColumnType::String),
        Field::new("week_of_year", ColumnType::Int),
        Field::new("day_of_month", ColumnType::Int),
        Field::new("day_of_week", ColumnType::Int),
        Field::new("day_name", ColumnType::String),
        Field::new("is_weekend", ColumnType::Bool),
        Field::new("is_festive_season", ColumnType::Bool),
        Field::new("year_month", ColumnType::String),
    ];
    let mut table = Table::new(fields);
    let (Some(min), Some(max)) = (dates.iter().min(), dates.iter().max()) else {
        return Ok(table);
    };

    // Calendar spine, gaps included.
    for day in min.iter_days().take_while(|d| d <= max) {
        let weekday = day.weekday();
        table.push_row(vec![
            Value::Int(keys.key_for(DIM_DATE, &day.to_string())),
            Value::Date(day),
            Value::Int(i64::from(day.year())),
            Value::Int(i64::from((day.month() - 1) / 3 + 1)),
            Value::Int(i64::from(day.month())),
            Value::str(day.format("%B").to_string()),
            Value::Int(i64::from(day.iso_week().week())),
            Value::Int(i64::from(day.day())),
            Value::Int(i64::from(weekday.num_days_from_monday())),
            Value::str(day.format("%A").to_string()),
            Value::Bool(matches!(weekday, Weekday::Sat | Weekday::Sun)),
            Value::Bool(FESTIVE_MONTHS.contains(&day.month())),
            Value::str(day.format("%Y-%m").to_string()),
        ])?;
    }
    Ok(table)
}

/// Distinct values of `key_column`, sorted, each with the row of its first occurrence.
fn first_occurrences(sales: &Table, key_column: &str) -> BTreeMap<String, usize> {
    let mut first = BTreeMap::new();
    for row in 0..sales.num_rows() {
        first.entry(text(sales, row, key_column)).or_insert(row);
    }
    first
}

fn build_dim_product(sales: &Table, keys: &mut KeyAllocator) -> Result<Table, DomainError> {
    let mut table = Table::new(vec![
        Field::new("product_sk", ColumnType::Int),
        Field::new("product_id", ColumnType::String),
        Field::new("product_name", ColumnType::String),
        Field::new("category", ColumnType::String),
    ]);
    for (product_id, row) in first_occurrences(sales, "product_id") {
        table.push_row(vec![
            Value::Int(keys.key_for(DIM_PRODUCT, &product_id)),
            Value::str(product_id),
            Value::str(text(sales, row, "product_name")),
            Value::str(text(sales, row, "category")),
        ])?;
    }
    Ok(table)
}

fn build_dim_store(sales: &Table, keys: &mut KeyAllocator) -> Result<Table, DomainError> {
    let mut table = Table::new(vec![
        Field::new("store_sk", ColumnType::Int),
        Field::new("store_id", ColumnType::String),
        Field::new("city", ColumnType::String),
        Field::new("store_type", ColumnType::String),
    ]);
    for (store_id, row) in first_occurrences(sales, "store_id") {
        let (city, store_type) = if store_id == WEB_STORE_ID {
            ("Online".to_string(), "Online")
        } else {
            (text(sales, row, "city"), "Physical")
        };
        table.push_row(vec![
            Value::Int(keys.key_for(DIM_STORE, &store_id)),
            Value::str(store_id),
            Value::str(city),
            Value::str(store_type),
        ])?;
    }
    Ok(table)
}

pub fn fact_fields() -> Vec<Field> {
    vec![
        Field::new("sale_id", ColumnType::Int),
        Field::new("transaction_id", ColumnType::String),
        Field::new("transaction_date", ColumnType::Date),
        Field::new("date_key", ColumnType::Int),
        Field::new("product_sk", ColumnType::Int),
        Field::new("store_sk", ColumnType::Int),
        Field::new("customer_sk", ColumnType::Int),
        Field::new("quantity", ColumnType::Int),
        Field::new("unit_price", ColumnType::Float),
        Field::new("total_amount", ColumnType::Float),
        Field::new("channel", ColumnType::String),
        Field::new("is_outlier", ColumnType::Bool),
        Field::new("year", ColumnType::Int),
        Field::new("month", ColumnType::Int),
    ]
}

fn build_fact_sales(
    sales: &Table,
    dates: &[NaiveDate],
    keys: &KeyAllocator,
    customers: &CustomerDimension,
) -> Result<Table, DomainError> {
    let mut table = Table::new(fact_fields());

    for (row, date) in dates.iter().enumerate() {
        let fact = format!("sale_id {}", sales.value(row, "sale_id"));
        let lookup = |dimension: &str, natural: String| {
            keys.lookup(dimension, &natural)
                .ok_or_else(|| DomainError::OrphanFact {
                    fact: fact.clone(),
                    dimension: dimension.to_string(),
                    natural_key: natural,
                })
        };

        let date_key = lookup(DIM_DATE, date.to_string())?;
        let product_sk = lookup(DIM_PRODUCT, text(sales, row, "product_id"))?;
        let store_sk = lookup(DIM_STORE, text(sales, row, "store_id"))?;
        let customer_sk = customers.resolve(&text(sales, row, "customer_id"), *date)?;

        table.push_row(vec![
            sales.value(row, "sale_id").clone(),
            sales.value(row, "transaction_id").clone(),
            Value::Date(*date),
            Value::Int(date_key),
            Value::Int(product_sk),
            Value::Int(store_sk),
            Value::Int(customer_sk),
            sales.value(row, "quantity").clone(),
            sales.value(row, "unit_price").clone(),
            sales.value(row, "total_amount").clone(),
            sales.value(row, "channel").clone(),
            Value::Bool(sales.value(row, "is_outlier").as_bool().unwrap_or(false)),
            Value::Int(i64::from(date.year())),
            Value::Int(i64::from(date.month())),
        ])?;
    }
    Ok(table)
}

/// Every foreign key in `fact` must hit exactly one row of `dimension`.
fn verify_references(
    fact: &Table,
    column: &str,
    dimension: &Table,
    dimension_name: &str,
) -> Result<(), DomainError> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for row in 0..dimension.num_rows() {
        if let Some(k) = dimension.value(row, column).as_i64() {
            *counts.entry(k).or_insert(0) += 1;
        }
    }
    let mut checked = HashSet::new();
    for row in 0..fact.num_rows() {
        let key = fact.value(row, column).as_i64();
        if key.is_some_and(|k| !checked.insert(k)) {
            continue;
        }
        match key.and_then(|k| counts.get(&k)) {
            Some(1) => {}
            Some(n) => {
                return Err(DomainError::ScdInvariantViolation {
                    natural_key: format!("{}={}", column, fact.value(row, column)),
                    reason: format!("{} rows in {}", n, dimension_name),
                });
            }
            None => {
                return Err(DomainError::OrphanFact {
                    fact: format!("sale_id {}", fact.value(row, "sale_id")),
                    dimension: dimension_name.to_string(),
                    natural_key: fact.value(row, column).to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::schema::SchemaRegistry;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Sale<'a> {
        id: i64,
        date: &'a str,
        store: &'a str,
        city: &'a str,
        customer: &'a str,
        product: &'a str,
        amount: f64,
    }

    fn silver(rows: &[Sale<'_>]) -> Table {
        let desc = SchemaRegistry::unified_sales();
        let mut table = desc.empty_table();
        for s in rows {
            table
                .push_row(vec![
                    Value::Int(s.id),
                    Value::str(format!("T{}", s.id)),
                    Value::Date(d(s.date)),
                    Value::str(if s.store == WEB_STORE_ID { "Web" } else { "POS" }),
                    Value::str(s.store),
                    Value::str(s.city),
                    Value::str(s.customer),
                    Value::str("Asha"),
                    Value::str(s.city),
                    Value::str(s.product),
                    Value::str("Tea"),
                    Value::str("Grocery"),
                    Value::Int(1),
                    Value::Float(s.amount),
                    Value::Float(s.amount),
                    Value::Bool(false),
                ])
                .unwrap();
        }
        table
    }

    fn sale<'a>(id: i64, date: &'a str, city: &'a str) -> Sale<'a> {
        Sale {
            id,
            date,
            store: "S01",
            city,
            customer: "C1",
            product: "P1",
            amount: 10.0,
        }
    }

    #[test]
    fn test_star_schema_from_two_channels() {
        let mut web = sale(2, "2024-01-03", "Pune");
        web.store = WEB_STORE_ID;
        web.customer = "C2";
        web.product = "P2";
        web.amount = 25.5;
        let sales = silver(&[sale(1, "2024-01-01", "Mumbai"), web]);

        let out = GoldAssembler::assemble(&sales, GoldHistory::default(), d("2024-01-31")).unwrap();

        assert_eq!(out.dim_date.num_rows(), 3);
        assert_eq!(out.dim_product.num_rows(), 2);
        assert_eq!(out.dim_store.value(1, "store_id"), &Value::str(WEB_STORE_ID));
        assert_eq!(out.dim_store.value(1, "city"), &Value::str("Online"));
        assert_eq!(out.fact_sales.num_rows(), 2);
        assert_eq!(out.summary.total_revenue, 35.5);
        assert_eq!(out.fact_sales.value(1, "year"), &Value::Int(2024));
        assert_eq!(out.fact_sales.value(1, "month"), &Value::Int(1));
    }

    #[test]
    fn test_dim_date_calendar_columns() {
        let sales = silver(&[sale(1, "2024-10-05", "Mumbai")]);
        let out = GoldAssembler::assemble(&sales, GoldHistory::default(), d("2024-10-31")).unwrap();
        let dim = &out.dim_date;
        assert_eq!(dim.value(0, "quarter"), &Value::Int(4));
        assert_eq!(dim.value(0, "day_name"), &Value::str("Saturday"));
        assert_eq!(dim.value(0, "day_of_week"), &Value::Int(5));
        assert_eq!(dim.value(0, "is_weekend"), &Value::Bool(true));
        assert_eq!(dim.value(0, "is_festive_season"), &Value::Bool(true));
        assert_eq!(dim.value(0, "year_month"), &Value::str("2024-10"));
    }

    #[test]
    fn test_second_run_attributes_old_sales_to_old_city() {
        // Scenario B, end to end through the assembler.
        let run1 = silver(&[sale(1, "2024-01-10", "Mumbai")]);
        let first = GoldAssembler::assemble(&run1, GoldHistory::default(), d("2024-01-31")).unwrap();

        let run2 = silver(&[sale(1, "2024-01-10", "Mumbai"), sale(2, "2024-02-20", "Pune")]);
        let history = GoldHistory {
            keys: first.keys.clone(),
            customers: first.customers.clone(),
        };
        let second = GoldAssembler::assemble(&run2, history, d("2024-02-29")).unwrap();

        let v = second.customers.versions();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].city, "Mumbai");
        assert_eq!(v[1].city, "Pune");
        // Both sales predate the run-2 change, so both resolve to version 1.
        assert_eq!(second.fact_sales.value(0, "customer_sk"), &Value::Int(v[0].customer_sk));
        assert_eq!(second.fact_sales.value(1, "customer_sk"), &Value::Int(v[0].customer_sk));
        // Keys survive the rebuild.
        assert_eq!(
            second.keys.lookup(DIM_PRODUCT, "P1"),
            first.keys.lookup(DIM_PRODUCT, "P1")
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let sales = silver(&[sale(1, "2024-01-10", "Mumbai"), sale(2, "2024-01-12", "Mumbai")]);
        let first = GoldAssembler::assemble(&sales, GoldHistory::default(), d("2024-01-31")).unwrap();
        let history = GoldHistory {
            keys: first.keys.clone(),
            customers: first.customers.clone(),
        };
        let second = GoldAssembler::assemble(&sales, history, d("2024-01-31")).unwrap();
        assert_eq!(first.fact_sales, second.fact_sales);
        assert_eq!(first.dim_customer, second.dim_customer);
        assert_eq!(first.keys, second.keys);
    }

    #[test]
    fn test_missing_dimension_row_is_an_orphan() {
        let fact = Table::try_new(
            vec![
                Field::new("sale_id", ColumnType::Int),
                Field::new("product_sk", ColumnType::Int),
            ],
            vec![vec![Value::Int(1), Value::Int(99)]],
        )
        .unwrap();
        let dim = Table::try_new(
            vec![Field::new("product_sk", ColumnType::Int)],
            vec![vec![Value::Int(1)]],
        )
        .unwrap();
        assert!(matches!(
            verify_references(&fact, "product_sk", &dim, DIM_PRODUCT),
            Err(DomainError::OrphanFact { .. })
        ));
    }
}
