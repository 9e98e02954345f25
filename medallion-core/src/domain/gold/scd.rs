// medallion-core/src/domain/gold/scd.rs
//
// SCD Type 2 for the customer dimension. Tracked attributes: customer_name, city.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::domain::error::DomainError;
use crate::domain::gold::keys::KeyAllocator;
use crate::domain::schema::datasets::DIM_CUSTOMER;
use crate::domain::schema::descriptor::UNKNOWN;
use crate::domain::table::{ColumnType, Field, Table, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerVersion {
    pub customer_sk: i64,
    pub customer_id: String,
    pub customer_name: String,
    pub city: String,
    pub version: i64,
    pub valid_from: NaiveDate,
    /// `None` while the version is open.
    pub valid_to: Option<NaiveDate>,
    pub is_current: bool,
}

impl CustomerVersion {
    /// Half-open validity interval `[valid_from, valid_to)`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_to.is_none_or(|to| date < to)
    }
}

/// Latest known attributes of a customer, as seen in Silver.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerObservation {
    pub customer_id: String,
    pub customer_name: String,
    pub city: String,
    pub first_seen: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScdChanges {
    pub inserted: usize,
    pub versioned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerDimension {
    versions: Vec<CustomerVersion>,
}

fn natural_version_key(customer_id: &str, version: i64) -> String {
    format!("{}#v{}", customer_id, version)
}

/// An incoming sentinel never overwrites a known value.
fn merge(current: &str, incoming: &str) -> String {
    if incoming == UNKNOWN || incoming.is_empty() {
        current.to_string()
    } else {
        incoming.to_string()
    }
}

impl CustomerDimension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn versions(&self) -> &[CustomerVersion] {
        &self.versions
    }

    pub fn current(&self, customer_id: &str) -> Option<&CustomerVersion> {
        self.versions
            .iter()
            .find(|v| v.customer_id == customer_id && v.is_current)
    }

    /// Compares observations to the active versions and appends new versions where
    /// tracked attributes changed. History is only ever closed, never rewritten.
    pub fn apply(
        &mut self,
        observations: &[CustomerObservation],
        run_date: NaiveDate,
        keys: &mut KeyAllocator,
    ) -> Result<ScdChanges, DomainError> {
        let mut changes = ScdChanges::default();

        for obs in observations {
            let Some(idx) = self
                .versions
                .iter()
                .position(|v| v.customer_id == obs.customer_id && v.is_current)
            else {
                // First sighting: v1 is valid from the earliest business date seen.
                self.versions.push(CustomerVersion {
                    customer_sk: keys.key_for(DIM_CUSTOMER, &natural_version_key(&obs.customer_id, 1)),
                    customer_id: obs.customer_id.clone(),
                    customer_name: obs.customer_name.clone(),
                    city: obs.city.clone(),
                    version: 1,
                    valid_from: obs.first_seen,
                    valid_to: None,
                    is_current: true,
                });
                changes.inserted += 1;
                continue;
            };

            // Late-arriving facts older than v1 widen v1 backwards.
            self.extend_first_version(&obs.customer_id, obs.first_seen);

            let current = &self.versions[idx];
            let name = merge(&current.customer_name, &obs.customer_name);
            let city = merge(&current.city, &obs.city);
            if name == current.customer_name && city == current.city {
                changes.unchanged += 1;
                continue;
            }

            if run_date < current.valid_from {
                return Err(DomainError::ScdInvariantViolation {
                    natural_key: obs.customer_id.clone(),
                    reason: format!(
                        "run date {} precedes current version start {}",
                        run_date, current.valid_from
                    ),
                });
            }

            let version = current.version + 1;
            debug!(
                customer = %obs.customer_id,
                "SCD2: {} / {} -> {} / {} (v{})",
                current.customer_name, current.city, name, city, version
            );

            let closed = &mut self.versions[idx];
            closed.valid_to = Some(run_date);
            closed.is_current = false;

            self.versions.push(CustomerVersion {
                customer_sk: keys.key_for(DIM_CUSTOMER, &natural_version_key(&obs.customer_id, version)),
                customer_id: obs.customer_id.clone(),
                customer_name: name,
                city,
                version,
                valid_from: run_date,
                valid_to: None,
                is_current: true,
            });
            changes.versioned += 1;
        }

        self.versions
            .sort_by(|a, b| a.customer_id.cmp(&b.customer_id).then(a.version.cmp(&b.version)));

        info!(
            "  🧬 dim_customer: {} new, {} re-versioned, {} unchanged",
            changes.inserted, changes.versioned, changes.unchanged
        );
        self.validate()?;
        Ok(changes)
    }

    fn extend_first_version(&mut self, customer_id: &str, first_seen: NaiveDate) {
        if let Some(v1) = self
            .versions
            .iter_mut()
            .find(|v| v.customer_id == customer_id && v.version == 1)
        {
            v1.valid_from = v1.valid_from.min(first_seen);
        }
    }

    /// Exactly one current version per natural key; closed versions have
    /// `valid_to >= valid_from`; open versions are current.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut current_per_key: BTreeMap<&str, usize> = BTreeMap::new();
        for v in &self.versions {
            let count = current_per_key.entry(v.customer_id.as_str()).or_insert(0);
            if v.is_current {
                *count += 1;
            }
            match v.valid_to {
                Some(to) if v.is_current || to < v.valid_from => {
                    return Err(DomainError::ScdInvariantViolation {
                        natural_key: v.customer_id.clone(),
                        reason: format!("version {} has an invalid closing date {}", v.version, to),
                    });
                }
                None if !v.is_current => {
                    return Err(DomainError::ScdInvariantViolation {
                        natural_key: v.customer_id.clone(),
                        reason: format!("non-current version {} is not closed", v.version),
                    });
                }
                _ => {}
            }
        }
        match current_per_key.into_iter().find(|(_, n)| *n != 1) {
            Some((key, n)) => Err(DomainError::ScdInvariantViolation {
                natural_key: key.to_string(),
                reason: format!("{} current versions", n),
            }),
            None => Ok(()),
        }
    }

    /// As-of lookup: the version whose interval contains `on`.
    pub fn resolve(&self, customer_id: &str, on: NaiveDate) -> Result<i64, DomainError> {
        let matches: Vec<&CustomerVersion> = self
            .versions
            .iter()
            .filter(|v| v.customer_id == customer_id && v.covers(on))
            .collect();
        match matches.as_slice() {
            [one] => Ok(one.customer_sk),
            [] => Err(DomainError::OrphanFact {
                fact: format!("sale on {}", on),
                dimension: DIM_CUSTOMER.to_string(),
                natural_key: customer_id.to_string(),
            }),
            many => Err(DomainError::ScdInvariantViolation {
                natural_key: customer_id.to_string(),
                reason: format!("{} versions overlap on {}", many.len(), on),
            }),
        }
    }

    pub fn customer_ids(&self) -> BTreeSet<&str> {
        self.versions.iter().map(|v| v.customer_id.as_str()).collect()
    }

    pub fn fields() -> Vec<Field> {
        vec![
            Field::new("customer_sk", ColumnType::Int),
            Field::new("customer_id", ColumnType::String),
            Field::new("customer_name", ColumnType::String),
            Field::new("city", ColumnType::String),
            Field::new("version", ColumnType::Int),
            Field::new("valid_from", ColumnType::Date),
            Field::new("valid_to", ColumnType::Date),
            Field::new("is_current", ColumnType::Bool),
        ]
    }

    pub fn to_table(&self) -> Result<Table, DomainError> {
        let rows = self
            .versions
            .iter()
            .map(|v| {
                vec![
                    Value::Int(v.customer_sk),
                    Value::str(v.customer_id.as_str()),
                    Value::str(v.customer_name.as_str()),
                    Value::str(v.city.as_str()),
                    Value::Int(v.version),
                    Value::Date(v.valid_from),
                    v.valid_to.map(Value::Date).unwrap_or(Value::Null),
                    Value::Bool(v.is_current),
                ]
            })
            .collect();
        Table::try_new(Self::fields(), rows)
    }

    pub fn from_table(table: &Table) -> Result<Self, DomainError> {
        let mut versions = Vec::with_capacity(table.num_rows());
        for row in 0..table.num_rows() {
            let text = |c: &str| table.value(row, c).as_text().unwrap_or_default();
            let incomplete = || DomainError::MalformedTable(format!("dim_customer row {} is incomplete", row));
            versions.push(CustomerVersion {
                customer_sk: table.value(row, "customer_sk").as_i64().ok_or_else(incomplete)?,
                customer_id: text("customer_id"),
                customer_name: text("customer_name"),
                city: text("city"),
                version: table.value(row, "version").as_i64().ok_or_else(incomplete)?,
                valid_from: table.value(row, "valid_from").as_date().ok_or_else(incomplete)?,
                valid_to: table.value(row, "valid_to").as_date(),
                is_current: table.value(row, "is_current").as_bool().ok_or_else(incomplete)?,
            });
        }
        let dim = Self { versions };
        dim.validate()?;
        Ok(dim)
    }
}
