// medallion-core/src/domain/gold/keys.rs

use std::collections::BTreeMap;

use crate::domain::error::DomainError;
use crate::domain::table::{ColumnType, Field, Table, Value};

#[derive(Debug, Clone, Default, PartialEq)]
struct DimensionKeys {
    keys: BTreeMap<String, i64>,
    next: i64,
}

/// Surrogate-key allocation table, passed explicitly to whoever needs keys.
///
/// Keys are per dimension, start at 1, only ever grow, and stay bound to the
/// natural key that first received them. The table is persisted in Gold so a
/// rebuild reuses the same keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyAllocator {
    dimensions: BTreeMap<String, DimensionKeys>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing key for `natural_key`, or the next one.
    pub fn key_for(&mut self, dimension: &str, natural_key: &str) -> i64 {
        let dim = self
            .dimensions
            .entry(dimension.to_string())
            .or_insert_with(|| DimensionKeys {
                keys: BTreeMap::new(),
                next: 1,
            });
        if let Some(k) = dim.keys.get(natural_key) {
            return *k;
        }
        let key = dim.next;
        dim.next += 1;
        dim.keys.insert(natural_key.to_string(), key);
        key
    }

    pub fn lookup(&self, dimension: &str, natural_key: &str) -> Option<i64> {
        self.dimensions
            .get(dimension)
            .and_then(|d| d.keys.get(natural_key))
            .copied()
    }

    pub fn len(&self, dimension: &str) -> usize {
        self.dimensions.get(dimension).map_or(0, |d| d.keys.len())
    }

    pub fn fields() -> Vec<Field> {
        vec![
            Field::new("dimension", ColumnType::String),
            Field::new("natural_key", ColumnType::String),
            Field::new("surrogate_key", ColumnType::Int),
        ]
    }

    /// Rows ordered by dimension then surrogate key.
    pub fn to_table(&self) -> Result<Table, DomainError> {
        let mut rows = Vec::new();
        for (dimension, dim) in &self.dimensions {
            let mut entries: Vec<(&String, &i64)> = dim.keys.iter().collect();
            entries.sort_by_key(|(_, k)| **k);
            for (natural, key) in entries {
                rows.push(vec![
                    Value::str(dimension.as_str()),
                    Value::str(natural.as_str()),
                    Value::Int(*key),
                ]);
            }
        }
        Table::try_new(Self::fields(), rows)
    }

    pub fn from_table(table: &Table) -> Result<Self, DomainError> {
        let mut allocator = Self::new();
        for row in 0..table.num_rows() {
            let (Some(dimension), Some(natural), Some(key)) = (
                table.value(row, "dimension").as_str(),
                table.value(row, "natural_key").as_str(),
                table.value(row, "surrogate_key").as_i64(),
            ) else {
                return Err(DomainError::MalformedTable(format!(
                    "surrogate key row {} is incomplete",
                    row
                )));
            };
            let dim = allocator
                .dimensions
                .entry(dimension.to_string())
                .or_insert_with(|| DimensionKeys {
                    keys: BTreeMap::new(),
                    next: 1,
                });
            if dim.keys.values().any(|k| *k == key) {
                return Err(DomainError::MalformedTable(format!(
                    "surrogate key {} assigned twice in '{}'",
                    key, dimension
                )));
            }
            dim.keys.insert(natural.to_string(), key);
            dim.next = dim.next.max(key + 1);
        }
        Ok(allocator)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_stable_and_monotonic() {
        let mut keys = KeyAllocator::new();
        assert_eq!(keys.key_for("dim_product", "P1"), 1);
        assert_eq!(keys.key_for("dim_product", "P2"), 2);
        assert_eq!(keys.key_for("dim_product", "P1"), 1);
        // Dimensions have independent sequences.
        assert_eq!(keys.key_for("dim_store", "S1"), 1);
        assert_eq!(keys.len("dim_product"), 2);
    }

    #[test]
    fn test_independent_allocators_do_not_share_state() {
        let mut a = KeyAllocator::new();
        let mut b = KeyAllocator::new();
        a.key_for("dim_product", "P1");
        a.key_for("dim_product", "P2");
        assert_eq!(b.key_for("dim_product", "P9"), 1);
    }

    #[test]
    fn test_persisted_table_resumes_sequence() {
        let mut keys = KeyAllocator::new();
        keys.key_for("dim_product", "P1");
        keys.key_for("dim_product", "P2");

        let mut restored = KeyAllocator::from_table(&keys.to_table().unwrap()).unwrap();
        assert_eq!(restored, keys);
        assert_eq!(restored.key_for("dim_product", "P3"), 3);
        assert_eq!(restored.lookup("dim_product", "P1"), Some(1));
    }

    #[test]
    fn test_duplicate_surrogate_key_is_rejected() -> anyhow::Result<()> {
        let table = Table::try_new(
            KeyAllocator::fields(),
            vec![
                vec![Value::str("dim_product"), Value::str("P1"), Value::Int(1)],
                vec![Value::str("dim_product"), Value::str("P2"), Value::Int(1)],
            ],
        )?;
        assert!(KeyAllocator::from_table(&table).is_err());
        Ok(())
    }
}
