// medallion-core/src/domain/schema/registry.rs

use std::collections::BTreeMap;

use crate::domain::error::DomainError;
use crate::domain::schema::descriptor::{ColumnSpec, SchemaDescriptor};
use crate::domain::table::{ColumnType, Value};

/// Dataset names shared by every layer.
pub mod datasets {
    pub const POS_SALES: &str = "pos_sales";
    pub const WEB_ORDERS: &str = "web_orders";
    pub const WAREHOUSE_INVENTORY: &str = "warehouse_inventory";
    pub const SHIPMENTS: &str = "shipments";

    pub const UNIFIED_SALES: &str = "unified_sales";
    pub const QUARANTINE: &str = "quarantine";

    pub const DIM_DATE: &str = "dim_date";
    pub const DIM_PRODUCT: &str = "dim_product";
    pub const DIM_STORE: &str = "dim_store";
    pub const DIM_CUSTOMER: &str = "dim_customer";
    pub const FACT_SALES: &str = "fact_sales";
    pub const SURROGATE_KEYS: &str = "meta_surrogate_keys";

    /// Bronze datasets, in ingestion order.
    pub const BRONZE: [&str; 4] = [POS_SALES, WEB_ORDERS, WAREHOUSE_INVENTORY, SHIPMENTS];
}

/// Store id given to web orders, which have no physical store.
pub const WEB_STORE_ID: &str = "WEB-ONLINE";

use crate::domain::table::ColumnType::{Bool, Date, Float, Int, String as Text};

fn col(name: &str, kind: ColumnType) -> ColumnSpec {
    ColumnSpec::new(name, kind)
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, SchemaDescriptor>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self {
            schemas: BTreeMap::new(),
        }
    }

    /// The four retail feeds plus the unified Silver sales shape.
    pub fn retail() -> Self {
        let mut registry = Self::empty();

        registry.register(SchemaDescriptor::new(
            datasets::POS_SALES,
            1,
            vec![
                col("invoice_no", Text),
                col("invoice_date", Date),
                col("store_id", Text),
                col("store_city", Text),
                col("customer_id", Text),
                col("product_id", Text),
                col("product_name", Text),
                col("category", Text),
                col("quantity", Int),
                col("unit_price", Float),
                col("total_amount", Float),
            ],
        ));

        registry.register(SchemaDescriptor::new(
            datasets::WEB_ORDERS,
            1,
            vec![
                col("order_id", Text),
                col("order_date", Date),
                col("customer_id", Text),
                col("customer_name", Text),
                col("customer_city", Text),
                col("product_id", Text),
                col("product_name", Text),
                col("category", Text),
                col("quantity", Int),
                col("unit_price", Float),
                col("total_amount", Float),
                col("payment_method", Text),
                col("delivery_address", Text),
            ],
        ));

        registry.register(SchemaDescriptor::new(
            datasets::WAREHOUSE_INVENTORY,
            1,
            vec![
                col("snapshot_date", Date),
                col("store_id", Text),
                col("store_city", Text),
                col("product_id", Text),
                col("product_name", Text),
                col("category", Text),
                col("quantity_on_hand", Int),
                col("reorder_level", Int),
                col("unit_cost", Float),
            ],
        ));

        registry.register(SchemaDescriptor::new(
            datasets::SHIPMENTS,
            1,
            vec![
                col("shipment_id", Text),
                col("order_id", Text),
                col("origin_store", Text),
                col("destination_city", Text),
                col("ship_date", Date),
                col("delivery_date", Date),
                col("status", Text),
                col("carrier", Text),
            ],
        ));

        registry.register(Self::unified_sales());
        registry
    }

    /// Common shape of POS and Web sales in Silver.
    pub fn unified_sales() -> SchemaDescriptor {
        SchemaDescriptor::new(
            datasets::UNIFIED_SALES,
            1,
            vec![
                col("sale_id", Int),
                col("transaction_id", Text),
                col("transaction_date", Date),
                col("channel", Text),
                col("store_id", Text),
                col("city", Text),
                col("customer_id", Text),
                col("customer_name", Text),
                col("customer_city", Text),
                col("product_id", Text),
                col("product_name", Text),
                col("category", Text),
                col("quantity", Int),
                col("unit_price", Float),
                col("total_amount", Float),
                col("is_outlier", Bool).with_default(Value::Bool(false)),
            ],
        )
    }

    pub fn register(&mut self, descriptor: SchemaDescriptor) {
        self.schemas.insert(descriptor.dataset.clone(), descriptor);
    }

    pub fn get(&self, dataset: &str) -> Result<&SchemaDescriptor, DomainError> {
        self.schemas
            .get(dataset)
            .ok_or_else(|| DomainError::UnknownDataset(dataset.to_string()))
    }

    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::retail()
    }
}

/// Column identifying a row in audit samples and quarantine records.
pub fn row_id_column(dataset: &str) -> Option<&'static str> {
    match dataset {
        datasets::POS_SALES => Some("invoice_no"),
        datasets::WEB_ORDERS => Some("order_id"),
        datasets::SHIPMENTS => Some("shipment_id"),
        datasets::WAREHOUSE_INVENTORY => Some("product_id"),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retail_registry_knows_every_bronze_dataset() {
        let registry = SchemaRegistry::retail();
        for ds in datasets::BRONZE {
            assert!(registry.get(ds).is_ok(), "{ds} missing");
            assert!(row_id_column(ds).is_some());
        }
    }

    #[test]
    fn test_unknown_dataset_is_an_error() {
        let registry = SchemaRegistry::retail();
        assert!(matches!(
            registry.get("returns"),
            Err(DomainError::UnknownDataset(name)) if name == "returns"
        ));
    }

    #[test]
    fn test_pos_schema_column_types() {
        let registry = SchemaRegistry::retail();
        let pos = registry.get(datasets::POS_SALES).unwrap();
        assert_eq!(pos.column("quantity").unwrap().kind, ColumnType::Int);
        assert_eq!(pos.column("invoice_date").unwrap().kind, ColumnType::Date);
        assert_eq!(pos.columns.len(), 11);
    }
}
