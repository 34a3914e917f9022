//! SeaORM Entity for the canonical current-price table.
//!
//! One row per (card, variant, source). `source_link` and
//! `source_product_id` are admin-managed configuration; `updated_at`,
//! `data` and `price` are derived by ingestion and are all-or-nothing.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sources::SourceType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "card_prices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub card_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub variant_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_type: SourceType,
    /// Reference URL supplied by an admin when registering the source.
    pub source_link: String,
    /// External system's product id, used for pairing against feed data.
    pub source_product_id: Option<String>,
    pub updated_at: Option<DateTimeWithTimeZone>,
    /// Full normalized payload for the last successful fetch.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub data: Option<Json>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub price: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
