//! SeaORM Entity for the append-only price history log.
//!
//! Rows are inserted once per successful pairing and never updated or
//! deleted, even when the current-price row is removed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sources::SourceType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "card_price_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
