//! `SeaORM` Entity for transactions table.
//!
//! `from_id` and `to_id` carry no foreign key so the log outlives closed
//! accounts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::TransactionType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
    pub from_id: Option<Uuid>,
    pub to_id: Option<Uuid>,
    #[sea_orm(column_name = "type")]
    pub transaction_type: TransactionType,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
