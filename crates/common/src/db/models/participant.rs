//! Participant entity (the roster)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// npub-encoded public key
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub pubkey: String,

    pub registration_date: Date,

    /// Imported from the seed list rather than discovered
    pub existing_user: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
