//! CustomDomain entity: the one custom domain attached to this instance

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Primary key of the only row the table may hold
pub const RECORD_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "custom_domain")]
pub struct Model {
    /// Always [`RECORD_ID`]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    /// Lowercase hostname
    #[sea_orm(unique)]
    pub domain: String,

    /// Expected value of the `_<brand>-verify` TXT record
    pub verification_token: String,

    /// When DNS ownership was first confirmed
    pub verified_at: Option<ChronoDateTimeUtc>,

    /// When the reverse-proxy route was installed
    pub activated_at: Option<ChronoDateTimeUtc>,

    /// Last successful activation or periodic re-check
    pub last_verified_at: Option<ChronoDateTimeUtc>,

    pub verification_attempts: i32,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
