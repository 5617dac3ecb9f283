use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::return_request::ReturnStatus;

/// Append-only audit entry for a return request. One row is written when
/// the request is created (`old_status = None`) and one per status change.
/// Rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "return_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub return_request_id: Uuid,
    pub old_status: Option<ReturnStatus>,
    pub new_status: ReturnStatus,
    pub note: Option<String>,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::return_request::Entity",
        from = "Column::ReturnRequestId",
        to = "super::return_request::Column::Id"
    )]
    ReturnRequest,
}

impl Related<super::return_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
