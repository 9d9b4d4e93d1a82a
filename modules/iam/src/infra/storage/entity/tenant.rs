use sea_orm::entity::prelude::*;
use time::OffsetDateTime;
use uuid::Uuid;

/// The root of isolation. Deliberately unscoped: tenant rows must be
/// reachable before any tenant context exists (slug resolution, signup).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub slug: String,
    pub status: TenantStatus,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TenantStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::principal::Entity")]
    Principal,
    #[sea_orm(has_many = "super::role::Entity")]
    Role,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<super::principal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Principal.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl stratum_db::TenantScoped for Entity {
    fn tenant_col() -> Option<Column> {
        None
    }
    fn resource_col() -> Option<Column> {
        Some(Column::Id)
    }
}
