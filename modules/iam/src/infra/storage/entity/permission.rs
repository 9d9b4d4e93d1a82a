use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Shared catalog of grantable capability triples. Unscoped: the catalog
/// is global, tenancy applies at the role-permission grant level.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub resource: String,
    pub action: String,
    pub scope: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl stratum_db::TenantScoped for Entity {
    fn tenant_col() -> Option<Column> {
        None
    }
    fn resource_col() -> Option<Column> {
        Some(Column::Id)
    }
}
