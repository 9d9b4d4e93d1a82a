use sea_orm::{ColumnTrait, Condition};
use uuid::Uuid;

use crate::entity_traits::TenantScoped;

/// Combine a caller filter with the tenant equality constraint.
///
/// The result is `caller AND tenant_id = tenant` built as a fresh
/// `Condition::all()` group, so arbitrarily nested AND/OR/NOT trees in the
/// caller filter keep their own grouping — the tenant constraint can never
/// be absorbed into a caller-level OR.
///
/// With no caller filter the final condition is the tenant equality alone.
/// For entities without a tenant column the caller filter (or an empty
/// all-group) is returned untouched.
pub fn scoped_condition<E>(caller: Option<Condition>, tenant_id: Uuid) -> Condition
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
{
    let mut cond = Condition::all();
    if let Some(caller) = caller {
        cond = cond.add(caller);
    }
    if let Some(tenant_col) = E::tenant_col() {
        cond = cond.add(tenant_col.eq(tenant_id));
    }
    cond
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::QueryTrait;
    use sea_orm::entity::prelude::*;

    mod widget {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "widgets")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: Uuid,
            pub tenant_id: Uuid,
            pub name: String,
            pub archived: bool,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}

        impl crate::TenantScoped for Entity {
            fn tenant_col() -> Option<Column> {
                Some(Column::TenantId)
            }
            fn resource_col() -> Option<Column> {
                Some(Column::Id)
            }
        }
    }

    mod lookup {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "lookups")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: Uuid,
            pub code: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}

        impl crate::TenantScoped for Entity {
            fn tenant_col() -> Option<Column> {
                None
            }
            fn resource_col() -> Option<Column> {
                Some(Column::Id)
            }
        }
    }

    fn sql_for(cond: Condition) -> String {
        widget::Entity::find()
            .filter(cond)
            .build(sea_orm::DatabaseBackend::Sqlite)
            .to_string()
    }

    #[test]
    fn no_caller_filter_yields_tenant_equality_only() {
        let tenant = Uuid::new_v4();
        let sql = sql_for(scoped_condition::<widget::Entity>(None, tenant));
        assert!(sql.contains("\"tenant_id\" ="), "missing tenant constraint: {sql}");
        assert!(!sql.contains("OR"));
    }

    #[test]
    fn caller_or_tree_stays_grouped() {
        let tenant = Uuid::new_v4();
        let caller = Condition::any()
            .add(widget::Column::Name.eq("a"))
            .add(widget::Column::Archived.eq(true));

        let sql = sql_for(scoped_condition::<widget::Entity>(Some(caller), tenant));

        // The OR group must be parenthesized and ANDed with the tenant
        // constraint, never flattened into it.
        assert!(
            sql.contains(") AND"),
            "caller OR group not isolated from tenant constraint: {sql}"
        );
        assert!(sql.contains("\"tenant_id\" ="));
    }

    #[test]
    fn caller_not_predicate_survives() {
        let tenant = Uuid::new_v4();
        let caller = Condition::all().add(widget::Column::Archived.eq(true).not());

        let sql = sql_for(scoped_condition::<widget::Entity>(Some(caller), tenant));
        assert!(sql.contains("\"tenant_id\" ="));
    }

    #[test]
    fn global_entity_passes_caller_filter_through() {
        let tenant = Uuid::new_v4();
        let caller = Condition::all().add(lookup::Column::Code.eq("iso-3166"));

        let cond = scoped_condition::<lookup::Entity>(Some(caller), tenant);
        let sql = lookup::Entity::find()
            .filter(cond)
            .build(sea_orm::DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains("\"code\" ="));
        assert!(!sql.contains("tenant_id"), "global entity must not be tenant-filtered: {sql}");
    }
}
