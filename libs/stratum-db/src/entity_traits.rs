use sea_orm::EntityTrait;

/// Declares how an entity participates in tenant scoping.
///
/// Implementing this trait with `tenant_col() -> Some(..)` puts the entity
/// on the tenant-owned allow-list: the gateway stamps writes and constrains
/// reads on that column. Returning `None` marks the entity as global —
/// operations pass through unmodified.
///
/// Both dimensions must be declared explicitly; there are no implicit
/// defaults for a column named `tenant_id`.
///
/// # Example
/// ```rust,ignore
/// impl TenantScoped for note::Entity {
///     fn tenant_col() -> Option<Self::Column> {
///         Some(note::Column::TenantId)
///     }
///     fn resource_col() -> Option<Self::Column> {
///         Some(note::Column::Id)
///     }
/// }
/// ```
pub trait TenantScoped: EntityTrait {
    /// Column holding the owning tenant ID, or `None` for global entities.
    fn tenant_col() -> Option<Self::Column>;

    /// Column holding the primary resource identifier (typically the
    /// primary key). Required for the by-id operations.
    fn resource_col() -> Option<Self::Column>;
}
