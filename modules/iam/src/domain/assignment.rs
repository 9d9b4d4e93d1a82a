//! The role-assignment capability matrix.
//!
//! Kept as one explicit lookup table rather than branching code: the
//! entire policy of who may hand out which role is visible in a single
//! place and exhaustively testable.

/// Names of the per-tenant system roles.
pub mod roles {
    pub const SUPER_ADMIN: &str = "SUPER_ADMIN";
    pub const ADMIN: &str = "ADMIN";
    pub const MEMBER: &str = "MEMBER";
}

/// target role → roles allowed to assign it. Roles not listed fall back
/// to [`DEFAULT_ACTORS`] (any custom tenant role is assignable by admins).
const ASSIGNMENT_MATRIX: &[(&str, &[&str])] = &[
    (roles::SUPER_ADMIN, &[roles::SUPER_ADMIN]),
    (roles::ADMIN, &[roles::ADMIN, roles::SUPER_ADMIN]),
];

const DEFAULT_ACTORS: &[&str] = &[roles::ADMIN, roles::SUPER_ADMIN];

/// Whether a principal holding `actor_role` may assign `target_role`.
#[must_use]
pub fn can_assign_role(actor_role: &str, target_role: &str) -> bool {
    let allowed = ASSIGNMENT_MATRIX
        .iter()
        .find(|(target, _)| *target == target_role)
        .map_or(DEFAULT_ACTORS, |(_, actors)| *actors);
    allowed.contains(&actor_role)
}
