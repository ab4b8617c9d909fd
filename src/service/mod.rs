//! Directory services
//!
//! Create/update/status/delete for the organisation and permission tables.
//! Path columns are written only by the path maintainer. Grants and
//! memberships are changed through the assignment engine, except that
//! deleting a role drops its own join rows in the same transaction.

pub mod department;
pub mod permission;
pub mod role;
pub mod user;

pub use department::DepartmentService;
pub use permission::PermissionService;
pub use role::RoleService;
pub use user::UserService;

use serde::{Deserialize, Deserializer};

use crate::error::{AppError, AppResult};

/// Reject empty values and values longer than `max` characters
fn check_text(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must not exceed {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Tells an explicit `null` apart from a missing field: absent stays `None`,
/// `null` becomes `Some(None)`. Use together with `#[serde(default)]`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_text_counts_characters() {
        assert!(check_text("name", "装配车间", 4).is_ok());
        assert!(check_text("name", "装配车间一", 4).is_err());
        assert!(matches!(check_text("code", "  ", 8), Err(AppError::Validation(_))));
    }
}
