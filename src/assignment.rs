//! Role/permission assignment
//!
//! Replaces the full permission set of a role, or the full role set of a user,
//! in one transaction. The change is computed as a pure diff first, so rows
//! that stay keep their original audit stamps and a repeated call writes nothing.

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::entity::{permission, role, role_permission, user, user_role};
use crate::error::{AppError, AppResult};

/// Rows to insert and rows to delete to turn one id set into another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssociationDiff {
    pub to_add: BTreeSet<i64>,
    pub to_remove: BTreeSet<i64>,
}

impl AssociationDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// `to_add = desired - existing`, `to_remove = existing - desired`
pub fn diff(existing: &BTreeSet<i64>, desired: &BTreeSet<i64>) -> AssociationDiff {
    AssociationDiff {
        to_add: desired.difference(existing).copied().collect(),
        to_remove: existing.difference(desired).copied().collect(),
    }
}

/// The two many-to-many links managed here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Association {
    /// role -> permissions
    RolePermissions,
    /// user -> roles
    UserRoles,
}

impl Association {
    fn owner_name(self) -> &'static str {
        match self {
            Association::RolePermissions => "role",
            Association::UserRoles => "user",
        }
    }

    fn target_name(self) -> &'static str {
        match self {
            Association::RolePermissions => "permission",
            Association::UserRoles => "role",
        }
    }
}

/// What a replacement changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignmentOutcome {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    /// Rows left untouched
    pub kept: usize,
}

impl AssignmentOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone)]
pub struct AssignmentEngine {
    db: DatabaseConnection,
}

impl AssignmentEngine {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Make `role_id` grant exactly `permission_ids`.
    pub async fn assign_permissions(
        &self,
        role_id: i64,
        permission_ids: impl IntoIterator<Item = i64>,
        actor_id: i64,
    ) -> AppResult<AssignmentOutcome> {
        self.replace(
            Association::RolePermissions,
            role_id,
            permission_ids.into_iter().collect(),
            actor_id,
        )
        .await
    }

    /// Make `user_id` hold exactly `role_ids`.
    pub async fn assign_roles(
        &self,
        user_id: i64,
        role_ids: impl IntoIterator<Item = i64>,
        actor_id: i64,
    ) -> AppResult<AssignmentOutcome> {
        self.replace(Association::UserRoles, user_id, role_ids.into_iter().collect(), actor_id)
            .await
    }

    pub async fn role_permission_ids(&self, role_id: i64) -> AppResult<BTreeSet<i64>> {
        linked_ids(&self.db, Association::RolePermissions, role_id).await
    }

    pub async fn user_role_ids(&self, user_id: i64) -> AppResult<BTreeSet<i64>> {
        linked_ids(&self.db, Association::UserRoles, user_id).await
    }

    pub async fn grant_permission(&self, role_id: i64, permission_id: i64, actor_id: i64) -> AppResult<()> {
        self.link(Association::RolePermissions, role_id, permission_id, actor_id).await
    }

    pub async fn revoke_permission(&self, role_id: i64, permission_id: i64) -> AppResult<()> {
        self.unlink(Association::RolePermissions, role_id, permission_id).await
    }

    pub async fn add_user_role(&self, user_id: i64, role_id: i64, actor_id: i64) -> AppResult<()> {
        self.link(Association::UserRoles, user_id, role_id, actor_id).await
    }

    pub async fn remove_user_role(&self, user_id: i64, role_id: i64) -> AppResult<()> {
        self.unlink(Association::UserRoles, user_id, role_id).await
    }

    async fn replace(
        &self,
        assoc: Association,
        owner_id: i64,
        desired: BTreeSet<i64>,
        actor_id: i64,
    ) -> AppResult<AssignmentOutcome> {
        if !owner_exists(&self.db, assoc, owner_id).await? {
            return Err(AppError::NotFound(format!("{} {}", assoc.owner_name(), owner_id)));
        }

        let outcome = self
            .db
            .transaction::<_, AssignmentOutcome, AppError>(move |txn| {
                Box::pin(async move {
                    let existing = linked_ids(txn, assoc, owner_id).await?;
                    let plan = diff(&existing, &desired);
                    let kept = existing.len() - plan.to_remove.len();
                    if plan.is_empty() {
                        return Ok(AssignmentOutcome {
                            kept,
                            ..AssignmentOutcome::default()
                        });
                    }
                    debug!(
                        "{} {} {}s: +{:?} -{:?}",
                        assoc.owner_name(),
                        owner_id,
                        assoc.target_name(),
                        plan.to_add,
                        plan.to_remove
                    );

                    delete_links(txn, assoc, owner_id, &plan.to_remove).await?;
                    ensure_targets_exist(txn, assoc, &plan.to_add).await?;
                    insert_links(txn, assoc, owner_id, &plan.to_add, actor_id).await?;

                    Ok(AssignmentOutcome {
                        added: plan.to_add.into_iter().collect(),
                        removed: plan.to_remove.into_iter().collect(),
                        kept,
                    })
                })
            })
            .await?;

        if !outcome.is_noop() {
            info!(
                "Replaced {}s of {} {} by {}: {} added, {} removed, {} kept",
                assoc.target_name(),
                assoc.owner_name(),
                owner_id,
                actor_id,
                outcome.added.len(),
                outcome.removed.len(),
                outcome.kept
            );
        }
        Ok(outcome)
    }

    async fn link(&self, assoc: Association, owner_id: i64, target_id: i64, actor_id: i64) -> AppResult<()> {
        if !owner_exists(&self.db, assoc, owner_id).await? {
            return Err(AppError::NotFound(format!("{} {}", assoc.owner_name(), owner_id)));
        }
        let target = BTreeSet::from([target_id]);
        ensure_targets_exist(&self.db, assoc, &target).await?;

        if linked_ids(&self.db, assoc, owner_id).await?.contains(&target_id) {
            return Err(duplicate(assoc, owner_id, target_id));
        }

        insert_link(&self.db, assoc, owner_id, target_id, actor_id).await?;
        info!(
            "Linked {} {} to {} {} by {}",
            assoc.owner_name(),
            owner_id,
            assoc.target_name(),
            target_id,
            actor_id
        );
        Ok(())
    }

    async fn unlink(&self, assoc: Association, owner_id: i64, target_id: i64) -> AppResult<()> {
        let removed = delete_links(&self.db, assoc, owner_id, &BTreeSet::from([target_id])).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} has no {} {}",
                assoc.owner_name(),
                owner_id,
                assoc.target_name(),
                target_id
            )));
        }
        info!(
            "Unlinked {} {} from {} {}",
            assoc.owner_name(),
            owner_id,
            assoc.target_name(),
            target_id
        );
        Ok(())
    }
}

fn duplicate(assoc: Association, owner_id: i64, target_id: i64) -> AppError {
    AppError::DuplicateAssociation(format!(
        "{} {} already has {} {}",
        assoc.owner_name(),
        owner_id,
        assoc.target_name(),
        target_id
    ))
}

/// Insert one pair. A key violation from a concurrent add of the same pair
/// is reported as a duplicate rather than a database error.
async fn insert_link<C: ConnectionTrait>(
    conn: &C,
    assoc: Association,
    owner_id: i64,
    target_id: i64,
    actor_id: i64,
) -> AppResult<()> {
    match insert_links(conn, assoc, owner_id, &BTreeSet::from([target_id]), actor_id).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if linked_ids(conn, assoc, owner_id).await?.contains(&target_id) {
                Err(duplicate(assoc, owner_id, target_id))
            } else {
                Err(err)
            }
        }
    }
}

async fn owner_exists<C: ConnectionTrait>(conn: &C, assoc: Association, owner_id: i64) -> AppResult<bool> {
    let found = match assoc {
        Association::RolePermissions => role::Entity::find_by_id(owner_id).one(conn).await?.is_some(),
        Association::UserRoles => user::Entity::find_by_id(owner_id).one(conn).await?.is_some(),
    };
    Ok(found)
}

async fn linked_ids<C: ConnectionTrait>(conn: &C, assoc: Association, owner_id: i64) -> AppResult<BTreeSet<i64>> {
    let ids = match assoc {
        Association::RolePermissions => role_permission::Entity::find()
            .filter(role_permission::Column::RoleId.eq(owner_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|rp| rp.permission_id)
            .collect(),
        Association::UserRoles => user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(owner_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|ur| ur.role_id)
            .collect(),
    };
    Ok(ids)
}

async fn ensure_targets_exist<C: ConnectionTrait>(
    conn: &C,
    assoc: Association,
    target_ids: &BTreeSet<i64>,
) -> AppResult<()> {
    if target_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = target_ids.iter().copied().collect();
    let found: BTreeSet<i64> = match assoc {
        Association::RolePermissions => permission::Entity::find()
            .filter(permission::Column::Id.is_in(ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
        Association::UserRoles => role::Entity::find()
            .filter(role::Column::Id.is_in(ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect(),
    };

    let missing: Vec<i64> = target_ids.difference(&found).copied().collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!("{}s {:?}", assoc.target_name(), missing)));
    }
    Ok(())
}

async fn delete_links<C: ConnectionTrait>(
    conn: &C,
    assoc: Association,
    owner_id: i64,
    target_ids: &BTreeSet<i64>,
) -> AppResult<u64> {
    if target_ids.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i64> = target_ids.iter().copied().collect();
    let result = match assoc {
        Association::RolePermissions => {
            role_permission::Entity::delete_many()
                .filter(role_permission::Column::RoleId.eq(owner_id))
                .filter(role_permission::Column::PermissionId.is_in(ids))
                .exec(conn)
                .await?
        }
        Association::UserRoles => {
            user_role::Entity::delete_many()
                .filter(user_role::Column::UserId.eq(owner_id))
                .filter(user_role::Column::RoleId.is_in(ids))
                .exec(conn)
                .await?
        }
    };
    Ok(result.rows_affected)
}

async fn insert_links<C: ConnectionTrait>(
    conn: &C,
    assoc: Association,
    owner_id: i64,
    target_ids: &BTreeSet<i64>,
    actor_id: i64,
) -> AppResult<()> {
    if target_ids.is_empty() {
        return Ok(());
    }
    let now = chrono::Utc::now().timestamp();
    match assoc {
        Association::RolePermissions => {
            let rows = target_ids.iter().map(|&permission_id| role_permission::ActiveModel {
                role_id: Set(owner_id),
                permission_id: Set(permission_id),
                created_by: Set(actor_id),
                created_at: Set(now),
            });
            role_permission::Entity::insert_many(rows)
                .exec_without_returning(conn)
                .await?;
        }
        Association::UserRoles => {
            let rows = target_ids.iter().map(|&role_id| user_role::ActiveModel {
                user_id: Set(owner_id),
                role_id: Set(role_id),
                created_by: Set(actor_id),
                created_at: Set(now),
            });
            user_role::Entity::insert_many(rows)
                .exec_without_returning(conn)
                .await?;
        }
    }
    Ok(())
}
