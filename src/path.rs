//! Materialized path maintenance
//!
//! Every department and permission stores the comma-joined id chain from its
//! tree root down to itself (`"1,3,7"`). This module is the only writer of that
//! column: it recomputes a node's path from its parent and then walks the
//! subtree so that every descendant embeds the new chain.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::HierarchyConfig;
use crate::entity::{department, permission};
use crate::error::{AppError, AppResult, OptionExt};
use crate::tree::{self, TreeDiagnostic, TreeItem};

pub const PATH_SEPARATOR: char = ',';

/// Which self-referencing table a path operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hierarchy {
    Department,
    Permission,
}

impl Hierarchy {
    pub fn entity_name(self) -> &'static str {
        match self {
            Hierarchy::Department => "department",
            Hierarchy::Permission => "permission",
        }
    }
}

/// Path for `id` under a parent whose path is `parent_path`
pub fn path_of(parent_path: Option<&str>, id: i64) -> String {
    match parent_path {
        Some(parent) if !parent.is_empty() => format!("{}{}{}", parent, PATH_SEPARATOR, id),
        _ => id.to_string(),
    }
}

/// Ids encoded in a path, root first. Malformed segments are skipped.
pub fn ancestor_ids(path: &str) -> Vec<i64> {
    path.split(PATH_SEPARATOR)
        .filter_map(|segment| segment.trim().parse().ok())
        .collect()
}

/// Whether `path` passes through `ancestor_id` (a node counts as its own ancestor)
pub fn is_descendant_path(path: &str, ancestor_id: i64) -> bool {
    ancestor_ids(path).contains(&ancestor_id)
}

/// Outcome of a path recomputation.
#[derive(Debug, Default)]
pub struct PathReport {
    /// Nodes whose path was written, in visit order
    pub updated: Vec<(i64, String)>,
    /// Dangling parents and cycles that were degraded instead of failing
    pub diagnostics: Vec<TreeDiagnostic>,
    /// Subtrees that could not be updated; their siblings were still processed
    pub failures: Vec<(i64, AppError)>,
}

impl PathReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.failures.is_empty()
    }

    pub fn path_for(&self, id: i64) -> Option<&str> {
        self.updated
            .iter()
            .rev()
            .find(|(node, _)| *node == id)
            .map(|(_, path)| path.as_str())
    }

    /// Dangling parents as typed errors, for callers that want to surface them
    pub fn dangling_references(&self, hierarchy: Hierarchy) -> Vec<AppError> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                TreeDiagnostic::DanglingParent { id, parent_id } => Some(AppError::DanglingReference {
                    entity: hierarchy.entity_name(),
                    id: *id,
                    parent_id: *parent_id,
                }),
                TreeDiagnostic::Cycle { .. } => None,
            })
            .collect()
    }

    pub fn merge(&mut self, other: PathReport) {
        self.updated.extend(other.updated);
        for diagnostic in other.diagnostics {
            if !self.diagnostics.contains(&diagnostic) {
                self.diagnostics.push(diagnostic);
            }
        }
        self.failures.extend(other.failures);
    }
}

/// Owner of the `path` column on departments and permissions.
#[derive(Clone)]
pub struct PathMaintainer {
    db: DatabaseConnection,
    atomic: bool,
}

impl PathMaintainer {
    pub fn new(db: DatabaseConnection, config: &HierarchyConfig) -> Self {
        Self {
            db,
            atomic: config.atomic_path_cascade,
        }
    }

    /// Recompute the path of `node_id` and cascade to all of its descendants.
    ///
    /// Fails only when the node itself is missing or its own row cannot be
    /// written. In atomic mode, any subtree failure rolls the whole cascade back.
    pub async fn recompute(&self, hierarchy: Hierarchy, node_id: i64) -> AppResult<PathReport> {
        self.apply(hierarchy, node_id, None).await
    }

    /// Point `node_id` at a new parent (`None` for the top level) and cascade.
    ///
    /// The parent change commits together with the node's own path, so a
    /// failed move leaves the old parent in place. In atomic mode the whole
    /// subtree commits with it.
    pub async fn move_node(&self, hierarchy: Hierarchy, node_id: i64, parent_id: Option<i64>) -> AppResult<PathReport> {
        self.apply(hierarchy, node_id, Some(parent_id)).await
    }

    async fn apply(&self, hierarchy: Hierarchy, node_id: i64, new_parent: Option<Option<i64>>) -> AppResult<PathReport> {
        let txn = self.db.begin().await?;
        let (mut report, own_path) = match write_head(&txn, hierarchy, node_id, new_parent).await {
            Ok(head) => head,
            Err(err) => {
                txn.rollback().await?;
                return Err(err);
            }
        };

        if !self.atomic {
            txn.commit().await?;
            descend(&self.db, hierarchy, node_id, own_path, &mut report).await;
        } else {
            descend(&txn, hierarchy, node_id, own_path, &mut report).await;
            if let Some((id, err)) = report.failures.first() {
                let reason = format!("{} {}: {}", hierarchy.entity_name(), id, err);
                txn.rollback().await?;
                warn!("Path cascade from {} {} rolled back: {}", hierarchy.entity_name(), node_id, reason);
                return Err(AppError::CascadeAborted(reason));
            }
            txn.commit().await?;
        }

        debug!(
            "Recomputed {} path from {}: {} nodes",
            hierarchy.entity_name(),
            node_id,
            report.updated.len()
        );
        Ok(report)
    }

    /// Recompute every tree of a hierarchy from its roots.
    pub async fn rebuild_all(&self, hierarchy: Hierarchy) -> AppResult<PathReport> {
        let rows = load_all(&self.db, hierarchy).await?;
        let total = rows.len();
        let forest = tree::assemble(rows);

        let mut report = PathReport {
            diagnostics: forest.diagnostics,
            ..PathReport::default()
        };
        for root in &forest.roots {
            match self.recompute(hierarchy, root.value.id).await {
                Ok(sub) => report.merge(sub),
                Err(err) => report.failures.push((root.value.id, err)),
            }
        }

        info!(
            "Rebuilt {} paths: {} of {} nodes updated, {} diagnostics, {} failures",
            hierarchy.entity_name(),
            report.updated.len(),
            total,
            report.diagnostics.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Apply an optional parent change to the node and write its own path.
async fn write_head<C: ConnectionTrait>(
    conn: &C,
    hierarchy: Hierarchy,
    node_id: i64,
    new_parent: Option<Option<i64>>,
) -> AppResult<(PathReport, String)> {
    if let Some(parent_id) = new_parent {
        write_parent(conn, hierarchy, node_id, parent_id).await?;
    }

    let node = load_row(conn, hierarchy, node_id)
        .await?
        .ok_or_not_found(format!("{} {}", hierarchy.entity_name(), node_id))?;

    let mut report = PathReport::default();

    let own_path = match node.parent_id {
        None => path_of(None, node.id),
        Some(parent_id) if parent_id == node.id => {
            warn!("{} {} is its own parent, treating as root", hierarchy.entity_name(), node.id);
            report.diagnostics.push(TreeDiagnostic::Cycle { id: node.id });
            path_of(None, node.id)
        }
        Some(parent_id) => match load_row(conn, hierarchy, parent_id).await? {
            Some(parent) => path_of(Some(&parent.path), node.id),
            None => {
                warn!(
                    "{} {} references missing parent {}, treating as root",
                    hierarchy.entity_name(),
                    node.id,
                    parent_id
                );
                report.diagnostics.push(TreeDiagnostic::DanglingParent {
                    id: node.id,
                    parent_id,
                });
                path_of(None, node.id)
            }
        },
    };

    write_path(conn, hierarchy, node.id, &own_path).await?;
    report.updated.push((node.id, own_path.clone()));
    Ok((report, own_path))
}

/// Rewrite every descendant of `root_id`. Failures are recorded per subtree
/// and never stop the walk.
async fn descend<C: ConnectionTrait>(
    conn: &C,
    hierarchy: Hierarchy,
    root_id: i64,
    root_path: String,
    report: &mut PathReport,
) {
    let mut visited: HashSet<i64> = HashSet::from([root_id]);
    let mut stack = vec![(root_id, root_path)];

    while let Some((parent_id, parent_path)) = stack.pop() {
        let children = match child_ids(conn, hierarchy, parent_id).await {
            Ok(children) => children,
            Err(err) => {
                warn!("Failed to load children of {} {}: {}", hierarchy.entity_name(), parent_id, err);
                report.failures.push((parent_id, err));
                continue;
            }
        };

        let mut next = Vec::with_capacity(children.len());
        for child in children {
            if !visited.insert(child) {
                warn!("{} {} closes a parent cycle, not descending", hierarchy.entity_name(), child);
                report.diagnostics.push(TreeDiagnostic::Cycle { id: child });
                continue;
            }
            let child_path = path_of(Some(&parent_path), child);
            match write_path(conn, hierarchy, child, &child_path).await {
                Ok(()) => {
                    report.updated.push((child, child_path.clone()));
                    next.push((child, child_path));
                }
                Err(err) => {
                    warn!("Failed to update path of {} {}: {}", hierarchy.entity_name(), child, err);
                    report.failures.push((child, err));
                }
            }
        }
        stack.extend(next.into_iter().rev());
    }
}

/// The three columns path maintenance needs, whatever the table.
#[derive(Clone, Debug)]
struct PathRow {
    id: i64,
    parent_id: Option<i64>,
    path: String,
}

impl TreeItem for PathRow {
    fn node_id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}

impl From<department::Model> for PathRow {
    fn from(m: department::Model) -> Self {
        Self {
            id: m.id,
            parent_id: m.parent_id,
            path: m.path,
        }
    }
}

impl From<permission::Model> for PathRow {
    fn from(m: permission::Model) -> Self {
        Self {
            id: m.id,
            parent_id: m.parent_id,
            path: m.path,
        }
    }
}

async fn load_row<C: ConnectionTrait>(conn: &C, hierarchy: Hierarchy, id: i64) -> AppResult<Option<PathRow>> {
    let row = match hierarchy {
        Hierarchy::Department => department::Entity::find_by_id(id).one(conn).await?.map(PathRow::from),
        Hierarchy::Permission => permission::Entity::find_by_id(id).one(conn).await?.map(PathRow::from),
    };
    Ok(row)
}

async fn load_all<C: ConnectionTrait>(conn: &C, hierarchy: Hierarchy) -> AppResult<Vec<PathRow>> {
    let rows = match hierarchy {
        Hierarchy::Department => department::Entity::find()
            .order_by_asc(department::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(PathRow::from)
            .collect(),
        Hierarchy::Permission => permission::Entity::find()
            .order_by_asc(permission::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(PathRow::from)
            .collect(),
    };
    Ok(rows)
}

async fn child_ids<C: ConnectionTrait>(conn: &C, hierarchy: Hierarchy, parent_id: i64) -> AppResult<Vec<i64>> {
    let ids = match hierarchy {
        Hierarchy::Department => department::Entity::find()
            .filter(department::Column::ParentId.eq(parent_id))
            .order_by_asc(department::Column::SortOrder)
            .order_by_asc(department::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect(),
        Hierarchy::Permission => permission::Entity::find()
            .filter(permission::Column::ParentId.eq(parent_id))
            .order_by_asc(permission::Column::SortOrder)
            .order_by_asc(permission::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
    };
    Ok(ids)
}

async fn write_parent<C: ConnectionTrait>(
    conn: &C,
    hierarchy: Hierarchy,
    id: i64,
    parent_id: Option<i64>,
) -> AppResult<()> {
    let result = match hierarchy {
        Hierarchy::Department => {
            department::Entity::update_many()
                .col_expr(department::Column::ParentId, Expr::value(parent_id))
                .filter(department::Column::Id.eq(id))
                .exec(conn)
                .await?
        }
        Hierarchy::Permission => {
            permission::Entity::update_many()
                .col_expr(permission::Column::ParentId, Expr::value(parent_id))
                .filter(permission::Column::Id.eq(id))
                .exec(conn)
                .await?
        }
    };
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("{} {}", hierarchy.entity_name(), id)));
    }
    Ok(())
}

async fn write_path<C: ConnectionTrait>(conn: &C, hierarchy: Hierarchy, id: i64, path: &str) -> AppResult<()> {
    let result = match hierarchy {
        Hierarchy::Department => {
            department::Entity::update_many()
                .col_expr(department::Column::Path, Expr::value(path.to_string()))
                .filter(department::Column::Id.eq(id))
                .exec(conn)
                .await?
        }
        Hierarchy::Permission => {
            permission::Entity::update_many()
                .col_expr(permission::Column::Path, Expr::value(path.to_string()))
                .filter(permission::Column::Id.eq(id))
                .exec(conn)
                .await?
        }
    };
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("{} {}", hierarchy.entity_name(), id)));
    }
    Ok(())
}
