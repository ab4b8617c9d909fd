//! Role entity - 角色表
//!
//! 表名: sys_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::Status;

/// 角色类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleKind {
    /// 系统内置
    System = 1,
    /// 业务角色
    Business = 2,
}

impl From<i32> for RoleKind {
    fn from(value: i32) -> Self {
        match value {
            1 => RoleKind::System,
            _ => RoleKind::Business,
        }
    }
}

impl From<RoleKind> for i32 {
    fn from(kind: RoleKind) -> Self {
        kind as i32
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 角色编码 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub code: String,

    /// 角色名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 类型: 1=系统, 2=业务
    pub kind: i32,

    /// 状态: 0=停用, 1=启用
    pub status: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        Status::from(self.status) == Status::Active
    }
}
