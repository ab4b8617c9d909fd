//! Permission entity - 权限表
//!
//! 表名: sys_permission

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::Status;
use crate::tree::TreeItem;

/// 权限类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionKind {
    /// 菜单
    Menu = 1,
    /// 按钮
    Button = 2,
    /// 数据
    Data = 3,
}

impl TryFrom<i32> for PermissionKind {
    type Error = crate::error::AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PermissionKind::Menu),
            2 => Ok(PermissionKind::Button),
            3 => Ok(PermissionKind::Data),
            other => Err(crate::error::AppError::Validation(format!(
                "unknown permission kind {}",
                other
            ))),
        }
    }
}

impl From<PermissionKind> for i32 {
    fn from(kind: PermissionKind) -> Self {
        kind as i32
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_permission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 权限编码 (唯一), 鉴权时按此精确匹配
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub code: String,

    /// 权限名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 类型: 1=菜单, 2=按钮, 3=数据
    pub kind: i32,

    /// 父权限ID
    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,

    /// 祖先ID链, 仅由 PathMaintainer 写入
    #[sea_orm(column_type = "String(Some(512))")]
    pub path: String,

    /// 排序号
    pub sort_order: i32,

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

    pub fn is_menu(&self) -> bool {
        self.kind == i32::from(PermissionKind::Menu)
    }
}

impl TreeItem for Model {
    fn node_id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}
