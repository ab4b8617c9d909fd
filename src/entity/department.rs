//! Department entity - 部门表
//!
//! 表名: sys_department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::Status;
use crate::tree::TreeItem;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 部门编码 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub code: String,

    /// 部门名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 父部门ID (None 表示顶级部门)
    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,

    /// 祖先ID链, 例如 "1,3,7", 仅由 PathMaintainer 写入
    #[sea_orm(column_type = "String(Some(512))")]
    pub path: String,

    /// 排序号
    pub sort_order: i32,

    /// 状态: 0=停用, 1=启用
    pub status: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 自引用关系通过 parent_id 手动查询处理

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        Status::from(self.status) == Status::Active
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
