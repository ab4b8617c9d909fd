//! User entity - 用户表
//!
//! 表名: sys_user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::Status;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 用户名 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub username: String,

    /// 密码 (bcrypt 哈希)
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    /// 所属部门ID
    #[sea_orm(nullable)]
    pub department_id: Option<i64>,

    /// 用户状态: 0=停用, 1=启用
    pub status: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 角色关系通过 user_role 表手动查询处理

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        Status::from(self.status) == Status::Active
    }
}
