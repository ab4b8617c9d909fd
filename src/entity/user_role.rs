//! UserRole entity - 用户角色关系表
//!
//! 表名: sys_user_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_user_role")]
pub struct Model {
    /// 用户ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,

    /// 角色ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub role_id: i64,

    /// 创建人ID
    pub created_by: i64,

    /// 创建时间 (Unix 时间戳)
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 联合主键保证 (user_id, role_id) 不重复

impl ActiveModelBehavior for ActiveModel {}
