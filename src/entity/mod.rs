//! Entity module - SeaORM 实体定义
//!
//! 包含组织架构与权限相关的数据库表模型

use serde::{Deserialize, Serialize};

pub mod department;
pub mod permission;
pub mod role;
pub mod role_permission;
pub mod user;
pub mod user_role;

/// 启用状态 (部门、权限、角色、用户共用)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// 停用
    Inactive = 0,
    /// 启用
    Active = 1,
}

impl From<i32> for Status {
    fn from(value: i32) -> Self {
        match value {
            1 => Status::Active,
            _ => Status::Inactive,
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_value() {
        assert_eq!(Status::from(i32::from(Status::Active)), Status::Active);
        assert_eq!(Status::from(0), Status::Inactive);
        assert_eq!(Status::from(7), Status::Inactive);
    }
}
