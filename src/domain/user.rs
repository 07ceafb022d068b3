// ==========================================
// 库存台账系统 - 用户领域模型
// ==========================================
// 本系统只关心用户的生命周期与预警收件人口径;
// 认证/口令等在外围系统处理
// ==========================================

use crate::domain::types::{LifecycleState, Role, UserStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// User - 用户
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub lifecycle_state: LifecycleState,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.lifecycle_state == LifecycleState::SoftDeleted
    }

    /// 展示名: "名 姓 (email)"
    pub fn description(&self) -> String {
        format!("{} {} ({})", self.first_name, self.last_name, self.email)
    }
}

/// 新建用户输入
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}
