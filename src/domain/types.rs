// ==========================================
// 库存台账系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 库存流水类型 (Movement Kind)
// ==========================================
// 红线: 流水只追加,不修改不删除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    StockIn,    // 入库
    StockOut,   // 出库
    Adjustment, // 盘点调整
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::StockIn => "STOCK_IN",
            MovementKind::StockOut => "STOCK_OUT",
            MovementKind::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STOCK_IN" => Some(MovementKind::StockIn),
            "STOCK_OUT" => Some(MovementKind::StockOut),
            "ADJUSTMENT" => Some(MovementKind::Adjustment),
            _ => None,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 生命周期状态 (Lifecycle State)
// ==========================================
// 状态机: ACTIVE -> SOFT_DELETED -> (purged, 物理删除)
// 回边: SOFT_DELETED -> ACTIVE (恢复, 仅在宽限期内)
// 显式三态建模, 不用布尔标记 + 散落的日期判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Active,      // 正常
    SoftDeleted, // 软删除(可恢复)
    Purged,      // 已清除(终态, 数据库中行已不存在)
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "ACTIVE",
            LifecycleState::SoftDeleted => "SOFT_DELETED",
            LifecycleState::Purged => "PURGED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(LifecycleState::Active),
            "SOFT_DELETED" => Some(LifecycleState::SoftDeleted),
            "PURGED" => Some(LifecycleState::Purged),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 用户角色 (Role)
// ==========================================
// MASTER_ADMIN 豁免删除与清除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    MasterAdmin,
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::MasterAdmin => "MASTER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Employee => "EMPLOYEE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MASTER_ADMIN" => Some(Role::MasterAdmin),
            "ADMIN" => Some(Role::Admin),
            "EMPLOYEE" => Some(Role::Employee),
            _ => None,
        }
    }

    /// 是否豁免删除/清除
    pub fn is_delete_exempt(&self) -> bool {
        matches!(self, Role::MasterAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 用户状态 (User Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(UserStatus::Active),
            "INACTIVE" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
