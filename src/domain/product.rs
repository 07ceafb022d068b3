// ==========================================
// 库存台账系统 - 商品领域模型
// ==========================================
// 红线: quantity 任何时刻 >= 0; 软删除后拒绝数量变更
// SKU: 固定前缀 + 单调递增零填充序号, 永不复用
// ==========================================

use crate::domain::types::LifecycleState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 商品主数据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    // ===== 主键与标识 =====
    pub id: i64,
    pub sku: String, // 库存单位标识（唯一, 单调分配）

    // ===== 基础信息 =====
    pub product_name: String,
    pub category: String,
    pub supplier: String,
    pub unit_price: f64, // 单价（> 0）

    // ===== 库存 =====
    pub quantity: i64,                    // 现存量（>= 0）
    pub min_stock_threshold: Option<i64>, // 最低库存阈值（空时用全局默认值）

    // ===== 生命周期 =====
    pub lifecycle_state: LifecycleState,
    pub deleted_at: Option<DateTime<Utc>>, // 仅软删除时有值

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub last_updated_by: Option<i64>,
}

impl Product {
    /// 是否处于软删除状态
    pub fn is_deleted(&self) -> bool {
        self.lifecycle_state == LifecycleState::SoftDeleted
    }

    /// 库存总价值（单价 * 现存量）
    pub fn total_value(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }

    /// 生效阈值（商品自身阈值, 空则回退到全局默认值）
    pub fn effective_threshold(&self, default_threshold: i64) -> i64 {
        self.min_stock_threshold.unwrap_or(default_threshold)
    }
}

// ==========================================
// NewProduct - 建档请求
// ==========================================
/// 商品建档输入（SKU 与时间戳由台账引擎分配）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_name: String,
    pub category: String,
    pub supplier: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub min_stock_threshold: Option<i64>,
}
