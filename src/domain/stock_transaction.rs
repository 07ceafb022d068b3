// ==========================================
// 库存台账系统 - 库存流水领域模型
// ==========================================
// 红线: 流水一经写入不可修改; 每次成功变更恰好一条
// 商品名在写入时冗余快照, 历史不随改名丢失
// ==========================================

use crate::domain::types::MovementKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// StockTransaction - 库存流水
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: i64,
    pub sku: String,
    pub product_name: String, // 写入时快照
    pub kind: MovementKind,
    pub quantity: i64,          // 变更量（绝对值）
    pub previous_quantity: i64, // 变更前现存量
    pub new_quantity: i64,      // 变更后现存量
    pub transaction_at: DateTime<Utc>,
    pub performed_by: Option<i64>,
    pub notes: Option<String>,
}

/// 待追加的流水记录（id 由数据库分配）
#[derive(Debug, Clone)]
pub struct NewStockTransaction {
    pub sku: String,
    pub product_name: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub transaction_at: DateTime<Utc>,
    pub performed_by: Option<i64>,
    pub notes: Option<String>,
}

// ==========================================
// TransactionQuery - 流水查询条件
// ==========================================
/// 流水查询过滤条件（全部可选, 组合生效）
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub sku: Option<String>,
    pub name_substring: Option<String>,
    pub kind: Option<MovementKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
