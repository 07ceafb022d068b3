// ==========================================
// 库存台账系统 - 低库存预警领域模型
// ==========================================
// 红线: 每个 SKU 至多一条未解除预警
// 收件人集合在创建预警时快照, 后续不重算
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// LowStockAlert - 低库存预警
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub id: i64,
    pub sku: String,
    pub product_name: String,
    pub current_quantity: i64, // 触发/更新时的现存量
    pub threshold: i64,        // 触发/更新时的生效阈值
    pub alert_sent_at: DateTime<Utc>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub email_recipients: Option<String>, // 逗号分隔, 创建时快照
}

impl LowStockAlert {
    /// 收件人列表（解析逗号分隔快照）
    pub fn recipients(&self) -> Vec<String> {
        self.email_recipients
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// 待创建的预警（id 由数据库分配, is_resolved 初始为 false）
#[derive(Debug, Clone)]
pub struct NewLowStockAlert {
    pub sku: String,
    pub product_name: String,
    pub current_quantity: i64,
    pub threshold: i64,
    pub alert_sent_at: DateTime<Utc>,
    pub email_recipients: Option<String>,
}

// ==========================================
// AlertSummary - 预警汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total_active: i64,            // 未解除预警总数
    pub created_today: i64,           // 今日新建且未解除数
    pub recent: Vec<LowStockAlert>,   // 最近 5 条未解除预警
}
