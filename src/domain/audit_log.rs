// ==========================================
// 库存台账系统 - 审计日志领域模型
// ==========================================
// 每次变更操作之后记录; 写入失败不影响主操作
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub action: String,      // 例如 CREATE_PRODUCT / STOCK_OUT / RESTORE_USER
    pub entity_type: String, // PRODUCT / USER
    pub entity_id: i64,
    pub details: Option<String>, // JSON 文本
    pub origin: Option<String>,  // 来源: request / scheduler / system
    pub created_at: DateTime<Utc>,
}

/// 待写入的审计记录
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: Option<String>,
    pub origin: Option<String>,
}
