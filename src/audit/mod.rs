// ==========================================
// 库存台账系统 - 审计记录模块
// ==========================================
// 职责: 变更操作的事后审计留痕
// 红线: 审计写入失败降级为 warn, 不回滚主操作
// ==========================================

use crate::domain::audit_log::NewAuditLog;
use crate::repository::error::RepositoryResult;
use crate::repository::AuditLogRepository;
use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 审计记录出口
///
/// 调用方在事务提交之后调用 `record`; 实现方自行决定持久化方式。
pub trait AuditRecorder: Send + Sync {
    fn record(
        &self,
        actor_id: Option<i64>,
        action: &str,
        entity_type: &str,
        entity_id: i64,
        details: Option<String>,
        origin: &str,
    ) -> RepositoryResult<()>;
}

/// SQLite 审计记录器（写入 audit_log 表）
pub struct SqliteAuditRecorder {
    repo: AuditLogRepository,
}

impl SqliteAuditRecorder {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            repo: AuditLogRepository::new(conn),
        }
    }
}

impl AuditRecorder for SqliteAuditRecorder {
    fn record(
        &self,
        actor_id: Option<i64>,
        action: &str,
        entity_type: &str,
        entity_id: i64,
        details: Option<String>,
        origin: &str,
    ) -> RepositoryResult<()> {
        let entry = NewAuditLog {
            user_id: actor_id,
            user_email: None,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details,
            origin: Some(origin.to_string()),
        };
        self.repo.insert(&entry, Utc::now())?;
        Ok(())
    }
}

/// 审计降级写入: 失败只记 warn, 不向上传播
pub fn record_best_effort(
    recorder: &dyn AuditRecorder,
    actor_id: Option<i64>,
    action: &str,
    entity_type: &str,
    entity_id: i64,
    details: Option<String>,
    origin: &str,
) {
    if let Err(e) = recorder.record(actor_id, action, entity_type, entity_id, details, origin) {
        warn!(
            action = action,
            entity_type = entity_type,
            entity_id,
            error = %e,
            "审计写入失败, 已降级跳过"
        );
    }
}
