// ==========================================
// 库存台账系统 - 审计日志仓储
// ==========================================
// 只追加; 写入失败由调用方降级为 warn, 不影响主操作
// ==========================================

use crate::domain::audit_log::{AuditLog, NewAuditLog};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const AUDIT_COLUMNS: &str =
    "id, user_id, user_email, action, entity_type, entity_id, details, origin, created_at";

pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(crate) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<AuditLog> {
        Ok(AuditLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            user_email: row.get(2)?,
            action: row.get(3)?,
            entity_type: row.get(4)?,
            entity_id: row.get(5)?,
            details: row.get(6)?,
            origin: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn insert(&self, entry: &NewAuditLog, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO audit_log (
                user_id, user_email, action, entity_type,
                entity_id, details, origin, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.user_id,
                entry.user_email,
                entry.action,
                entry.entity_type,
                entry.entity_id,
                entry.details,
                entry.origin,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 最近 N 条审计记录（新在前）
    pub fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<AuditLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1",
            AUDIT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], Self::map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// 某实体的审计轨迹（新在前）
    pub fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> RepositoryResult<Vec<AuditLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 \
             ORDER BY created_at DESC, id DESC",
            AUDIT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![entity_type, entity_id], Self::map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
