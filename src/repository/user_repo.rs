// ==========================================
// 库存台账系统 - 用户仓储
// ==========================================
// 职责: 用户 CRUD + 生命周期标记 + 管理员收件人口径
// 红线: MASTER_ADMIN 不进入清理候选集
// ==========================================

use crate::domain::types::{LifecycleState, Role, UserStatus};
use crate::domain::user::{NewUser, User};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const USER_COLUMNS: &str = "id, email, first_name, last_name, role, status, \
     lifecycle_state, deleted_at, created_at, updated_at";

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(crate) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let role_raw: String = row.get(4)?;
        let role = Role::from_str(&role_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("无效的角色: {}", role_raw).into(),
            )
        })?;
        let status_raw: String = row.get(5)?;
        let status = UserStatus::from_str(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("无效的用户状态: {}", status_raw).into(),
            )
        })?;
        let state_raw: String = row.get(6)?;
        let lifecycle_state = LifecycleState::from_str(&state_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("无效的生命周期状态: {}", state_raw).into(),
            )
        })?;

        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            role,
            status,
            lifecycle_state,
            deleted_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn insert(&self, req: &NewUser, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO users (
                email, first_name, last_name, role, status,
                lifecycle_state, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 'ACTIVE', 'ACTIVE', ?, ?)
            "#,
            params![req.email, req.first_name, req.last_name, req.role.as_str(), now, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(user)
    }

    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![email], Self::map_row)
            .optional()?;
        Ok(user)
    }

    /// 预警收件人口径: 生命周期 ACTIVE 且状态 ACTIVE 的管理员邮箱
    pub fn active_admin_emails(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT email FROM users \
             WHERE lifecycle_state = 'ACTIVE' AND status = 'ACTIVE' \
               AND role IN ('ADMIN', 'MASTER_ADMIN') \
             ORDER BY email",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut emails = Vec::new();
        for row in rows {
            emails.push(row?);
        }
        Ok(emails)
    }

    pub fn list_active(&self) -> RepositoryResult<Vec<User>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE lifecycle_state = 'ACTIVE' ORDER BY email",
            USER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn list_deleted(&self) -> RepositoryResult<Vec<User>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE lifecycle_state = 'SOFT_DELETED' \
             ORDER BY deleted_at DESC",
            USER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// 软删除: 同时停用账号（status 置 INACTIVE）
    pub fn mark_soft_deleted(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE users
               SET lifecycle_state = 'SOFT_DELETED', status = 'INACTIVE',
                   deleted_at = ?, updated_at = ?
             WHERE id = ? AND lifecycle_state = 'ACTIVE'
            "#,
            params![now, now, id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "用户".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 恢复: 重新启用账号（status 置回 ACTIVE）
    pub fn mark_restored(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE users
               SET lifecycle_state = 'ACTIVE', status = 'ACTIVE',
                   deleted_at = NULL, updated_at = ?
             WHERE id = ? AND lifecycle_state = 'SOFT_DELETED'
            "#,
            params![now, id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "用户".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_hard(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "用户".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 软删除已超过保留期的用户（清理候选集, MASTER_ADMIN 除外）
    pub fn list_expired_soft_deleted(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<User>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM users \
             WHERE lifecycle_state = 'SOFT_DELETED' AND deleted_at < ?1 \
               AND role != 'MASTER_ADMIN' \
             ORDER BY deleted_at ASC",
            USER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff], Self::map_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}
