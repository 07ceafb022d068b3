// ==========================================
// 库存台账系统 - 低库存预警仓储
// ==========================================
// 红线: 每个 SKU 至多一条未解除预警
// (唯一索引 idx_low_stock_alerts_open_sku 兜底)
// ==========================================

use crate::domain::alert::{LowStockAlert, NewLowStockAlert};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const ALERT_COLUMNS: &str = "id, sku, product_name, current_quantity, threshold, \
     alert_sent_at, is_resolved, resolved_at, email_recipients";

pub struct AlertRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AlertRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(crate) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<LowStockAlert> {
        Ok(LowStockAlert {
            id: row.get(0)?,
            sku: row.get(1)?,
            product_name: row.get(2)?,
            current_quantity: row.get(3)?,
            threshold: row.get(4)?,
            alert_sent_at: row.get(5)?,
            is_resolved: row.get(6)?,
            resolved_at: row.get(7)?,
            email_recipients: row.get(8)?,
        })
    }

    // ==========================================
    // 事务内组合用的静态方法（与商品写入同事务）
    // ==========================================

    /// 创建新预警, 返回完整记录
    pub fn insert_with(
        conn: &Connection,
        alert: &NewLowStockAlert,
    ) -> RepositoryResult<LowStockAlert> {
        conn.execute(
            r#"
            INSERT INTO low_stock_alerts (
                sku, product_name, current_quantity, threshold,
                alert_sent_at, is_resolved, email_recipients
            ) VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
            params![
                alert.sku,
                alert.product_name,
                alert.current_quantity,
                alert.threshold,
                alert.alert_sent_at,
                alert.email_recipients,
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(LowStockAlert {
            id,
            sku: alert.sku.clone(),
            product_name: alert.product_name.clone(),
            current_quantity: alert.current_quantity,
            threshold: alert.threshold,
            alert_sent_at: alert.alert_sent_at,
            is_resolved: false,
            resolved_at: None,
            email_recipients: alert.email_recipients.clone(),
        })
    }

    /// 查找某 SKU 的未解除预警
    pub fn find_open_by_sku_with(
        conn: &Connection,
        sku: &str,
    ) -> RepositoryResult<Option<LowStockAlert>> {
        let sql = format!(
            "SELECT {} FROM low_stock_alerts WHERE sku = ?1 AND is_resolved = 0",
            ALERT_COLUMNS
        );
        let alert = conn
            .query_row(&sql, params![sku], Self::map_row)
            .optional()?;
        Ok(alert)
    }

    /// 就地刷新未解除预警的读数（数量/阈值变化但仍低于阈值时）
    pub fn update_reading_with(
        conn: &Connection,
        alert_id: i64,
        current_quantity: i64,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE low_stock_alerts
               SET current_quantity = ?, threshold = ?, alert_sent_at = ?
             WHERE id = ? AND is_resolved = 0
            "#,
            params![current_quantity, threshold, now, alert_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "低库存预警".to_string(),
                id: alert_id.to_string(),
            });
        }
        Ok(())
    }

    /// 解除预警
    pub fn resolve_with(
        conn: &Connection,
        alert_id: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE low_stock_alerts
               SET is_resolved = 1, resolved_at = ?
             WHERE id = ? AND is_resolved = 0
            "#,
            params![now, alert_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "低库存预警".to_string(),
                id: alert_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 实例查询方法
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<LowStockAlert>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM low_stock_alerts WHERE id = ?1", ALERT_COLUMNS);
        let alert = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(alert)
    }

    pub fn find_open_by_sku(&self, sku: &str) -> RepositoryResult<Option<LowStockAlert>> {
        let conn = self.get_conn()?;
        Self::find_open_by_sku_with(&conn, sku)
    }

    /// 所有未解除预警（新在前）
    pub fn list_open(&self) -> RepositoryResult<Vec<LowStockAlert>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM low_stock_alerts WHERE is_resolved = 0 \
             ORDER BY alert_sent_at DESC, id DESC",
            ALERT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// 未解除预警总数
    pub fn count_open(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM low_stock_alerts WHERE is_resolved = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 指定时刻之后创建且未解除的预警数（日报用）
    pub fn count_open_since(&self, since: DateTime<Utc>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM low_stock_alerts \
             WHERE is_resolved = 0 AND alert_sent_at >= ?1",
            params![since],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 最近 N 条未解除预警
    pub fn recent_open(&self, limit: i64) -> RepositoryResult<Vec<LowStockAlert>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM low_stock_alerts WHERE is_resolved = 0 \
             ORDER BY alert_sent_at DESC, id DESC LIMIT ?1",
            ALERT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], Self::map_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// 手工解除预警（独立事务）
    pub fn resolve(&self, alert_id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::resolve_with(&conn, alert_id, now)
    }
}
