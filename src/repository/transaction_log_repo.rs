// ==========================================
// 库存台账系统 - 库存流水仓储
// ==========================================
// 红线: 只追加 + 条件查询; 不暴露 UPDATE / DELETE
// ==========================================

use crate::domain::stock_transaction::{NewStockTransaction, StockTransaction, TransactionQuery};
use crate::domain::types::MovementKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex};

const TRANSACTION_COLUMNS: &str = "id, sku, product_name, kind, quantity, \
     previous_quantity, new_quantity, transaction_at, performed_by, notes";

pub struct TransactionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(crate) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<StockTransaction> {
        let kind_raw: String = row.get(3)?;
        let kind = MovementKind::from_str(&kind_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("无效的流水类型: {}", kind_raw).into(),
            )
        })?;

        Ok(StockTransaction {
            id: row.get(0)?,
            sku: row.get(1)?,
            product_name: row.get(2)?,
            kind,
            quantity: row.get(4)?,
            previous_quantity: row.get(5)?,
            new_quantity: row.get(6)?,
            transaction_at: row.get(7)?,
            performed_by: row.get(8)?,
            notes: row.get(9)?,
        })
    }

    /// 追加一条流水（调用方已完成业务校验, 且与数量写入同事务）
    pub fn append_with(conn: &Connection, entry: &NewStockTransaction) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO stock_transactions (
                sku, product_name, kind, quantity,
                previous_quantity, new_quantity, transaction_at,
                performed_by, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.sku,
                entry.product_name,
                entry.kind.as_str(),
                entry.quantity,
                entry.previous_quantity,
                entry.new_quantity,
                entry.transaction_at,
                entry.performed_by,
                entry.notes,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// 按 SKU 查询流水（新在前）
    pub fn list_by_sku(&self, sku: &str) -> RepositoryResult<Vec<StockTransaction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stock_transactions WHERE sku = ?1 \
             ORDER BY transaction_at DESC, id DESC",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![sku], Self::map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// 条件查询流水（过滤条件全部可选, 新在前）
    ///
    /// # 参数
    /// - `query.sku`: 精确匹配
    /// - `query.name_substring`: 商品名模糊匹配
    /// - `query.kind`: 流水类型
    /// - `query.from` / `query.to`: 时间区间（闭区间）
    pub fn search(&self, query: &TransactionQuery) -> RepositoryResult<Vec<StockTransaction>> {
        let conn = self.get_conn()?;

        let mut sql = format!(
            "SELECT {} FROM stock_transactions WHERE 1=1",
            TRANSACTION_COLUMNS
        );
        let mut bind_values: Vec<String> = Vec::new();

        if let Some(ref sku) = query.sku {
            sql.push_str(&format!(" AND sku = ?{}", bind_values.len() + 1));
            bind_values.push(sku.clone());
        }
        if let Some(ref name) = query.name_substring {
            sql.push_str(&format!(" AND product_name LIKE ?{}", bind_values.len() + 1));
            bind_values.push(format!("%{}%", name));
        }
        if let Some(kind) = query.kind {
            sql.push_str(&format!(" AND kind = ?{}", bind_values.len() + 1));
            bind_values.push(kind.as_str().to_string());
        }
        if let Some(from) = query.from {
            sql.push_str(&format!(" AND transaction_at >= ?{}", bind_values.len() + 1));
            bind_values.push(from.to_rfc3339());
        }
        if let Some(to) = query.to {
            sql.push_str(&format!(" AND transaction_at <= ?{}", bind_values.len() + 1));
            bind_values.push(to.to_rfc3339());
        }

        sql.push_str(" ORDER BY transaction_at DESC, id DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind_values.iter()), Self::map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// 流水总数（测试/巡检用）
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM stock_transactions", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}
