// ==========================================
// 库存台账系统 - 商品仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 并发: 所有写路径经由共享连接互斥锁串行化
// ==========================================

use crate::domain::product::{NewProduct, Product};
use crate::domain::types::LifecycleState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 商品表查询列（与 map_row 的列序一一对应）
const PRODUCT_COLUMNS: &str = "id, sku, product_name, category, supplier, unit_price, \
     quantity, min_stock_threshold, lifecycle_state, deleted_at, \
     created_at, updated_at, created_by, last_updated_by";

pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(crate) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Product> {
        let state_raw: String = row.get(8)?;
        let lifecycle_state = LifecycleState::from_str(&state_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("无效的生命周期状态: {}", state_raw).into(),
            )
        })?;

        Ok(Product {
            id: row.get(0)?,
            sku: row.get(1)?,
            product_name: row.get(2)?,
            category: row.get(3)?,
            supplier: row.get(4)?,
            unit_price: row.get(5)?,
            quantity: row.get(6)?,
            min_stock_threshold: row.get(7)?,
            lifecycle_state,
            deleted_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            created_by: row.get(12)?,
            last_updated_by: row.get(13)?,
        })
    }

    // ==========================================
    // 事务内关联函数（由台账引擎在同一事务中调用）
    // ==========================================

    /// 插入商品（SKU 已由调用方在同一事务内分配）
    ///
    /// # 返回
    /// - Ok(id): 新商品主键
    pub fn insert_with(
        conn: &Connection,
        sku: &str,
        req: &NewProduct,
        actor: Option<i64>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO products (
                sku, product_name, category, supplier, unit_price,
                quantity, min_stock_threshold, lifecycle_state,
                created_at, updated_at, created_by, last_updated_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'ACTIVE', ?, ?, ?, ?)
            "#,
            params![
                sku,
                req.product_name,
                req.category,
                req.supplier,
                req.unit_price,
                req.quantity,
                req.min_stock_threshold,
                now,
                now,
                actor,
                actor,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id_with(conn: &Connection, id: i64) -> RepositoryResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = conn
            .query_row(&sql, params![id], Self::map_row)
            .optional()?;
        Ok(product)
    }

    pub fn find_by_sku_with(conn: &Connection, sku: &str) -> RepositoryResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS);
        let product = conn
            .query_row(&sql, params![sku], Self::map_row)
            .optional()?;
        Ok(product)
    }

    /// 按 SKU 查询未删除商品
    pub fn find_active_by_sku_with(
        conn: &Connection,
        sku: &str,
    ) -> RepositoryResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE sku = ?1 AND lifecycle_state = 'ACTIVE'",
            PRODUCT_COLUMNS
        );
        let product = conn
            .query_row(&sql, params![sku], Self::map_row)
            .optional()?;
        Ok(product)
    }

    /// 是否已存在同名的未删除商品（建档查重）
    pub fn active_name_exists_with(conn: &Connection, name: &str) -> RepositoryResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM products WHERE lifecycle_state = 'ACTIVE' AND product_name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 取指定前缀下序号最大的 SKU（序号分配依据）
    ///
    /// 先按长度再按字典序取最大值, 序号超出零填充位宽后依然正确。
    /// 必须与商品插入处于同一事务, 否则并发建档会分到重复序号。
    pub fn find_last_sku_with(conn: &Connection, prefix: &str) -> RepositoryResult<Option<String>> {
        let pattern = format!("{}%", prefix);
        let sku = conn
            .query_row(
                "SELECT sku FROM products WHERE sku LIKE ?1 \
                 ORDER BY LENGTH(sku) DESC, sku DESC LIMIT 1",
                params![pattern],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(sku)
    }

    pub fn update_quantity_with(
        conn: &Connection,
        id: i64,
        quantity: i64,
        actor: Option<i64>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE products SET quantity = ?1, last_updated_by = ?2, updated_at = ?3 WHERE id = ?4",
            params![quantity, actor, now, id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn update_threshold_with(
        conn: &Connection,
        id: i64,
        threshold: i64,
        actor: Option<i64>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE products SET min_stock_threshold = ?1, last_updated_by = ?2, updated_at = ?3 WHERE id = ?4",
            params![threshold, actor, now, id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, id)
    }

    pub fn find_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_by_sku_with(&conn, sku)
    }

    pub fn find_active_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_active_by_sku_with(&conn, sku)
    }

    /// 未删除商品列表（按 SKU 排序）
    pub fn list_active(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM products WHERE lifecycle_state = 'ACTIVE' ORDER BY sku",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// 软删除商品列表（按删除时间倒序）
    pub fn list_deleted(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM products WHERE lifecycle_state = 'SOFT_DELETED' ORDER BY deleted_at DESC",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// 未删除商品的 SKU 列表（对账扫描用, 避免持有过期快照）
    pub fn active_skus(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT sku FROM products WHERE lifecycle_state = 'ACTIVE' ORDER BY sku")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut skus = Vec::new();
        for row in rows {
            skus.push(row?);
        }
        Ok(skus)
    }

    /// 名称/SKU 模糊检索（仅未删除商品）
    pub fn search(&self, term: &str) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let pattern = format!("%{}%", term);
        let sql = format!(
            "SELECT {} FROM products \
             WHERE lifecycle_state = 'ACTIVE' AND (product_name LIKE ?1 OR sku LIKE ?1) \
             ORDER BY sku",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern], Self::map_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// 低库存商品列表（现存量 < 生效阈值, 按现存量升序）
    pub fn list_low_stock(&self, default_threshold: i64) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM products \
             WHERE lifecycle_state = 'ACTIVE' \
               AND quantity < COALESCE(min_stock_threshold, ?1) \
             ORDER BY quantity ASC",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![default_threshold], Self::map_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// 低库存商品数（日报口径, 只读不变更）
    pub fn count_low_stock(&self, default_threshold: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM products \
             WHERE lifecycle_state = 'ACTIVE' \
               AND quantity < COALESCE(min_stock_threshold, ?1)",
            params![default_threshold],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 库存汇总: (商品数, 总现存量, 总价值, 低库存数)
    pub fn summary(&self, default_threshold: i64) -> RepositoryResult<(i64, i64, f64, i64)> {
        let conn = self.get_conn()?;
        let (total, quantity, value): (i64, i64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(quantity), 0), COALESCE(SUM(quantity * unit_price), 0.0) \
             FROM products WHERE lifecycle_state = 'ACTIVE'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let low_stock: i64 = conn.query_row(
            "SELECT COUNT(*) FROM products \
             WHERE lifecycle_state = 'ACTIVE' \
               AND quantity < COALESCE(min_stock_threshold, ?1)",
            params![default_threshold],
            |row| row.get(0),
        )?;
        Ok((total, quantity, value, low_stock))
    }

    // ==========================================
    // 生命周期写入（由 LifecycleManager 独占调用）
    // ==========================================

    /// 软删除标记（状态谓词兜底: 并发重复删除只有一个成功）
    pub fn mark_soft_deleted(
        &self,
        id: i64,
        now: DateTime<Utc>,
        actor: Option<i64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE products \
             SET lifecycle_state = 'SOFT_DELETED', deleted_at = ?1, \
                 last_updated_by = ?2, updated_at = ?1 \
             WHERE id = ?3 AND lifecycle_state = 'ACTIVE'",
            params![now, actor, id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 恢复标记（仅软删除状态可恢复, 不覆盖并发的重复删除/恢复）
    pub fn mark_restored(
        &self,
        id: i64,
        now: DateTime<Utc>,
        actor: Option<i64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE products \
             SET lifecycle_state = 'ACTIVE', deleted_at = NULL, \
                 last_updated_by = ?1, updated_at = ?2 \
             WHERE id = ?3 AND lifecycle_state = 'SOFT_DELETED'",
            params![actor, now, id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 物理删除（流水历史保留, 不级联）
    pub fn delete_hard(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除时间早于 cutoff 的软删除商品（清除作业候选）
    pub fn list_expired_soft_deleted(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM products \
             WHERE lifecycle_state = 'SOFT_DELETED' AND deleted_at < ?1 \
             ORDER BY deleted_at",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff], Self::map_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }
}
