// ==========================================
// 库存台账系统 - 库存台账引擎
// ==========================================
// 职责: 商品建档、出入库、盘点调整、阈值维护与台账查询
// 红线:
// - 每次成功的数量变更恰好追加一条流水, 同事务
// - 出库不足额拒绝, 不做部分出库
// - 预警评估与库存变更同事务, 通知在提交之后
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::audit::{record_best_effort, AuditRecorder};
use crate::config::ConfigManager;
use crate::domain::alert::LowStockAlert;
use crate::domain::product::{NewProduct, Product};
use crate::domain::stock_transaction::{NewStockTransaction, StockTransaction, TransactionQuery};
use crate::domain::types::MovementKind;
use crate::engine::alert::{AlertEngine, AlertTransition};
use crate::engine::sku::SkuGenerator;
use crate::repository::error::RepositoryError;
use crate::repository::{ProductRepository, TransactionLogRepository, UserRepository};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 库存汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_products: i64,
    pub total_quantity: i64,
    pub total_value: f64,
    pub low_stock_count: i64,
}

// ==========================================
// StockLedger - 库存台账引擎
// ==========================================
pub struct StockLedger {
    conn: Arc<Mutex<Connection>>,
    products: ProductRepository,
    transactions: TransactionLogRepository,
    users: UserRepository,
    alerts: Arc<AlertEngine>,
    config: Arc<ConfigManager>,
    audit: Arc<dyn AuditRecorder>,
}

impl StockLedger {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        config: Arc<ConfigManager>,
        alerts: Arc<AlertEngine>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            products: ProductRepository::new(conn.clone()),
            transactions: TransactionLogRepository::new(conn.clone()),
            users: UserRepository::new(conn.clone()),
            conn,
            alerts,
            config,
            audit,
        }
    }

    fn get_conn(&self) -> ApiResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::Database(format!("数据库锁获取失败: {}", e)))
    }

    fn config_err(e: Box<dyn std::error::Error>) -> ApiError {
        ApiError::Config(e.to_string())
    }

    fn default_threshold(&self) -> ApiResult<i64> {
        self.config
            .get_low_stock_default_threshold()
            .map_err(Self::config_err)
    }

    fn sku_generator(&self) -> ApiResult<SkuGenerator> {
        let prefix = self.config.get_sku_prefix().map_err(Self::config_err)?;
        let width = self
            .config
            .get_sku_number_width()
            .map_err(Self::config_err)?;
        Ok(SkuGenerator::new(prefix, width))
    }

    // ==========================================
    // 建档
    // ==========================================

    /// 商品建档
    ///
    /// SKU 分配、商品插入、初始流水与预警评估在同一事务内完成。
    ///
    /// # 参数
    /// - req: 建档请求
    /// - actor: 操作人(可空, 调度作业为空)
    pub fn create_product(&self, req: &NewProduct, actor: Option<i64>) -> ApiResult<Product> {
        if req.product_name.trim().is_empty() {
            return Err(ApiError::Validation("商品名称不能为空".to_string()));
        }
        if !(req.unit_price > 0.0) {
            return Err(ApiError::Validation(format!(
                "单价必须大于 0, 实际 {}",
                req.unit_price
            )));
        }
        if req.quantity < 0 {
            return Err(ApiError::Validation(format!(
                "初始库存不能为负, 实际 {}",
                req.quantity
            )));
        }
        if let Some(threshold) = req.min_stock_threshold {
            if threshold < 0 {
                return Err(ApiError::Validation(format!(
                    "库存阈值不能为负, 实际 {}",
                    threshold
                )));
            }
        }

        let generator = self.sku_generator()?;
        let now = Utc::now();

        let (product, transition) = {
            let mut conn = self.get_conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| ApiError::Database(format!("事务开启失败: {}", e)))?;

            if ProductRepository::active_name_exists_with(&tx, req.product_name.trim())? {
                return Err(ApiError::Validation(format!(
                    "已存在同名未删除商品: {}",
                    req.product_name.trim()
                )));
            }

            let sku = generator.next_sku_with(&tx)?;
            let id = ProductRepository::insert_with(&tx, &sku, req, actor, now)?;

            // 初始库存入账为一条 STOCK_IN 流水
            // 零库存建档同样记账(before=0, after=0): 每次成功建档恰好一条
            TransactionLogRepository::append_with(
                &tx,
                &NewStockTransaction {
                    sku: sku.clone(),
                    product_name: req.product_name.clone(),
                    kind: MovementKind::StockIn,
                    quantity: req.quantity,
                    previous_quantity: 0,
                    new_quantity: req.quantity,
                    transaction_at: now,
                    performed_by: actor,
                    notes: Some("商品建档初始库存".to_string()),
                },
            )?;

            let product = ProductRepository::find_by_id_with(&tx, id)?.ok_or(
                RepositoryError::NotFound {
                    entity: "商品".to_string(),
                    id: id.to_string(),
                },
            )?;
            let transition = self.alerts.evaluate_in_tx(&tx, &product)?;

            tx.commit()
                .map_err(|e| ApiError::Database(format!("事务提交失败: {}", e)))?;
            (product, transition)
        };

        self.alerts.dispatch(&transition);
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "CREATE_PRODUCT",
            "PRODUCT",
            product.id,
            Some(
                json!({
                    "sku": product.sku,
                    "product_name": product.product_name,
                    "quantity": product.quantity,
                })
                .to_string(),
            ),
            "request",
        );

        info!(sku = %product.sku, quantity = product.quantity, "商品建档完成");
        Ok(product)
    }

    // ==========================================
    // 数量变更
    // ==========================================

    /// 入库
    pub fn stock_in(
        &self,
        sku: &str,
        amount: i64,
        actor: Option<i64>,
        notes: Option<String>,
    ) -> ApiResult<Product> {
        if amount <= 0 {
            return Err(ApiError::Validation(format!(
                "入库数量必须为正, 实际 {}",
                amount
            )));
        }
        self.apply_movement(sku, MovementKind::StockIn, amount, actor, notes, |prev| {
            Ok(prev + amount)
        })
    }

    /// 出库（不足额直接拒绝, 不做部分出库）
    pub fn stock_out(
        &self,
        sku: &str,
        amount: i64,
        actor: Option<i64>,
        notes: Option<String>,
    ) -> ApiResult<Product> {
        if amount <= 0 {
            return Err(ApiError::Validation(format!(
                "出库数量必须为正, 实际 {}",
                amount
            )));
        }
        self.apply_movement(sku, MovementKind::StockOut, amount, actor, notes, |prev| {
            if amount > prev {
                Err(InsufficientAmount {
                    available: prev,
                    requested: amount,
                })
            } else {
                Ok(prev - amount)
            }
        })
    }

    /// 盘点调整: 把现存量直接校正为盘点值
    pub fn adjust_stock(
        &self,
        sku: &str,
        counted_quantity: i64,
        actor: Option<i64>,
        notes: Option<String>,
    ) -> ApiResult<Product> {
        if counted_quantity < 0 {
            return Err(ApiError::Validation(format!(
                "盘点值不能为负, 实际 {}",
                counted_quantity
            )));
        }
        self.apply_movement(
            sku,
            MovementKind::Adjustment,
            counted_quantity,
            actor,
            notes,
            |_prev| Ok(counted_quantity),
        )
    }

    /// 数量变更的公共路径: 校验、改数、记流水、评估预警, 全部同事务
    fn apply_movement(
        &self,
        sku: &str,
        kind: MovementKind,
        amount: i64,
        actor: Option<i64>,
        notes: Option<String>,
        compute_new: impl Fn(i64) -> Result<i64, InsufficientAmount>,
    ) -> ApiResult<Product> {
        let now = Utc::now();

        let (product, transition) = {
            let mut conn = self.get_conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| ApiError::Database(format!("事务开启失败: {}", e)))?;

            let before = ProductRepository::find_active_by_sku_with(&tx, sku)?
                .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在或已删除", sku)))?;

            let new_quantity = compute_new(before.quantity).map_err(|e| {
                ApiError::InsufficientStock {
                    product_name: before.product_name.clone(),
                    available: e.available,
                    requested: e.requested,
                }
            })?;

            ProductRepository::update_quantity_with(&tx, before.id, new_quantity, actor, now)?;

            // 流水中的变更量统一记绝对值
            let movement_amount = match kind {
                MovementKind::Adjustment => (new_quantity - before.quantity).abs(),
                _ => amount,
            };
            TransactionLogRepository::append_with(
                &tx,
                &NewStockTransaction {
                    sku: before.sku.clone(),
                    product_name: before.product_name.clone(),
                    kind,
                    quantity: movement_amount,
                    previous_quantity: before.quantity,
                    new_quantity,
                    transaction_at: now,
                    performed_by: actor,
                    notes,
                },
            )?;

            let after = ProductRepository::find_by_id_with(&tx, before.id)?.ok_or(
                RepositoryError::NotFound {
                    entity: "商品".to_string(),
                    id: before.id.to_string(),
                },
            )?;
            let transition = self.alerts.evaluate_in_tx(&tx, &after)?;

            tx.commit()
                .map_err(|e| ApiError::Database(format!("事务提交失败: {}", e)))?;
            (after, transition)
        };

        self.alerts.dispatch(&transition);
        record_best_effort(
            self.audit.as_ref(),
            actor,
            kind.as_str(),
            "PRODUCT",
            product.id,
            Some(
                json!({
                    "sku": product.sku,
                    "amount": amount,
                    "new_quantity": product.quantity,
                })
                .to_string(),
            ),
            "request",
        );

        info!(sku = %product.sku, kind = %kind, new_quantity = product.quantity, "库存变更完成");
        Ok(product)
    }

    // ==========================================
    // 阈值维护
    // ==========================================

    /// 更新商品阈值
    ///
    /// 阈值变更告知与预警评估相互独立: 无论评估结果如何,
    /// 变更告知都发送一次。
    pub fn update_threshold(
        &self,
        sku: &str,
        new_threshold: i64,
        actor: Option<i64>,
    ) -> ApiResult<Product> {
        if new_threshold < 0 {
            return Err(ApiError::Validation(format!(
                "库存阈值不能为负, 实际 {}",
                new_threshold
            )));
        }
        let now = Utc::now();

        let (product, old_threshold, transition) = {
            let mut conn = self.get_conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| ApiError::Database(format!("事务开启失败: {}", e)))?;

            let before = ProductRepository::find_active_by_sku_with(&tx, sku)?
                .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在或已删除", sku)))?;
            let old_threshold = before.min_stock_threshold;

            ProductRepository::update_threshold_with(&tx, before.id, new_threshold, actor, now)?;

            let after = ProductRepository::find_by_id_with(&tx, before.id)?.ok_or(
                RepositoryError::NotFound {
                    entity: "商品".to_string(),
                    id: before.id.to_string(),
                },
            )?;
            let transition = self.alerts.evaluate_in_tx(&tx, &after)?;

            tx.commit()
                .map_err(|e| ApiError::Database(format!("事务提交失败: {}", e)))?;
            (after, old_threshold, transition)
        };

        let actor_description = match actor {
            Some(id) => self.users.find_by_id(id)?.map(|u| u.description()),
            None => None,
        };
        self.alerts
            .notify_threshold_change(&product, old_threshold, new_threshold, actor_description)?;
        self.alerts.dispatch(&transition);
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "UPDATE_THRESHOLD",
            "PRODUCT",
            product.id,
            Some(
                json!({
                    "sku": product.sku,
                    "old_threshold": old_threshold,
                    "new_threshold": new_threshold,
                })
                .to_string(),
            ),
            "request",
        );

        info!(sku = %product.sku, new_threshold, "阈值更新完成");
        Ok(product)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_by_sku(&self, sku: &str) -> ApiResult<Product> {
        self.products
            .find_by_sku(sku)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在", sku)))
    }

    pub fn list_active(&self) -> ApiResult<Vec<Product>> {
        Ok(self.products.list_active()?)
    }

    pub fn list_deleted(&self) -> ApiResult<Vec<Product>> {
        Ok(self.products.list_deleted()?)
    }

    /// 名称/SKU 模糊检索
    pub fn search(&self, term: &str) -> ApiResult<Vec<Product>> {
        Ok(self.products.search(term.trim())?)
    }

    /// 低库存商品列表
    pub fn list_low_stock(&self) -> ApiResult<Vec<Product>> {
        let default = self.default_threshold()?;
        Ok(self.products.list_low_stock(default)?)
    }

    /// 某商品的流水（新在前）
    pub fn transactions_for(&self, sku: &str) -> ApiResult<Vec<StockTransaction>> {
        Ok(self.transactions.list_by_sku(sku)?)
    }

    /// 条件查询流水
    pub fn search_transactions(
        &self,
        query: &TransactionQuery,
    ) -> ApiResult<Vec<StockTransaction>> {
        Ok(self.transactions.search(query)?)
    }

    /// 库存汇总
    pub fn inventory_summary(&self) -> ApiResult<InventorySummary> {
        let default = self.default_threshold()?;
        let (total_products, total_quantity, total_value, low_stock_count) =
            self.products.summary(default)?;
        Ok(InventorySummary {
            total_products,
            total_quantity,
            total_value,
            low_stock_count,
        })
    }

    /// 未解除预警（查询直通预警引擎）
    pub fn active_alerts(&self) -> ApiResult<Vec<LowStockAlert>> {
        Ok(self.alerts.active_alerts()?)
    }

    /// 操作人展示名（审计/界面用）
    pub fn actor_description(&self, user_id: i64) -> ApiResult<Option<String>> {
        Ok(self.users.find_by_id(user_id)?.map(|u| u.description()))
    }
}

/// 出库不足额（内部错误载体, 转换为 ApiError::InsufficientStock）
struct InsufficientAmount {
    available: i64,
    requested: i64,
}
