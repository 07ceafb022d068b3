// ==========================================
// 库存台账系统 - 生命周期管理器
// ==========================================
// 状态机: ACTIVE -> SOFT_DELETED -> (purged)
// 回边: SOFT_DELETED -> ACTIVE (仅在恢复窗口内)
// 红线:
// - MASTER_ADMIN 豁免删除与清除
// - 物理删除保留流水与审计历史
// - 清除窗口不得短于恢复窗口, 违反则清除作业拒绝执行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::audit::{record_best_effort, AuditRecorder};
use crate::config::ConfigManager;
use crate::domain::product::Product;
use crate::domain::user::User;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::repository::{ProductRepository, UserRepository};

/// 一次清除作业的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeReport {
    pub purged_products: u64,
    pub purged_users: u64,
    pub failed: u64,
    pub cancelled: bool,
}

// ==========================================
// LifecycleManager - 生命周期管理器
// ==========================================
pub struct LifecycleManager {
    products: ProductRepository,
    users: UserRepository,
    config: Arc<ConfigManager>,
    audit: Arc<dyn AuditRecorder>,
}

impl LifecycleManager {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        config: Arc<ConfigManager>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            products: ProductRepository::new(conn.clone()),
            users: UserRepository::new(conn),
            config,
            audit,
        }
    }

    fn restore_window_days(&self) -> ApiResult<i64> {
        self.config
            .get_restore_window_days()
            .map_err(|e| ApiError::Config(e.to_string()))
    }

    // ==========================================
    // 商品生命周期
    // ==========================================

    /// 软删除商品
    ///
    /// 预警行保持原样; 流水历史保留。
    pub fn soft_delete_product(&self, sku: &str, actor: Option<i64>) -> ApiResult<Product> {
        let product = self
            .products
            .find_by_sku(sku)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在", sku)))?;
        if product.is_deleted() {
            return Err(ApiError::AlreadyDeleted(format!(
                "商品(sku={})已处于删除状态",
                sku
            )));
        }

        let now = Utc::now();
        self.products.mark_soft_deleted(product.id, now, actor)?;
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "DELETE_PRODUCT",
            "PRODUCT",
            product.id,
            Some(json!({ "sku": product.sku }).to_string()),
            "request",
        );

        info!(sku = %product.sku, "商品已软删除");
        self.products
            .find_by_id(product.id)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在", sku)))
    }

    /// 恢复软删除商品（仅在恢复窗口内）
    pub fn restore_product(&self, sku: &str, actor: Option<i64>) -> ApiResult<Product> {
        let product = self
            .products
            .find_by_sku(sku)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在", sku)))?;
        if !product.is_deleted() {
            return Err(ApiError::NotDeleted(format!(
                "商品(sku={})未处于删除状态",
                sku
            )));
        }

        let deleted_at = product.deleted_at.ok_or_else(|| {
            ApiError::Database(format!("商品(sku={})缺少删除时间", sku))
        })?;
        let window = Duration::days(self.restore_window_days()?);
        if Utc::now() > deleted_at + window {
            return Err(ApiError::Expired(format!(
                "商品(sku={})已超出 {} 天恢复窗口",
                sku,
                window.num_days()
            )));
        }

        let now = Utc::now();
        self.products.mark_restored(product.id, now, actor)?;
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "RESTORE_PRODUCT",
            "PRODUCT",
            product.id,
            Some(json!({ "sku": product.sku }).to_string()),
            "request",
        );

        info!(sku = %product.sku, "商品已恢复");
        self.products
            .find_by_id(product.id)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在", sku)))
    }

    /// 手工物理删除商品（必须先软删除; 流水与审计历史保留）
    pub fn permanent_delete_product(&self, sku: &str, actor: Option<i64>) -> ApiResult<()> {
        let product = self
            .products
            .find_by_sku(sku)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(sku={})不存在", sku)))?;
        if !product.is_deleted() {
            return Err(ApiError::NotDeleted(format!(
                "商品(sku={})未软删除, 拒绝物理删除",
                sku
            )));
        }

        self.products.delete_hard(product.id)?;
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "PURGE_PRODUCT",
            "PRODUCT",
            product.id,
            Some(json!({ "sku": product.sku }).to_string()),
            "request",
        );

        info!(sku = %product.sku, "商品已物理删除");
        Ok(())
    }

    // ==========================================
    // 用户生命周期
    // ==========================================

    /// 软删除用户（同时停用账号, 退出预警收件人名册）
    pub fn soft_delete_user(&self, user_id: i64, actor: Option<i64>) -> ApiResult<User> {
        let user = self
            .users
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("用户(id={})不存在", user_id)))?;

        if actor == Some(user_id) {
            return Err(ApiError::Forbidden("不允许删除自己的账号".to_string()));
        }
        if user.role.is_delete_exempt() {
            return Err(ApiError::Forbidden(format!(
                "{} 角色豁免删除: {}",
                user.role,
                user.description()
            )));
        }
        if user.is_deleted() {
            return Err(ApiError::AlreadyDeleted(format!(
                "用户(id={})已处于删除状态",
                user_id
            )));
        }

        let now = Utc::now();
        self.users.mark_soft_deleted(user_id, now)?;
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "DELETE_USER",
            "USER",
            user_id,
            Some(json!({ "email": user.email }).to_string()),
            "request",
        );

        info!(user_id, "用户已软删除");
        self.users
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("用户(id={})不存在", user_id)))
    }

    /// 恢复软删除用户（仅在恢复窗口内; 账号重新启用）
    pub fn restore_user(&self, user_id: i64, actor: Option<i64>) -> ApiResult<User> {
        let user = self
            .users
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("用户(id={})不存在", user_id)))?;
        if !user.is_deleted() {
            return Err(ApiError::NotDeleted(format!(
                "用户(id={})未处于删除状态",
                user_id
            )));
        }

        let deleted_at = user.deleted_at.ok_or_else(|| {
            ApiError::Database(format!("用户(id={})缺少删除时间", user_id))
        })?;
        let window = Duration::days(self.restore_window_days()?);
        if Utc::now() > deleted_at + window {
            return Err(ApiError::Expired(format!(
                "用户(id={})已超出 {} 天恢复窗口",
                user_id,
                window.num_days()
            )));
        }

        let now = Utc::now();
        self.users.mark_restored(user_id, now)?;
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "RESTORE_USER",
            "USER",
            user_id,
            Some(json!({ "email": user.email }).to_string()),
            "request",
        );

        info!(user_id, "用户已恢复");
        self.users
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("用户(id={})不存在", user_id)))
    }

    /// 手工物理删除用户（必须先软删除; MASTER_ADMIN 豁免）
    pub fn permanent_delete_user(&self, user_id: i64, actor: Option<i64>) -> ApiResult<()> {
        let user = self
            .users
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("用户(id={})不存在", user_id)))?;
        if user.role.is_delete_exempt() {
            return Err(ApiError::Forbidden(format!(
                "{} 角色豁免清除: {}",
                user.role,
                user.description()
            )));
        }
        if !user.is_deleted() {
            return Err(ApiError::NotDeleted(format!(
                "用户(id={})未软删除, 拒绝物理删除",
                user_id
            )));
        }

        self.users.delete_hard(user_id)?;
        record_best_effort(
            self.audit.as_ref(),
            actor,
            "PURGE_USER",
            "USER",
            user_id,
            Some(json!({ "email": user.email }).to_string()),
            "request",
        );

        info!(user_id, "用户已物理删除");
        Ok(())
    }

    // ==========================================
    // 自动清除作业
    // ==========================================

    /// 清除所有超出清除窗口的软删除实体
    ///
    /// 执行前校验保留期配置; 清除窗口短于恢复窗口时拒绝执行,
    /// 避免"仍可恢复却已被清除"的数据丢失窗口。
    ///
    /// # 参数
    /// - cancel: 协作取消标志, 每个实体之间检查一次
    pub fn purge_expired(&self, cancel: &AtomicBool) -> ApiResult<PurgeReport> {
        self.config
            .validate_retention_windows()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        let purge_days = self
            .config
            .get_purge_window_days()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let cutoff = Utc::now() - Duration::days(purge_days);

        let mut report = PurgeReport {
            purged_products: 0,
            purged_users: 0,
            failed: 0,
            cancelled: false,
        };

        for product in self.products.list_expired_soft_deleted(cutoff)? {
            if cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
            match self.products.delete_hard(product.id) {
                Ok(()) => {
                    record_best_effort(
                        self.audit.as_ref(),
                        None,
                        "PURGE_PRODUCT",
                        "PRODUCT",
                        product.id,
                        Some(json!({ "sku": product.sku }).to_string()),
                        "scheduler",
                    );
                    report.purged_products += 1;
                }
                Err(e) => {
                    warn!(sku = %product.sku, error = %e, "商品清除失败, 跳过");
                    report.failed += 1;
                }
            }
        }

        if !report.cancelled {
            // 候选集已排除 MASTER_ADMIN
            for user in self.users.list_expired_soft_deleted(cutoff)? {
                if cancel.load(Ordering::Relaxed) {
                    report.cancelled = true;
                    break;
                }
                match self.users.delete_hard(user.id) {
                    Ok(()) => {
                        record_best_effort(
                            self.audit.as_ref(),
                            None,
                            "PURGE_USER",
                            "USER",
                            user.id,
                            Some(json!({ "email": user.email }).to_string()),
                            "scheduler",
                        );
                        report.purged_users += 1;
                    }
                    Err(e) => {
                        warn!(user_id = user.id, error = %e, "用户清除失败, 跳过");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            purged_products = report.purged_products,
            purged_users = report.purged_users,
            failed = report.failed,
            cancelled = report.cancelled,
            "清除作业完成"
        );
        Ok(report)
    }
}
