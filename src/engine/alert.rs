// ==========================================
// 库存台账系统 - 低库存预警引擎
// ==========================================
// 判定口径: 现存量 < 生效阈值 为低库存 (严格小于)
// 状态机: 无预警 -> 未解除 -> 已解除; 每个 SKU 至多一条未解除
// 红线: 预警状态变更与库存变更同事务; 通知在提交之后投递
// ==========================================

use crate::config::ConfigManager;
use crate::db::open_sqlite_connection;
use crate::domain::alert::{AlertSummary, LowStockAlert, NewLowStockAlert};
use crate::domain::product::Product;
use crate::notify::{NotificationMessage, NotificationSender};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{AlertRepository, ProductRepository, UserRepository};
use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 一次预警评估产生的状态转移
#[derive(Debug, Clone)]
pub enum AlertTransition {
    /// 新建预警（收件人已快照）
    Created(LowStockAlert),
    /// 刷新既有未解除预警的读数
    Updated(LowStockAlert),
    /// 解除预警
    Resolved(LowStockAlert),
    /// 无需变更
    NoChange,
}

// ==========================================
// RecipientDirectory - 收件人名册
// ==========================================
pub trait RecipientDirectory: Send + Sync {
    /// 当前有效的管理员收件邮箱
    fn admin_recipients(&self) -> RepositoryResult<Vec<String>>;
}

/// 管理员名册: 从用户表读取有效管理员邮箱
///
/// 持有独立连接, 可在主连接的事务内被安全调用。
pub struct AdminDirectory {
    users: UserRepository,
}

impl AdminDirectory {
    pub fn new(db_path: &str) -> rusqlite::Result<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            users: UserRepository::new(Arc::new(Mutex::new(conn))),
        })
    }
}

impl RecipientDirectory for AdminDirectory {
    fn admin_recipients(&self) -> RepositoryResult<Vec<String>> {
        self.users.active_admin_emails()
    }
}

// ==========================================
// AlertEngine - 预警引擎
// ==========================================
pub struct AlertEngine {
    conn: Arc<Mutex<Connection>>,
    alerts: AlertRepository,
    config: Arc<ConfigManager>,
    directory: Arc<dyn RecipientDirectory>,
    notify_tx: NotificationSender,
}

impl AlertEngine {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        config: Arc<ConfigManager>,
        directory: Arc<dyn RecipientDirectory>,
        notify_tx: NotificationSender,
    ) -> Self {
        let alerts = AlertRepository::new(conn.clone());
        Self {
            conn,
            alerts,
            config,
            directory,
            notify_tx,
        }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn default_threshold(&self) -> RepositoryResult<i64> {
        self.config
            .get_low_stock_default_threshold()
            .map_err(|e| RepositoryError::InternalError(format!("配置读取失败: {}", e)))
    }

    /// 在事务内评估商品的预警状态
    ///
    /// 台账引擎在库存变更的同一事务里调用, 保证预警与库存读数一致。
    ///
    /// # 返回
    /// - AlertTransition: 本次评估产生的状态转移（调用方在提交后投递通知）
    pub fn evaluate_in_tx(
        &self,
        conn: &Connection,
        product: &Product,
    ) -> RepositoryResult<AlertTransition> {
        let threshold = product.effective_threshold(self.default_threshold()?);
        let open = AlertRepository::find_open_by_sku_with(conn, &product.sku)?;
        let now = Utc::now();

        if product.quantity >= threshold {
            // 不低于阈值: 有未解除预警则解除, 否则无事发生
            return match open {
                Some(mut alert) => {
                    AlertRepository::resolve_with(conn, alert.id, now)?;
                    alert.is_resolved = true;
                    alert.resolved_at = Some(now);
                    debug!(sku = %product.sku, alert_id = alert.id, "低库存预警已解除");
                    Ok(AlertTransition::Resolved(alert))
                }
                None => Ok(AlertTransition::NoChange),
            };
        }

        // 低于阈值
        match open {
            Some(mut alert) => {
                AlertRepository::update_reading_with(
                    conn,
                    alert.id,
                    product.quantity,
                    threshold,
                    now,
                )?;
                alert.current_quantity = product.quantity;
                alert.threshold = threshold;
                alert.alert_sent_at = now;
                debug!(sku = %product.sku, alert_id = alert.id, "低库存预警读数已刷新");
                Ok(AlertTransition::Updated(alert))
            }
            None => {
                let recipients = self.directory.admin_recipients()?;
                let email_recipients = if recipients.is_empty() {
                    None
                } else {
                    Some(recipients.join(","))
                };

                let alert = AlertRepository::insert_with(
                    conn,
                    &NewLowStockAlert {
                        sku: product.sku.clone(),
                        product_name: product.product_name.clone(),
                        current_quantity: product.quantity,
                        threshold,
                        alert_sent_at: now,
                        email_recipients,
                    },
                )?;
                debug!(sku = %product.sku, alert_id = alert.id, "低库存预警已创建");
                Ok(AlertTransition::Created(alert))
            }
        }
    }

    /// 评估单个商品（独立事务）
    pub fn evaluate(&self, product: &Product) -> RepositoryResult<AlertTransition> {
        let transition = {
            let mut conn = self.get_conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            let transition = self.evaluate_in_tx(&tx, product)?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            transition
        };
        Ok(transition)
    }

    /// 按 SKU 评估（核对巡检用: 在锁内重取商品, 不依赖过期快照）
    ///
    /// 商品已被删除或不存在时返回 NoChange。
    pub fn evaluate_sku(&self, sku: &str) -> RepositoryResult<AlertTransition> {
        let transition = {
            let mut conn = self.get_conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            let product = match ProductRepository::find_active_by_sku_with(&tx, sku)? {
                Some(p) => p,
                None => return Ok(AlertTransition::NoChange),
            };
            let transition = self.evaluate_in_tx(&tx, &product)?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            transition
        };
        self.dispatch(&transition);
        Ok(transition)
    }

    /// 投递预警通知（事务提交之后调用）
    ///
    /// 只有新建预警触发通知; 读数刷新与解除不重复打扰收件人。
    pub fn dispatch(&self, transition: &AlertTransition) {
        if let AlertTransition::Created(alert) = transition {
            let recipients = alert.recipients();
            if recipients.is_empty() {
                warn!(sku = %alert.sku, "管理员收件人为空, 跳过低库存通知");
                return;
            }
            self.notify_tx.send(NotificationMessage::LowStock {
                sku: alert.sku.clone(),
                product_name: alert.product_name.clone(),
                current_quantity: alert.current_quantity,
                threshold: alert.threshold,
                recipients,
            });
        }
    }

    /// 阈值变更告知（与预警评估相互独立, 无论是否触发预警都发送）
    pub fn notify_threshold_change(
        &self,
        product: &Product,
        old_threshold: Option<i64>,
        new_threshold: i64,
        actor_description: Option<String>,
    ) -> RepositoryResult<()> {
        let recipients = self.directory.admin_recipients()?;
        if recipients.is_empty() {
            warn!(sku = %product.sku, "管理员收件人为空, 跳过阈值变更通知");
            return Ok(());
        }
        self.notify_tx.send(NotificationMessage::ThresholdChanged {
            sku: product.sku.clone(),
            product_name: product.product_name.clone(),
            old_threshold,
            new_threshold,
            actor_description,
            recipients,
        });
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 所有未解除预警（新在前）
    pub fn active_alerts(&self) -> RepositoryResult<Vec<LowStockAlert>> {
        self.alerts.list_open()
    }

    pub fn find_alert(&self, alert_id: i64) -> RepositoryResult<Option<LowStockAlert>> {
        self.alerts.find_by_id(alert_id)
    }

    /// 手工解除预警
    pub fn resolve_alert(&self, alert_id: i64) -> RepositoryResult<()> {
        self.alerts.resolve(alert_id, Utc::now())
    }

    /// 预警汇总（未解除总数 / 今日新建 / 最近 5 条）
    pub fn summary(&self) -> RepositoryResult<AlertSummary> {
        let today_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| RepositoryError::InternalError("今日零点计算失败".to_string()))?;

        Ok(AlertSummary {
            total_active: self.alerts.count_open()?,
            created_today: self.alerts.count_open_since(today_start)?,
            recent: self.alerts.recent_open(5)?,
        })
    }
}
