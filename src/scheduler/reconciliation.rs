// ==========================================
// 库存台账系统 - 预警核对巡检
// ==========================================
// 职责: 兜底巡检全部未删除商品, 补齐/解除预警;
//       周期产出低库存日报（只读, 不变更预警状态）
// 红线: 单个商品失败只计数, 不中断整轮巡检
// ==========================================

use crate::config::ConfigManager;
use crate::engine::alert::{AlertEngine, AlertTransition};
use crate::repository::ProductRepository;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 一轮核对巡检的结果
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep_id: String,
    pub checked: u64,
    pub created: u64,
    pub updated: u64,
    pub resolved: u64,
    pub failed: u64,
    pub cancelled: bool,
}

// ==========================================
// ReconciliationScheduler - 核对巡检调度器
// ==========================================
pub struct ReconciliationScheduler {
    products: ProductRepository,
    alerts: Arc<AlertEngine>,
    config: Arc<ConfigManager>,
    cancel: Arc<AtomicBool>,
}

impl ReconciliationScheduler {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        alerts: Arc<AlertEngine>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            products: ProductRepository::new(conn),
            alerts,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 请求中止当前巡检（商品之间的边界处生效）
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// 执行一轮核对巡检
    ///
    /// 先取 SKU 清单, 再逐个在各自的短事务里重取商品评估,
    /// 避免整轮巡检长时间占用写锁。
    pub fn run_sweep_once(&self) -> SweepReport {
        let sweep_id = Uuid::new_v4().to_string();
        let mut report = SweepReport {
            sweep_id: sweep_id.clone(),
            checked: 0,
            created: 0,
            updated: 0,
            resolved: 0,
            failed: 0,
            cancelled: false,
        };

        let skus = match self.products.active_skus() {
            Ok(skus) => skus,
            Err(e) => {
                error!(sweep_id = %sweep_id, error = %e, "巡检取 SKU 清单失败");
                report.failed += 1;
                return report;
            }
        };

        info!(sweep_id = %sweep_id, total = skus.len(), "预警核对巡检开始");

        for sku in skus {
            if self.cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
            report.checked += 1;
            match self.alerts.evaluate_sku(&sku) {
                Ok(AlertTransition::Created(_)) => report.created += 1,
                Ok(AlertTransition::Updated(_)) => report.updated += 1,
                Ok(AlertTransition::Resolved(_)) => report.resolved += 1,
                Ok(AlertTransition::NoChange) => {}
                Err(e) => {
                    warn!(sweep_id = %sweep_id, sku = %sku, error = %e, "单品评估失败, 跳过");
                    report.failed += 1;
                }
            }
        }

        info!(
            sweep_id = %sweep_id,
            checked = report.checked,
            created = report.created,
            updated = report.updated,
            resolved = report.resolved,
            failed = report.failed,
            cancelled = report.cancelled,
            "预警核对巡检结束"
        );
        report
    }

    /// 产出一期低库存日报（只读统计, 不触发预警变更）
    ///
    /// # 返回
    /// - Ok(count): 当前低库存商品数
    pub fn run_daily_report_once(&self) -> Result<i64, crate::api::error::ApiError> {
        let default = self
            .config
            .get_low_stock_default_threshold()
            .map_err(|e| crate::api::error::ApiError::Config(e.to_string()))?;
        let count = self.products.count_low_stock(default)?;

        if count > 0 {
            info!(low_stock_count = count, "低库存日报: 存在低库存商品");
        } else {
            info!("低库存日报: 库存全部正常");
        }
        Ok(count)
    }

    /// 周期巡检循环（shutdown 信号到达后退出）
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let hours = match self.config.get_reconcile_interval_hours() {
            Ok(h) => h.max(1) as u64,
            Err(e) => {
                error!(error = %e, "巡检周期配置读取失败, 回退为 6 小时");
                6
            }
        };
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // 首个 tick 立即返回, 跳过

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = self.clone();
                    match tokio::task::spawn_blocking(move || scheduler.run_sweep_once()).await {
                        Ok(report) if report.cancelled => break,
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "巡检任务异常退出"),
                    }
                }
                _ = shutdown.changed() => {
                    self.request_stop();
                    break;
                }
            }
        }
        info!("预警核对巡检循环退出");
    }

    /// 周期日报循环（shutdown 信号到达后退出）
    pub async fn run_daily_report(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let hours = match self.config.get_daily_report_interval_hours() {
            Ok(h) => h.max(1) as u64,
            Err(e) => {
                error!(error = %e, "日报周期配置读取失败, 回退为 24 小时");
                24
            }
        };
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || {
                        scheduler.run_daily_report_once()
                    })
                    .await
                    {
                        error!(error = %e, "日报任务异常退出");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("低库存日报循环退出");
    }
}
