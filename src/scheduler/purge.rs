// ==========================================
// 库存台账系统 - 自动清除调度器
// ==========================================
// 职责: 周期清除超出保留期的软删除实体
// 红线: 保留期配置冲突时拒绝执行并告警, 绝不盲目删除
// ==========================================

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::engine::lifecycle::{LifecycleManager, PurgeReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

pub struct PurgeScheduler {
    lifecycle: Arc<LifecycleManager>,
    config: Arc<ConfigManager>,
    cancel: Arc<AtomicBool>,
}

impl PurgeScheduler {
    pub fn new(lifecycle: Arc<LifecycleManager>, config: Arc<ConfigManager>) -> Self {
        Self {
            lifecycle,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 请求中止当前清除作业（实体之间的边界处生效）
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// 执行一轮清除作业
    pub fn run_purge_once(&self) -> ApiResult<PurgeReport> {
        self.lifecycle.purge_expired(&self.cancel)
    }

    /// 周期清除循环（shutdown 信号到达后退出）
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let hours = match self.config.get_purge_interval_hours() {
            Ok(h) => h.max(1) as u64,
            Err(e) => {
                error!(error = %e, "清除周期配置读取失败, 回退为 24 小时");
                24
            }
        };
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // 首个 tick 立即返回, 跳过

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = self.clone();
                    match tokio::task::spawn_blocking(move || scheduler.run_purge_once()).await {
                        Ok(Ok(report)) if report.cancelled => break,
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "清除作业失败"),
                        Err(e) => error!(error = %e, "清除任务异常退出"),
                    }
                }
                _ = shutdown.changed() => {
                    self.request_stop();
                    break;
                }
            }
        }
        info!("自动清除循环退出");
    }
}
