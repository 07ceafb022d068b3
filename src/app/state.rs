// ==========================================
// 库存台账系统 - 应用状态
// ==========================================
// 职责: 组装共享连接、配置、引擎与调度器
// 约定: 主连接经互斥锁串行化全部写入;
//       配置与收件人名册各持独立连接, 避免事务内自锁
// ==========================================

use std::sync::{Arc, Mutex};

use crate::audit::SqliteAuditRecorder;
use crate::config::ConfigManager;
use crate::db::open_and_init;
use crate::engine::{AdminDirectory, AlertEngine, LifecycleManager, StockLedger};
use crate::notify::{LogNotifier, NotificationDispatcher, NotificationSender};
use crate::repository::{AlertRepository, TransactionLogRepository, UserRepository};
use crate::scheduler::{PurgeScheduler, ReconciliationScheduler};

/// 应用状态
///
/// 包含所有引擎、调度器与共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 配置管理器（独立连接）
    pub config: Arc<ConfigManager>,

    /// 库存台账引擎
    pub ledger: Arc<StockLedger>,

    /// 低库存预警引擎
    pub alerts: Arc<AlertEngine>,

    /// 生命周期管理器
    pub lifecycle: Arc<LifecycleManager>,

    /// 用户仓储（用户管理直通仓储, 不再包一层引擎）
    pub users: Arc<UserRepository>,

    /// 流水仓储（台账查询直通）
    pub transactions: Arc<TransactionLogRepository>,

    /// 预警仓储（预警查询直通）
    pub alert_repo: Arc<AlertRepository>,

    /// 预警核对巡检调度器
    pub reconciliation: Arc<ReconciliationScheduler>,

    /// 自动清除调度器
    pub purge: Arc<PurgeScheduler>,

    /// 通知投递循环（启动时 take 后交给后台任务）
    dispatcher: Option<NotificationDispatcher>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并初始化 schema
    /// 2. 初始化配置管理器与收件人名册（各自独立连接）
    /// 3. 组装引擎与调度器
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_and_init(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(
            ConfigManager::new(&db_path).map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        // 启动即校验保留期配置, 配置冲突尽早暴露
        if let Err(e) = config.validate_retention_windows() {
            tracing::warn!("保留期配置冲突(清除作业将拒绝执行): {}", e);
        }

        let directory = Arc::new(
            AdminDirectory::new(&db_path).map_err(|e| format!("无法创建AdminDirectory: {}", e))?,
        );

        let (notify_tx, notify_rx) = NotificationSender::channel();
        let dispatcher = NotificationDispatcher::new(notify_rx, Arc::new(LogNotifier));

        let audit = Arc::new(SqliteAuditRecorder::new(conn.clone()));

        let alerts = Arc::new(AlertEngine::new(
            conn.clone(),
            config.clone(),
            directory,
            notify_tx,
        ));
        let ledger = Arc::new(StockLedger::new(
            conn.clone(),
            config.clone(),
            alerts.clone(),
            audit.clone(),
        ));
        let lifecycle = Arc::new(LifecycleManager::new(
            conn.clone(),
            config.clone(),
            audit,
        ));

        let reconciliation = Arc::new(ReconciliationScheduler::new(
            conn.clone(),
            alerts.clone(),
            config.clone(),
        ));
        let purge = Arc::new(PurgeScheduler::new(lifecycle.clone(), config.clone()));

        Ok(Self {
            db_path,
            config,
            ledger,
            alerts,
            lifecycle,
            users: Arc::new(UserRepository::new(conn.clone())),
            transactions: Arc::new(TransactionLogRepository::new(conn.clone())),
            alert_repo: Arc::new(AlertRepository::new(conn)),
            reconciliation,
            purge,
            dispatcher: Some(dispatcher),
        })
    }

    /// 取走通知投递循环（只能取一次, 由启动代码 spawn）
    pub fn take_dispatcher(&mut self) -> Option<NotificationDispatcher> {
        self.dispatcher.take()
    }
}

/// 默认数据库路径（数据目录下 inventory-ledger/inventory.db）
pub fn default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    base.join("inventory-ledger")
        .join("inventory.db")
        .to_string_lossy()
        .into_owned()
}
