// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、引擎组装与测试数据生成
// ==========================================

#![allow(dead_code)]

use inventory_ledger::audit::SqliteAuditRecorder;
use inventory_ledger::config::ConfigManager;
use inventory_ledger::domain::product::NewProduct;
use inventory_ledger::domain::types::Role;
use inventory_ledger::domain::user::NewUser;
use inventory_ledger::engine::{AdminDirectory, AlertEngine, LifecycleManager, StockLedger};
use inventory_ledger::notify::{NotificationMessage, NotificationSender};
use inventory_ledger::repository::{
    AlertRepository, TransactionLogRepository, UserRepository,
};
use inventory_ledger::scheduler::{PurgeScheduler, ReconciliationScheduler};
use chrono::Utc;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::sync::mpsc::UnboundedReceiver;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = inventory_ledger::db::open_and_init(&db_path)?;
    drop(conn);

    Ok((temp_file, db_path))
}

/// 测试上下文: 完整组装的引擎与直通仓储
pub struct TestContext {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub config: Arc<ConfigManager>,
    pub ledger: Arc<StockLedger>,
    pub alerts: Arc<AlertEngine>,
    pub lifecycle: Arc<LifecycleManager>,
    pub reconciliation: Arc<ReconciliationScheduler>,
    pub purge: Arc<PurgeScheduler>,
    pub users: UserRepository,
    pub transactions: TransactionLogRepository,
    pub alert_repo: AlertRepository,
    pub notify_rx: UnboundedReceiver<NotificationMessage>,
}

/// 组装测试上下文（与应用启动同构, 但通知接收端留给测试断言）
pub fn setup() -> TestContext {
    inventory_ledger::logging::init_test();

    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");

    let conn = inventory_ledger::db::open_sqlite_connection(&db_path).expect("打开数据库失败");
    let conn = Arc::new(Mutex::new(conn));

    let config = Arc::new(ConfigManager::new(&db_path).expect("创建ConfigManager失败"));
    let directory = Arc::new(AdminDirectory::new(&db_path).expect("创建AdminDirectory失败"));
    let audit = Arc::new(SqliteAuditRecorder::new(conn.clone()));

    let (notify_tx, notify_rx) = NotificationSender::channel();

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
    let lifecycle = Arc::new(LifecycleManager::new(conn.clone(), config.clone(), audit));
    let reconciliation = Arc::new(ReconciliationScheduler::new(
        conn.clone(),
        alerts.clone(),
        config.clone(),
    ));
    let purge = Arc::new(PurgeScheduler::new(lifecycle.clone(), config.clone()));

    TestContext {
        _temp_file: temp_file,
        db_path,
        users: UserRepository::new(conn.clone()),
        transactions: TransactionLogRepository::new(conn.clone()),
        alert_repo: AlertRepository::new(conn.clone()),
        conn,
        config,
        ledger,
        alerts,
        lifecycle,
        reconciliation,
        purge,
        notify_rx,
    }
}

/// 插入测试用户, 返回用户 id
pub fn seed_user(ctx: &TestContext, email: &str, role: Role) -> i64 {
    ctx.users
        .insert(
            &NewUser {
                email: email.to_string(),
                first_name: "测".to_string(),
                last_name: "试".to_string(),
                role,
            },
            Utc::now(),
        )
        .expect("插入用户失败")
}

/// 构造建档请求
pub fn product_request(name: &str, quantity: i64, threshold: Option<i64>) -> NewProduct {
    NewProduct {
        product_name: name.to_string(),
        category: "五金".to_string(),
        supplier: "默认供应商".to_string(),
        unit_price: 9.9,
        quantity,
        min_stock_threshold: threshold,
    }
}

/// 直接改写实体的删除时间（模拟窗口流逝）
pub fn backdate_deleted_at(ctx: &TestContext, table: &str, id: i64, days_ago: i64) {
    let conn = ctx.conn.lock().expect("锁获取失败");
    let backdated = Utc::now() - chrono::Duration::days(days_ago);
    conn.execute(
        &format!("UPDATE {} SET deleted_at = ?1 WHERE id = ?2", table),
        rusqlite::params![backdated, id],
    )
    .expect("改写删除时间失败");
}

/// 清空通知接收端（忽略此前积压的消息）
pub fn drain_notifications(ctx: &mut TestContext) {
    while ctx.notify_rx.try_recv().is_ok() {}
}
