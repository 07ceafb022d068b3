// ==========================================
// 库存台账系统 - 服务主入口
// ==========================================
// 职责: 初始化日志与应用状态, 启动通知投递与后台调度,
//       等待 Ctrl-C 后协作停机
// ==========================================

use inventory_ledger::app::{default_db_path, AppState};
use inventory_ledger::logging;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", inventory_ledger::APP_NAME);
    tracing::info!("系统版本: {}", inventory_ledger::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 首个命令行参数, 缺省用数据目录
    let db_path = std::env::args().nth(1).unwrap_or_else(default_db_path);
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!("使用数据库: {}", db_path);

    let mut state = AppState::new(db_path)?;

    // 通知投递循环
    let dispatcher = state
        .take_dispatcher()
        .ok_or("通知投递循环已被取走")?;
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // 后台调度
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = tokio::spawn(state.reconciliation.clone().run(shutdown_rx.clone()));
    let report_handle = tokio::spawn(
        state
            .reconciliation
            .clone()
            .run_daily_report(shutdown_rx.clone()),
    );
    let purge_handle = tokio::spawn(state.purge.clone().run(shutdown_rx));

    tracing::info!("服务已启动, Ctrl-C 停机");
    tokio::signal::ctrl_c().await?;
    tracing::info!("收到停机信号, 正在停止后台作业...");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(sweep_handle, report_handle, purge_handle);

    // 调度器全部退出后再关应用状态, 发送端随之释放, 投递循环自然收尾
    drop(state);
    let _ = dispatcher_handle.await;

    tracing::info!("服务已退出");
    Ok(())
}
