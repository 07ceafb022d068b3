// ==========================================
// 配置管理测试
// ==========================================
// 测试范围:
// 1. 缺省值口径
// 2. 写入覆盖与类型化读取
// 3. 保留窗口一致性校验
// ==========================================

mod test_helpers;

#[test]
fn test_defaults_when_unset() {
    let ctx = test_helpers::setup();

    assert_eq!(ctx.config.get_low_stock_default_threshold().unwrap(), 10);
    assert_eq!(ctx.config.get_restore_window_days().unwrap(), 30);
    assert_eq!(ctx.config.get_purge_window_days().unwrap(), 30);
    assert_eq!(ctx.config.get_reconcile_interval_hours().unwrap(), 6);
    assert_eq!(ctx.config.get_daily_report_interval_hours().unwrap(), 24);
    assert_eq!(ctx.config.get_purge_interval_hours().unwrap(), 24);
    assert_eq!(ctx.config.get_sku_prefix().unwrap(), "SKU-");
    assert_eq!(ctx.config.get_sku_number_width().unwrap(), 6);
}

#[test]
fn test_set_and_read_back() {
    let ctx = test_helpers::setup();

    ctx.config
        .set_global_config_value("low_stock_default_threshold", "25")
        .expect("写配置失败");
    assert_eq!(ctx.config.get_low_stock_default_threshold().unwrap(), 25);

    assert_eq!(
        ctx.config
            .get_global_config_value("low_stock_default_threshold")
            .unwrap(),
        Some("25".to_string())
    );

    // 覆盖写走 UPSERT, 不产生重复键
    ctx.config
        .set_global_config_value("low_stock_default_threshold", "8")
        .expect("写配置失败");
    assert_eq!(ctx.config.get_low_stock_default_threshold().unwrap(), 8);
}

#[test]
fn test_unknown_key_reads_none() {
    let ctx = test_helpers::setup();

    assert_eq!(ctx.config.get_global_config_value("没有这个键").unwrap(), None);

    ctx.config
        .set_global_config_value("sku_prefix", "WH-")
        .expect("写配置失败");
    assert_eq!(ctx.config.get_sku_prefix().unwrap(), "WH-");
}

#[test]
fn test_retention_window_validation() {
    let ctx = test_helpers::setup();

    // 缺省 30/30: 合法
    assert!(ctx.config.validate_retention_windows().is_ok());

    // 清除窗口 >= 恢复窗口: 合法
    ctx.config
        .set_global_config_value("purge_window_days", "45")
        .expect("写配置失败");
    assert!(ctx.config.validate_retention_windows().is_ok());

    // 清除窗口 < 恢复窗口: 拒绝
    ctx.config
        .set_global_config_value("purge_window_days", "5")
        .expect("写配置失败");
    assert!(ctx.config.validate_retention_windows().is_err());
}

#[test]
fn test_config_snapshot_includes_overrides() {
    let ctx = test_helpers::setup();
    ctx.config
        .set_global_config_value("restore_window_days", "15")
        .expect("写配置失败");

    let snapshot = ctx.config.get_config_snapshot().expect("导出快照失败");
    let parsed: serde_json::Value =
        serde_json::from_str(&snapshot).expect("快照应为合法 JSON");
    assert_eq!(parsed["restore_window_days"], "15");
}
