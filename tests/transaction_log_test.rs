// ==========================================
// 库存流水查询测试
// ==========================================
// 测试范围:
// 1. 流水排序: 新在前
// 2. 条件查询: SKU / 名称 / 类型 / 时间区间组合
// 3. 商品名快照不随查询时点变化
// ==========================================

mod test_helpers;

use inventory_ledger::domain::stock_transaction::TransactionQuery;
use inventory_ledger::domain::types::MovementKind;
use chrono::{Duration, Utc};

fn seed_movements(ctx: &test_helpers::TestContext) -> (String, String) {
    let screws = ctx
        .ledger
        .create_product(&test_helpers::product_request("内六角螺丝", 100, None), None)
        .expect("建档失败");
    let washers = ctx
        .ledger
        .create_product(&test_helpers::product_request("平垫圈", 50, None), None)
        .expect("建档失败");

    ctx.ledger.stock_out(&screws.sku, 10, None, None).expect("出库失败");
    ctx.ledger.stock_in(&screws.sku, 5, None, None).expect("入库失败");
    ctx.ledger.adjust_stock(&washers.sku, 47, None, None).expect("盘点失败");

    (screws.sku, washers.sku)
}

#[test]
fn test_list_by_sku_newest_first() {
    let ctx = test_helpers::setup();
    let (screws, _) = seed_movements(&ctx);

    let log = ctx.transactions.list_by_sku(&screws).expect("查流水失败");
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].kind, MovementKind::StockIn); // 最后一笔在最前
    assert_eq!(log[1].kind, MovementKind::StockOut);
    assert_eq!(log[2].kind, MovementKind::StockIn); // 建档初始入库
    assert_eq!(log[2].previous_quantity, 0);
}

#[test]
fn test_search_by_kind_and_sku() {
    let ctx = test_helpers::setup();
    let (screws, washers) = seed_movements(&ctx);

    let out_only = ctx
        .transactions
        .search(&TransactionQuery {
            kind: Some(MovementKind::StockOut),
            ..Default::default()
        })
        .expect("查询失败");
    assert_eq!(out_only.len(), 1);
    assert_eq!(out_only[0].sku, screws);

    let washers_only = ctx
        .transactions
        .search(&TransactionQuery {
            sku: Some(washers.clone()),
            ..Default::default()
        })
        .expect("查询失败");
    assert_eq!(washers_only.len(), 2); // 建档 + 盘点
    assert!(washers_only.iter().all(|t| t.sku == washers));
}

#[test]
fn test_search_by_name_substring() {
    let ctx = test_helpers::setup();
    seed_movements(&ctx);

    let matched = ctx
        .transactions
        .search(&TransactionQuery {
            name_substring: Some("垫圈".to_string()),
            ..Default::default()
        })
        .expect("查询失败");
    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|t| t.product_name.contains("垫圈")));
}

#[test]
fn test_search_by_time_range() {
    let ctx = test_helpers::setup();
    seed_movements(&ctx);

    let all = ctx
        .transactions
        .search(&TransactionQuery {
            from: Some(Utc::now() - Duration::hours(1)),
            to: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        })
        .expect("查询失败");
    assert_eq!(all.len(), 5);

    let none = ctx
        .transactions
        .search(&TransactionQuery {
            to: Some(Utc::now() - Duration::hours(1)),
            ..Default::default()
        })
        .expect("查询失败");
    assert!(none.is_empty());
}

#[test]
fn test_combined_filters() {
    let ctx = test_helpers::setup();
    let (screws, _) = seed_movements(&ctx);

    let combined = ctx
        .transactions
        .search(&TransactionQuery {
            sku: Some(screws.clone()),
            kind: Some(MovementKind::StockIn),
            from: Some(Utc::now() - Duration::hours(1)),
            ..Default::default()
        })
        .expect("查询失败");
    assert_eq!(combined.len(), 2); // 建档初始入库 + 补货入库
}

#[test]
fn test_history_survives_product_purge() {
    let ctx = test_helpers::setup();
    let (screws, _) = seed_movements(&ctx);

    ctx.lifecycle.soft_delete_product(&screws, None).expect("软删除失败");
    ctx.lifecycle.permanent_delete_product(&screws, None).expect("物理删除失败");

    // 流水按写入时快照的 SKU/名称继续可查
    let log = ctx.transactions.list_by_sku(&screws).expect("查流水失败");
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].product_name, "内六角螺丝");
}
