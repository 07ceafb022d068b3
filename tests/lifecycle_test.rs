// ==========================================
// 生命周期管理器测试
// ==========================================
// 测试范围:
// 1. 商品/用户 软删除 -> 恢复 -> 物理删除 状态机
// 2. 恢复窗口口径: 窗口内成功, 窗口外 Expired
// 3. MASTER_ADMIN 豁免与自删禁止
// 4. 自动清除作业: 候选口径、配置冲突拒绝、协作取消
// ==========================================

mod test_helpers;

use inventory_ledger::api::error::ApiError;
use inventory_ledger::domain::types::{LifecycleState, Role, UserStatus};
use std::sync::atomic::AtomicBool;

// ==========================================
// 商品生命周期
// ==========================================

#[test]
fn test_product_soft_delete_and_restore() {
    let ctx = test_helpers::setup();
    let product = ctx
        .ledger
        .create_product(&test_helpers::product_request("内六角螺丝", 50, None), None)
        .expect("建档失败");

    let deleted = ctx
        .lifecycle
        .soft_delete_product(&product.sku, None)
        .expect("软删除失败");
    assert_eq!(deleted.lifecycle_state, LifecycleState::SoftDeleted);
    assert!(deleted.deleted_at.is_some());

    // 未删除清单不含, 已删除清单含
    assert!(ctx.ledger.list_active().unwrap().is_empty());
    assert_eq!(ctx.ledger.list_deleted().unwrap().len(), 1);

    // 重复软删除报 AlreadyDeleted
    assert!(matches!(
        ctx.lifecycle.soft_delete_product(&product.sku, None),
        Err(ApiError::AlreadyDeleted(_))
    ));

    let restored = ctx
        .lifecycle
        .restore_product(&product.sku, None)
        .expect("恢复失败");
    assert_eq!(restored.lifecycle_state, LifecycleState::Active);
    assert!(restored.deleted_at.is_none());
    assert_eq!(restored.quantity, 50); // 数量保持

    // 未删除状态下恢复报 NotDeleted
    assert!(matches!(
        ctx.lifecycle.restore_product(&product.sku, None),
        Err(ApiError::NotDeleted(_))
    ));
}

#[test]
fn test_product_restore_window_boundary() {
    let ctx = test_helpers::setup();

    // 窗口内 (29 天前删除): 恢复成功
    let within = ctx
        .ledger
        .create_product(&test_helpers::product_request("窗口内商品", 10, None), None)
        .expect("建档失败");
    ctx.lifecycle.soft_delete_product(&within.sku, None).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "products", within.id, 29);
    assert!(ctx.lifecycle.restore_product(&within.sku, None).is_ok());

    // 窗口外 (31 天前删除): Expired
    let expired = ctx
        .ledger
        .create_product(&test_helpers::product_request("窗口外商品", 10, None), None)
        .expect("建档失败");
    ctx.lifecycle.soft_delete_product(&expired.sku, None).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "products", expired.id, 31);
    assert!(matches!(
        ctx.lifecycle.restore_product(&expired.sku, None),
        Err(ApiError::Expired(_))
    ));
    // 失败后仍是软删除状态
    let still = ctx.ledger.get_by_sku(&expired.sku).expect("查商品失败");
    assert_eq!(still.lifecycle_state, LifecycleState::SoftDeleted);
}

#[test]
fn test_permanent_delete_requires_soft_deleted_and_keeps_history() {
    let ctx = test_helpers::setup();
    let product = ctx
        .ledger
        .create_product(&test_helpers::product_request("内六角螺丝", 50, None), None)
        .expect("建档失败");
    ctx.ledger.stock_out(&product.sku, 5, None, None).expect("出库失败");

    // 未软删除直接物理删除: NotDeleted
    assert!(matches!(
        ctx.lifecycle.permanent_delete_product(&product.sku, None),
        Err(ApiError::NotDeleted(_))
    ));

    ctx.lifecycle.soft_delete_product(&product.sku, None).expect("软删除失败");
    ctx.lifecycle
        .permanent_delete_product(&product.sku, None)
        .expect("物理删除失败");

    // 商品行已不存在
    assert!(matches!(
        ctx.ledger.get_by_sku(&product.sku),
        Err(ApiError::NotFound(_))
    ));
    // 流水历史保留
    let log = ctx.transactions.list_by_sku(&product.sku).expect("查流水失败");
    assert_eq!(log.len(), 2);
}

#[test]
fn test_product_lifecycle_updates_guarded_by_state() {
    let ctx = test_helpers::setup();
    let repo = inventory_ledger::repository::ProductRepository::new(ctx.conn.clone());
    let product = ctx
        .ledger
        .create_product(&test_helpers::product_request("内六角螺丝", 50, None), None)
        .expect("建档失败");
    let now = chrono::Utc::now();

    // 未删除状态下恢复标记不落库
    assert!(repo.mark_restored(product.id, now, None).is_err());

    // 并发重复删除: 状态谓词保证只有一次标记成功
    repo.mark_soft_deleted(product.id, now, None).expect("软删除标记失败");
    assert!(repo.mark_soft_deleted(product.id, now, None).is_err());

    // 同理重复恢复只成功一次
    repo.mark_restored(product.id, now, None).expect("恢复标记失败");
    assert!(repo.mark_restored(product.id, now, None).is_err());

    let restored = ctx.ledger.get_by_sku(&product.sku).expect("查商品失败");
    assert_eq!(restored.lifecycle_state, LifecycleState::Active);
    assert!(restored.deleted_at.is_none());
}

// ==========================================
// 用户生命周期
// ==========================================

#[test]
fn test_user_soft_delete_rules() {
    let ctx = test_helpers::setup();
    let master = test_helpers::seed_user(&ctx, "master@example.com", Role::MasterAdmin);
    let admin = test_helpers::seed_user(&ctx, "admin@example.com", Role::Admin);
    let staff = test_helpers::seed_user(&ctx, "staff@example.com", Role::Employee);

    // 不允许删除自己
    assert!(matches!(
        ctx.lifecycle.soft_delete_user(staff, Some(staff)),
        Err(ApiError::Forbidden(_))
    ));

    // MASTER_ADMIN 豁免
    assert!(matches!(
        ctx.lifecycle.soft_delete_user(master, Some(admin)),
        Err(ApiError::Forbidden(_))
    ));

    // 正常删除: 生命周期与账号状态同时变化
    let deleted = ctx
        .lifecycle
        .soft_delete_user(staff, Some(admin))
        .expect("软删除失败");
    assert_eq!(deleted.lifecycle_state, LifecycleState::SoftDeleted);
    assert_eq!(deleted.status, UserStatus::Inactive);
}

#[test]
fn test_user_restore_reactivates_account() {
    let ctx = test_helpers::setup();
    let admin = test_helpers::seed_user(&ctx, "admin@example.com", Role::Admin);
    let staff = test_helpers::seed_user(&ctx, "staff@example.com", Role::Employee);

    ctx.lifecycle.soft_delete_user(staff, Some(admin)).expect("软删除失败");
    let restored = ctx
        .lifecycle
        .restore_user(staff, Some(admin))
        .expect("恢复失败");
    assert_eq!(restored.lifecycle_state, LifecycleState::Active);
    assert_eq!(restored.status, UserStatus::Active);
    assert!(restored.deleted_at.is_none());
}

#[test]
fn test_user_restore_window_expired() {
    let ctx = test_helpers::setup();
    let admin = test_helpers::seed_user(&ctx, "admin@example.com", Role::Admin);
    let staff = test_helpers::seed_user(&ctx, "staff@example.com", Role::Employee);

    ctx.lifecycle.soft_delete_user(staff, Some(admin)).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "users", staff, 31);
    assert!(matches!(
        ctx.lifecycle.restore_user(staff, Some(admin)),
        Err(ApiError::Expired(_))
    ));
}

#[test]
fn test_user_permanent_delete_rules() {
    let ctx = test_helpers::setup();
    let master = test_helpers::seed_user(&ctx, "master@example.com", Role::MasterAdmin);
    let admin = test_helpers::seed_user(&ctx, "admin@example.com", Role::Admin);
    let staff = test_helpers::seed_user(&ctx, "staff@example.com", Role::Employee);

    // MASTER_ADMIN 豁免清除
    assert!(matches!(
        ctx.lifecycle.permanent_delete_user(master, Some(admin)),
        Err(ApiError::Forbidden(_))
    ));

    // 未软删除拒绝
    assert!(matches!(
        ctx.lifecycle.permanent_delete_user(staff, Some(admin)),
        Err(ApiError::NotDeleted(_))
    ));

    ctx.lifecycle.soft_delete_user(staff, Some(admin)).expect("软删除失败");
    ctx.lifecycle
        .permanent_delete_user(staff, Some(admin))
        .expect("物理删除失败");
    assert!(ctx.users.find_by_id(staff).unwrap().is_none());
}

// ==========================================
// 自动清除作业
// ==========================================

#[test]
fn test_purge_expired_respects_cutoff_and_exemption() {
    let ctx = test_helpers::setup();
    let admin = test_helpers::seed_user(&ctx, "admin@example.com", Role::Admin);

    // 商品: 一个过期(31天), 一个未过期(5天)
    let old_product = ctx
        .ledger
        .create_product(&test_helpers::product_request("过期商品", 10, None), None)
        .expect("建档失败");
    ctx.lifecycle.soft_delete_product(&old_product.sku, None).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "products", old_product.id, 31);

    let fresh_product = ctx
        .ledger
        .create_product(&test_helpers::product_request("新删商品", 10, None), None)
        .expect("建档失败");
    ctx.lifecycle.soft_delete_product(&fresh_product.sku, None).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "products", fresh_product.id, 5);

    // 用户: 过期的普通用户 + 被直接改库标成软删除的主管理员(候选口径必须排除)
    let staff = test_helpers::seed_user(&ctx, "staff@example.com", Role::Employee);
    ctx.lifecycle.soft_delete_user(staff, Some(admin)).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "users", staff, 40);

    let master = test_helpers::seed_user(&ctx, "master@example.com", Role::MasterAdmin);
    {
        let conn = ctx.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET lifecycle_state = 'SOFT_DELETED', deleted_at = ?1 WHERE id = ?2",
            rusqlite::params![chrono::Utc::now() - chrono::Duration::days(60), master],
        )
        .unwrap();
    }

    let cancel = AtomicBool::new(false);
    let report = ctx.lifecycle.purge_expired(&cancel).expect("清除作业失败");
    assert_eq!(report.purged_products, 1);
    assert_eq!(report.purged_users, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);

    // 过期商品已清除, 未过期商品保留
    assert!(matches!(
        ctx.ledger.get_by_sku(&old_product.sku),
        Err(ApiError::NotFound(_))
    ));
    assert!(ctx.ledger.get_by_sku(&fresh_product.sku).is_ok());

    // 普通用户已清除, 主管理员保留
    assert!(ctx.users.find_by_id(staff).unwrap().is_none());
    assert!(ctx.users.find_by_id(master).unwrap().is_some());
}

#[test]
fn test_purge_refuses_conflicting_retention_config() {
    let ctx = test_helpers::setup();

    // 清除窗口(5) < 恢复窗口(30): 拒绝执行
    ctx.config
        .set_global_config_value("purge_window_days", "5")
        .expect("写配置失败");

    let cancel = AtomicBool::new(false);
    assert!(matches!(
        ctx.lifecycle.purge_expired(&cancel),
        Err(ApiError::Config(_))
    ));
}

#[test]
fn test_purge_cooperative_cancellation() {
    let ctx = test_helpers::setup();

    let product = ctx
        .ledger
        .create_product(&test_helpers::product_request("过期商品", 10, None), None)
        .expect("建档失败");
    ctx.lifecycle.soft_delete_product(&product.sku, None).expect("软删除失败");
    test_helpers::backdate_deleted_at(&ctx, "products", product.id, 40);

    // 取消标志先行置位: 作业在首个实体前即停
    let cancel = AtomicBool::new(true);
    let report = ctx.lifecycle.purge_expired(&cancel).expect("清除作业失败");
    assert!(report.cancelled);
    assert_eq!(report.purged_products, 0);
    assert!(ctx.ledger.get_by_sku(&product.sku).is_ok());
}
