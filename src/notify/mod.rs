// ==========================================
// 库存台账系统 - 通知模块
// ==========================================
// 职责: 预警/阈值变更通知的消息定义与投递
// 红线: 通知失败不得影响库存操作本身;
//       投递一律在事务提交之后
// ==========================================

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("通知通道已关闭")]
    ChannelClosed,

    #[error("通知发送失败: {0}")]
    SendFailure(String),
}

// ==========================================
// NotificationMessage - 通知消息
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationMessage {
    /// 低库存预警（新建或刷新）
    LowStock {
        sku: String,
        product_name: String,
        current_quantity: i64,
        threshold: i64,
        recipients: Vec<String>,
    },
    /// 阈值变更告知（与预警评估相互独立）
    ThresholdChanged {
        sku: String,
        product_name: String,
        old_threshold: Option<i64>,
        new_threshold: i64,
        /// 操作人展示名（调度作业等无操作人时为空）
        actor_description: Option<String>,
        recipients: Vec<String>,
    },
}

// ==========================================
// NotificationSender - 发送端
// ==========================================
// 发送端持有无界通道, 入队不阻塞业务线程;
// 通道关闭降级为 warn, 调用方不感知。
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<NotificationMessage>,
}

impl NotificationSender {
    /// 创建通道, 返回发送端与接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 投递通知（尽力而为）
    pub fn send(&self, message: NotificationMessage) {
        if self.tx.send(message).is_err() {
            warn!("通知通道已关闭, 本条通知被丢弃");
        }
    }
}

// ==========================================
// Notifier - 通知出口
// ==========================================
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError>;
}

/// 日志通知器: 把通知写入结构化日志
///
/// 外围未接入邮件网关时的默认出口。
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        match message {
            NotificationMessage::LowStock {
                sku,
                product_name,
                current_quantity,
                threshold,
                recipients,
            } => {
                info!(
                    sku = %sku,
                    product_name = %product_name,
                    current_quantity,
                    threshold,
                    recipients = %recipients.join(","),
                    "低库存预警通知"
                );
            }
            NotificationMessage::ThresholdChanged {
                sku,
                product_name,
                old_threshold,
                new_threshold,
                actor_description,
                recipients,
            } => {
                info!(
                    sku = %sku,
                    product_name = %product_name,
                    old_threshold = ?old_threshold,
                    new_threshold,
                    actor = %actor_description.as_deref().unwrap_or("系统"),
                    recipients = %recipients.join(","),
                    "阈值变更通知"
                );
            }
        }
        Ok(())
    }
}

// ==========================================
// NotificationDispatcher - 投递循环
// ==========================================
pub struct NotificationDispatcher {
    rx: mpsc::UnboundedReceiver<NotificationMessage>,
    notifier: std::sync::Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(
        rx: mpsc::UnboundedReceiver<NotificationMessage>,
        notifier: std::sync::Arc<dyn Notifier>,
    ) -> Self {
        Self { rx, notifier }
    }

    /// 消费通知直到所有发送端关闭
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            if let Err(e) = self.notifier.notify(&message).await {
                error!(error = %e, "通知投递失败");
            }
        }
        info!("通知投递循环退出");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_receiver_dropped_does_not_panic() {
        let (sender, rx) = NotificationSender::channel();
        drop(rx);
        sender.send(NotificationMessage::LowStock {
            sku: "SKU-000001".to_string(),
            product_name: "螺丝".to_string(),
            current_quantity: 2,
            threshold: 10,
            recipients: vec![],
        });
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_messages() {
        let (sender, rx) = NotificationSender::channel();
        let dispatcher = NotificationDispatcher::new(rx, std::sync::Arc::new(LogNotifier));

        sender.send(NotificationMessage::ThresholdChanged {
            sku: "SKU-000001".to_string(),
            product_name: "螺丝".to_string(),
            old_threshold: Some(10),
            new_threshold: 20,
            actor_description: Some("测 试 (admin@example.com)".to_string()),
            recipients: vec!["admin@example.com".to_string()],
        });
        drop(sender);

        // 发送端全部关闭后 run 正常结束
        dispatcher.run().await;
    }
}
