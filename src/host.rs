//! 宿主平台需要实现的接口。
//!
//! 媒体会话和通知栏都归宿主所有，本库只通过这里的 trait 与它们交互。

use std::{future::Future, sync::Arc};

use chrono::Utc;

use crate::{
    actions::NotificationAction,
    api::{Artwork, MediaMetadata, PlaybackState, SessionToken, TransportCommand},
    builder::Notification,
    error::{ArtworkError, HostError},
    session::{CallbackId, SessionEventSink},
};

/// 宿主服务：提供当前会话，并负责真正显示或移除通知。
pub trait NotificationHost: Send + Sync + 'static {
    /// 当前媒体会话的标识。没有会话时返回 `None`。
    fn session_token(&self) -> Option<SessionToken>;

    /// 为指定会话创建一个控制器。
    fn media_controller(&self, token: &SessionToken) -> Arc<dyn MediaController>;

    /// 注册广播接收器，监听给定的广播动作。
    fn register_receiver(&self, intent_actions: &[String]) -> Result<(), HostError>;

    /// 注销广播接收器。
    ///
    /// 接收器未注册时应返回 [`HostError::ReceiverNotRegistered`]。
    fn unregister_receiver(&self) -> Result<(), HostError>;

    /// 以前台通知的形式显示通知，使服务常驻。
    fn start_foreground(&self, id: i32, notification: &Notification) -> Result<(), HostError>;

    /// 原地更新已显示的通知。
    fn notify(&self, id: i32, notification: &Notification) -> Result<(), HostError>;

    /// 退出前台状态。`remove_notification` 为真时同时移除通知。
    fn stop_foreground(&self, remove_notification: bool);

    /// 当前时间（Unix 毫秒），用于计算播放计时器的起点。
    fn current_time_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 某个媒体会话的控制器。
pub trait MediaController: Send + Sync {
    /// 订阅会话回调，返回用于注销的 ID。
    fn register_callback(&self, sink: SessionEventSink) -> CallbackId;

    /// 注销之前的订阅。
    fn unregister_callback(&self, id: CallbackId);

    /// 当前的元数据快照。
    fn metadata(&self) -> Option<MediaMetadata>;

    /// 当前的播放状态快照。
    fn playback_state(&self) -> Option<PlaybackState>;

    /// 发送一个传输控制命令。
    fn transport(&self, command: TransportCommand);
}

/// 下载并缩放封面图片。
pub trait ArtworkLoader: Send + Sync + 'static {
    /// 获取 `uri` 指向的图片，并缩放到不超过 `width` x `height`。
    fn load(
        &self,
        uri: &str,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<Artwork, ArtworkError>> + Send;
}

/// 生成需要注册的全部广播动作字符串。
pub(crate) fn intent_filter(package: &str) -> Vec<String> {
    NotificationAction::ALL
        .into_iter()
        .map(|action| action.intent_action(package))
        .collect()
}
