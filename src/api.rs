use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    builder::Notification,
    error::{NotifierError, Result},
};

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    /// 已停止
    Stopped,
    /// 播放中
    Playing,
    /// 已暂停
    Paused,
    /// 缓冲中
    Buffering,
}

/// 媒体会话某一时刻的播放状态快照。
///
/// 每次回调都按值复制，不做任何合并。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    /// 当前的播放状态。
    pub status: PlaybackStatus,
    /// 播放位置（毫秒）。小于 0 表示位置未知。
    pub position_ms: i64,
    /// `position_ms` 被报告时的时间戳（Unix 毫秒）。
    pub updated_at_ms: i64,
}

impl PlaybackState {
    /// 位置未知时使用的哨兵值。
    pub const POSITION_UNKNOWN: i64 = -1;

    /// 构造一个播放状态快照，报告时间取当前时间。
    pub fn new(status: PlaybackStatus, position_ms: i64) -> Self {
        Self {
            status,
            position_ms,
            updated_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// 播放位置是否已知。
    pub fn has_position(&self) -> bool {
        self.position_ms >= 0
    }
}

/// 解码后的封面位图。
///
/// 内部以 `Arc` 共享，克隆开销很低。
#[derive(Clone)]
pub struct Artwork(Arc<RgbaImage>);

impl Artwork {
    /// 用一张 RGBA 图片创建封面。
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    /// 宽度（像素）。
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// 高度（像素）。
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// 底层图片数据。
    pub fn image(&self) -> &RgbaImage {
        &self.0
    }
}

impl PartialEq for Artwork {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Artwork({}x{})", self.width(), self.height())
    }
}

/// 当前曲目的元数据快照。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaMetadata {
    /// 曲目标题。
    pub title: Option<String>,
    /// 副标题，通常是艺术家或专辑。
    pub subtitle: Option<String>,
    /// 会话直接提供的封面位图。
    pub icon_bitmap: Option<Artwork>,
    /// 封面的引用地址。仅在没有位图时才会去获取。
    pub icon_uri: Option<String>,
}

impl MediaMetadata {
    /// 当前需要异步获取的封面地址。
    ///
    /// 只有在没有位图、但提供了 URI 时才返回 `Some`。
    pub fn pending_artwork_uri(&self) -> Option<&str> {
        match (&self.icon_bitmap, &self.icon_uri) {
            (None, Some(uri)) => Some(uri.as_str()),
            _ => None,
        }
    }
}

/// 外部媒体会话的身份标识。
///
/// 宿主可能随时替换会话，组件通过比较标识来检测变化。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    /// 创建一个会话标识。
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 标识的字符串形式。
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 发送给媒体会话的传输控制命令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCommand {
    /// 暂停播放。
    Pause,
    /// 开始或恢复播放。
    Play,
    /// 跳到下一首。
    SkipToNext,
    /// 跳到上一首。
    SkipToPrevious,
}

/// 发送给通知后台服务的命令。
#[derive(Debug, Clone)]
pub enum NotifierCommand {
    /// 显示通知并开始跟踪会话。已启动时无效果。
    StartNotification,
    /// 移除通知并停止跟踪会话。已停止时无效果。
    StopNotification,
    /// 宿主收到的一个广播动作（例如用户点击了通知上的按钮）。
    Intent(String),
    /// 重新查询当前会话标识，必要时重新订阅。
    RefreshSession,
    /// 请求关闭整个后台线程。
    Shutdown,
}

/// 从通知后台服务接收的事件。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationUpdate {
    /// 通知已被提交给宿主。
    Posted {
        /// 本次提交是否把通知提升为前台通知。
        promoted: bool,
        /// 提交的通知内容。
        notification: Notification,
    },
    /// 通知已被隐藏。
    Hidden,
    /// 报告一个非致命的运行时诊断信息。
    Diagnostic(DiagnosticInfo),
}

/// 与后台服务交互的控制器。
#[derive(Clone)]
pub struct NotificationController {
    /// 用于向后台服务发送 `NotifierCommand` 的通道发送端。
    pub command_tx: mpsc::Sender<NotifierCommand>,
}

impl NotificationController {
    /// 显示通知并开始跟踪会话。
    pub async fn start_notification(&self) -> Result<()> {
        self.send(NotifierCommand::StartNotification).await
    }

    /// 移除通知并停止跟踪会话。
    pub async fn stop_notification(&self) -> Result<()> {
        self.send(NotifierCommand::StopNotification).await
    }

    /// 通知后台服务会话可能已被替换。
    pub async fn refresh_session(&self) -> Result<()> {
        self.send(NotifierCommand::RefreshSession).await
    }

    /// 转发宿主收到的广播动作。
    ///
    /// 广播回调通常是同步的，所以这里使用非阻塞发送。
    pub fn dispatch_intent(&self, action: impl Into<String>) -> Result<()> {
        self.command_tx
            .try_send(NotifierCommand::Intent(action.into()))
            .map_err(NotifierError::from)
    }

    /// 终止后台线程。
    pub async fn shutdown(&self) -> Result<()> {
        self.send(NotifierCommand::Shutdown).await
    }

    async fn send(&self, command: NotifierCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(NotifierError::from)
    }
}

/// 诊断信息的严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    /// 警告
    Warning,
    /// 错误
    Error,
}

/// 封装一条诊断信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    /// 严重级别。
    pub level: DiagnosticLevel,
    /// 描述信息。
    pub message: String,
    /// 产生时间。
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticInfo {
    pub(crate) fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
