#![warn(missing_docs)]

//! 一个将媒体播放会话状态同步到常驻系统通知的 Rust 库。
//!
//! `media-notification` 跟踪一个由宿主平台持有的媒体会话，把它的元数据和播放状态
//! 实时反映到一条通知上，并把用户在通知上的操作转发回会话的传输控制。
//!
//! ## 核心功能
//!
//! * **会话跟踪**: 订阅会话的播放状态、元数据和销毁回调；会话被替换时自动重新订阅。
//! * **通知渲染**: 标题、副标题、封面、播放/暂停按钮以及播放计时器。首次渲染时
//!   提升为前台通知，之后原地更新。
//! * **动作路由**: 播放、暂停、上一首、下一首四个固定动作映射到会话的传输控制。
//! * **封面获取**: 元数据只提供封面地址时，在后台下载并缩放图片；结果过期则直接丢弃。
//! * **异步事件驱动**: 所有处理都在一个独立的后台线程中串行进行，宿主回调不会被阻塞。
//!
//! ## 使用方法
//!
//! 1.  为你的平台实现 [`NotificationHost`] 和 [`MediaController`]。
//! 2.  调用 [`NotificationManager::start()`]，得到一个 [`NotificationController`]
//!     和一个 `mpsc::Receiver<NotificationUpdate>`。
//! 3.  通过控制器启动或停止通知，并把宿主收到的广播动作交给
//!     [`NotificationController::dispatch_intent()`]。
//! 4.  退出前调用 [`NotificationController::shutdown()`] 关闭后台线程。
//!
//! ## 示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_notification::{
//!     HttpArtworkLoader, NotificationConfig, NotificationHost, NotificationManager,
//!     NotificationUpdate,
//! };
//!
//! async fn run(host: Arc<impl NotificationHost>) -> Result<(), Box<dyn std::error::Error>> {
//!     let (controller, mut update_rx) = NotificationManager::start(
//!         host,
//!         HttpArtworkLoader::new(),
//!         NotificationConfig::default(),
//!     )?;
//!
//!     let update_task = tokio::spawn(async move {
//!         while let Some(update) = update_rx.recv().await {
//!             if let NotificationUpdate::Posted { notification, .. } = update {
//!                 println!("通知已更新: {:?}", notification.title);
//!             }
//!         }
//!     });
//!
//!     controller.start_notification().await?;
//!     // ...
//!     controller.stop_notification().await?;
//!     controller.shutdown().await?;
//!     update_task.await?;
//!     Ok(())
//! }
//! ```

mod actions;
mod api;
mod builder;
mod config;
mod error;
mod host;
mod loader;
mod notifier;
mod session;
mod tasks;
mod worker;

pub use actions::{ActionIcon, NotificationAction};
pub use api::{
    Artwork, DiagnosticInfo, DiagnosticLevel, MediaMetadata, NotificationController,
    NotificationUpdate, NotifierCommand, PlaybackState, PlaybackStatus, SessionToken,
    TransportCommand,
};
pub use builder::{ActionSlot, MediaStyle, Notification, NotificationBuilder, Visibility};
pub use config::{ActionLabels, NotificationConfig};
pub use error::{ArtworkError, HostError, NotifierError, Result};
pub use host::{ArtworkLoader, MediaController, NotificationHost};
pub use loader::{HttpArtworkLoader, MAX_ARTWORK_SIZE_BYTES, rescale};
pub use session::{CallbackId, SessionEventSink};

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// 按通知 ID 记录正在运行的后台线程。
static WORKER_HANDLES: LazyLock<Mutex<HashMap<i32, JoinHandle<()>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// `NotificationManager` 是本库的静态入口点。
pub struct NotificationManager;

impl NotificationManager {
    /// 启动通知后台服务，并返回一个控制器和事件接收器。
    ///
    /// 每个通知 ID 同一时间只能有一个后台服务。
    ///
    /// # 返回
    /// - `Ok((controller, update_rx))`: 成功启动后，返回一个元组：
    ///   - `controller`: 一个 [`NotificationController`]，用于向后台服务发送命令。
    ///   - `update_rx`: 一个 `mpsc::Receiver<NotificationUpdate>`，用于接收通知事件。
    /// - `Err(NotifierError)`: 如果后台线程无法启动，或同一通知 ID 的服务已在运行。
    pub fn start<H, L>(
        host: Arc<H>,
        loader: L,
        config: NotificationConfig,
    ) -> Result<(NotificationController, mpsc::Receiver<NotificationUpdate>)>
    where
        H: NotificationHost,
        L: ArtworkLoader,
    {
        let id = config.notification_id;
        let mut handles = WORKER_HANDLES.lock()?;
        if let Some(handle) = handles.get(&id)
            && !handle.is_finished()
        {
            return Err(NotifierError::AlreadyRunning(id));
        }

        let capacity = config.channel_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel::<NotifierCommand>(capacity);
        let (update_tx, update_rx) = mpsc::channel::<NotificationUpdate>(capacity);

        let new_handle =
            worker::start_notification_worker_thread(host, loader, config, command_rx, update_tx)?;
        handles.insert(id, new_handle);

        Ok((NotificationController { command_tx }, update_rx))
    }
}
