//! 在终端里模拟一个宿主和一个播放器，观察通知如何随会话变化。
//!
//! 输入命令：
//! - `song <标题>|<艺术家>[|<封面地址>]` 切换曲目
//! - `play` / `pause` / `next` / `prev` 模拟点击通知上的按钮
//! - `stop` / `start` 停止或重新显示通知
//! - 空行退出

use std::io::{BufRead, stdin};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};
use media_notification::{
    CallbackId, HostError, HttpArtworkLoader, MediaController, MediaMetadata, Notification,
    NotificationConfig, NotificationHost, NotificationManager, NotificationUpdate, PlaybackState,
    PlaybackStatus, SessionEventSink, SessionToken, TransportCommand,
};

struct ConsolePlayer {
    next_id: AtomicU64,
    sinks: Mutex<Vec<(CallbackId, SessionEventSink)>>,
    metadata: Mutex<Option<MediaMetadata>>,
    state: Mutex<Option<PlaybackState>>,
}

impl ConsolePlayer {
    fn set_song(&self, metadata: MediaMetadata) {
        *self.metadata.lock().unwrap() = Some(metadata.clone());
        for (_, sink) in self.sinks.lock().unwrap().iter() {
            sink.metadata_changed(Some(metadata.clone()));
        }
    }

    fn set_status(&self, status: PlaybackStatus) {
        let state = PlaybackState::new(status, 0);
        *self.state.lock().unwrap() = Some(state);
        for (_, sink) in self.sinks.lock().unwrap().iter() {
            sink.playback_state_changed(Some(state));
        }
    }
}

impl MediaController for ConsolePlayer {
    fn register_callback(&self, sink: SessionEventSink) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks.lock().unwrap().push((id, sink));
        id
    }

    fn unregister_callback(&self, id: CallbackId) {
        self.sinks.lock().unwrap().retain(|(existing, _)| *existing != id);
    }

    fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata.lock().unwrap().clone()
    }

    fn playback_state(&self) -> Option<PlaybackState> {
        *self.state.lock().unwrap()
    }

    fn transport(&self, command: TransportCommand) {
        info!("[播放器] 收到传输控制命令: {command:?}");
        match command {
            TransportCommand::Play => self.set_status(PlaybackStatus::Playing),
            TransportCommand::Pause => self.set_status(PlaybackStatus::Paused),
            TransportCommand::SkipToNext | TransportCommand::SkipToPrevious => {
                self.set_status(PlaybackStatus::Buffering);
                self.set_status(PlaybackStatus::Playing);
            }
        }
    }
}

struct ConsoleHost {
    player: Arc<ConsolePlayer>,
}

impl NotificationHost for ConsoleHost {
    fn session_token(&self) -> Option<SessionToken> {
        Some(SessionToken::new("console"))
    }

    fn media_controller(&self, _token: &SessionToken) -> Arc<dyn MediaController> {
        self.player.clone()
    }

    fn register_receiver(&self, intent_actions: &[String]) -> Result<(), HostError> {
        info!("[宿主] 注册广播接收器: {intent_actions:?}");
        Ok(())
    }

    fn unregister_receiver(&self) -> Result<(), HostError> {
        info!("[宿主] 注销广播接收器");
        Ok(())
    }

    fn start_foreground(&self, id: i32, notification: &Notification) -> Result<(), HostError> {
        info!("[宿主] 前台通知 #{id}: {}", describe(notification));
        Ok(())
    }

    fn notify(&self, id: i32, notification: &Notification) -> Result<(), HostError> {
        info!("[宿主] 更新通知 #{id}: {}", describe(notification));
        Ok(())
    }

    fn stop_foreground(&self, remove_notification: bool) {
        info!("[宿主] 退出前台 (移除通知: {remove_notification})");
    }
}

fn describe(notification: &Notification) -> String {
    let buttons: Vec<&str> = notification
        .actions
        .iter()
        .map(|slot| slot.title.as_str())
        .collect();
    format!(
        "{} - {} {:?} 封面: {:?}",
        notification.title.as_deref().unwrap_or("<无标题>"),
        notification.text.as_deref().unwrap_or("<无>"),
        buttons,
        notification.large_icon,
    )
}

fn parse_song(args: &str) -> MediaMetadata {
    let mut parts = args.split('|').map(str::trim);
    MediaMetadata {
        title: parts.next().map(str::to_string),
        subtitle: parts.next().map(str::to_string),
        icon_bitmap: None,
        icon_uri: parts.next().filter(|s| !s.is_empty()).map(str::to_string),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let player = Arc::new(ConsolePlayer {
        next_id: AtomicU64::new(1),
        sinks: Mutex::new(Vec::new()),
        metadata: Mutex::new(Some(parse_song("Demo Song|Demo Artist"))),
        state: Mutex::new(Some(PlaybackState::new(PlaybackStatus::Paused, 0))),
    });
    let host = Arc::new(ConsoleHost {
        player: player.clone(),
    });
    let config = NotificationConfig::default();
    let package = config.package.clone();

    let (controller, mut update_rx) =
        match NotificationManager::start(host, HttpArtworkLoader::new(), config) {
            Ok(started) => started,
            Err(e) => {
                error!("通知服务启动失败: {e}");
                return Err(e.into());
            }
        };

    let update_task = tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            match update {
                NotificationUpdate::Diagnostic(info) => {
                    warn!("[诊断] {:?}: {}", info.level, info.message);
                }
                NotificationUpdate::Hidden => info!("[更新] 通知已隐藏"),
                NotificationUpdate::Posted { promoted, .. } => {
                    info!("[更新] 通知已提交 (前台提升: {promoted})");
                }
            }
        }
    });

    controller.start_notification().await?;
    info!("输入 song/play/pause/next/prev/start/stop，空行退出。");

    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(8);
    std::thread::spawn(move || {
        for line in stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = line_rx.recv().await {
        let line = line.trim();
        let (command, args) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => break,
            "song" => player.set_song(parse_song(args)),
            "play" | "pause" | "next" | "prev" => {
                controller.dispatch_intent(format!("{package}.{command}"))?;
            }
            "start" => controller.start_notification().await?,
            "stop" => controller.stop_notification().await?,
            other => warn!("未知命令: {other}"),
        }
    }

    controller.shutdown().await?;
    update_task.await?;

    Ok(())
}
