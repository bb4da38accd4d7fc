use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use media_notification::{
    CallbackId, HostError, HttpArtworkLoader, MediaController, MediaMetadata, Notification,
    NotificationAction, NotificationConfig, NotificationController, NotificationHost,
    NotificationManager, NotificationUpdate, NotifierError, PlaybackState, PlaybackStatus,
    SessionEventSink, SessionToken, TransportCommand,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

type CommandReceiver = mpsc::UnboundedReceiver<TransportCommand>;

/// 模拟的播放器会话，由测试直接驱动回调。
struct VirtualPlayer {
    next_id: AtomicU64,
    sinks: Mutex<Vec<(CallbackId, SessionEventSink)>>,
    metadata: Mutex<Option<MediaMetadata>>,
    state: Mutex<Option<PlaybackState>>,
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl VirtualPlayer {
    fn new() -> (Arc<Self>, CommandReceiver) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let player = Arc::new(Self {
            next_id: AtomicU64::new(1),
            sinks: Mutex::new(Vec::new()),
            metadata: Mutex::new(None),
            state: Mutex::new(None),
            command_tx,
        });
        (player, command_rx)
    }

    fn set_song(&self, title: &str, artist: &str, icon_uri: Option<String>) {
        let metadata = Some(MediaMetadata {
            title: Some(title.to_string()),
            subtitle: Some(artist.to_string()),
            icon_bitmap: None,
            icon_uri,
        });
        self.metadata.lock().unwrap().clone_from(&metadata);
        for (_, sink) in self.sinks.lock().unwrap().iter() {
            sink.metadata_changed(metadata.clone());
        }
    }

    fn set_status(&self, status: PlaybackStatus, position_ms: i64) {
        let state = Some(PlaybackState::new(status, position_ms));
        *self.state.lock().unwrap() = state;
        for (_, sink) in self.sinks.lock().unwrap().iter() {
            sink.playback_state_changed(state);
        }
    }

    fn destroy(&self) {
        for (_, sink) in self.sinks.lock().unwrap().iter() {
            sink.session_destroyed();
        }
    }

    fn subscriber_count(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }
}

impl MediaController for VirtualPlayer {
    fn register_callback(&self, sink: SessionEventSink) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::SeqCst));
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
        let _ = self.command_tx.send(command);
    }
}

/// 模拟的宿主服务。
#[derive(Default)]
struct VirtualHost {
    token: Mutex<Option<SessionToken>>,
    players: Mutex<HashMap<String, Arc<VirtualPlayer>>>,
    receiver: Mutex<Option<Vec<String>>>,
    posted: Mutex<Option<Notification>>,
}

impl VirtualHost {
    fn with_player(id: &str) -> (Arc<Self>, Arc<VirtualPlayer>, CommandReceiver) {
        let host = Arc::new(Self::default());
        let (player, command_rx) = host.add_player(id);
        *host.token.lock().unwrap() = Some(SessionToken::new(id));
        (host, player, command_rx)
    }

    fn add_player(&self, id: &str) -> (Arc<VirtualPlayer>, CommandReceiver) {
        let (player, command_rx) = VirtualPlayer::new();
        self.players
            .lock()
            .unwrap()
            .insert(id.to_string(), player.clone());
        (player, command_rx)
    }

    fn switch_session(&self, id: &str) {
        *self.token.lock().unwrap() = Some(SessionToken::new(id));
    }

    fn registered_actions(&self) -> Option<Vec<String>> {
        self.receiver.lock().unwrap().clone()
    }
}

impl NotificationHost for VirtualHost {
    fn session_token(&self) -> Option<SessionToken> {
        self.token.lock().unwrap().clone()
    }

    fn media_controller(&self, token: &SessionToken) -> Arc<dyn MediaController> {
        let players = self.players.lock().unwrap();
        players[token.as_str()].clone()
    }

    fn register_receiver(&self, intent_actions: &[String]) -> Result<(), HostError> {
        *self.receiver.lock().unwrap() = Some(intent_actions.to_vec());
        Ok(())
    }

    fn unregister_receiver(&self) -> Result<(), HostError> {
        match self.receiver.lock().unwrap().take() {
            Some(_) => Ok(()),
            None => Err(HostError::ReceiverNotRegistered),
        }
    }

    fn start_foreground(&self, _id: i32, notification: &Notification) -> Result<(), HostError> {
        *self.posted.lock().unwrap() = Some(notification.clone());
        Ok(())
    }

    fn notify(&self, id: i32, notification: &Notification) -> Result<(), HostError> {
        self.start_foreground(id, notification)
    }

    fn stop_foreground(&self, _remove_notification: bool) {
        *self.posted.lock().unwrap() = None;
    }
}

/// 在本地端口上提供一张 PNG 封面，记录请求次数。
async fn serve_artwork(width: u32, height: u32) -> (String, Arc<AtomicUsize>) {
    let image = RgbaImage::from_pixel(width, height, Rgba([20, 120, 220, 255]));
    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut encoded, ImageFormat::Png)
        .unwrap();
    let body = Arc::new(encoded.into_inner());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_clone = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            hits_clone.fetch_add(1, Ordering::SeqCst);
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let status = if request.starts_with(b"GET /cover.png ") {
                    "200 OK"
                } else {
                    "404 Not Found"
                };
                let payload: &[u8] = if status == "200 OK" { body.as_slice() } else { b"" };
                let header = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    payload.len()
                );
                let _ = stream.write_all(header.as_bytes()).await;
                let _ = stream.write_all(payload).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), hits)
}

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .is_test(true)
        .try_init();
}

fn config(notification_id: i32) -> NotificationConfig {
    NotificationConfig {
        notification_id,
        package: "com.example.player".to_string(),
        ..NotificationConfig::default()
    }
}

/// 等待第一条满足条件的更新，跳过其余的。
async fn wait_for_update(
    update_rx: &mut mpsc::Receiver<NotificationUpdate>,
    mut predicate: impl FnMut(&NotificationUpdate) -> bool,
) -> NotificationUpdate {
    timeout(WAIT, async {
        loop {
            let update = update_rx.recv().await.expect("更新通道意外关闭");
            if predicate(&update) {
                return update;
            }
        }
    })
    .await
    .expect("等待通知更新超时")
}

async fn wait_for_post(update_rx: &mut mpsc::Receiver<NotificationUpdate>) -> (bool, Notification) {
    wait_for_update(update_rx, |u| matches!(u, NotificationUpdate::Posted { .. }))
        .await
        .into_posted()
}

async fn shutdown(controller: NotificationController, mut update_rx: mpsc::Receiver<NotificationUpdate>) {
    controller.shutdown().await.unwrap();
    // 后台线程退出后更新通道会关闭
    timeout(WAIT, async { while update_rx.recv().await.is_some() {} })
        .await
        .expect("后台线程未能按时退出");
}

#[tokio::test]
async fn test_e2e_track_updates_and_transport_controls() {
    init_logger();

    let (host, player, mut command_rx) = VirtualHost::with_player("player-1");
    player.set_song("Song A", "Artist A", None);
    player.set_status(PlaybackStatus::Paused, 30_000);

    let (controller, mut update_rx) =
        NotificationManager::start(host.clone(), HttpArtworkLoader::new(), config(9001)).unwrap();
    controller.start_notification().await.unwrap();

    let (promoted, notification) = wait_for_post(&mut update_rx).await;
    assert!(promoted, "首次提交应当提升为前台通知");
    assert_eq!(notification.title.as_deref(), Some("Song A"));
    assert_eq!(notification.text.as_deref(), Some("Artist A"));
    assert_eq!(notification.actions[1].action, NotificationAction::Play);
    assert!(notification.show_when);
    assert_eq!(player.subscriber_count(), 1);
    assert_eq!(host.registered_actions().map(|a| a.len()), Some(4));

    player.set_status(PlaybackStatus::Playing, 31_000);
    let (promoted, notification) = wait_for_post(&mut update_rx).await;
    assert!(!promoted);
    assert_eq!(notification.actions[1].action, NotificationAction::Pause);

    player.set_song("Song B", "Artist B", None);
    let (_, notification) = wait_for_post(&mut update_rx).await;
    assert_eq!(notification.title.as_deref(), Some("Song B"));

    controller.dispatch_intent("com.example.player.pause").unwrap();
    controller.dispatch_intent("com.example.player.next").unwrap();
    controller.dispatch_intent("com.other.app.play").unwrap();
    let first = timeout(WAIT, command_rx.recv()).await.unwrap();
    let second = timeout(WAIT, command_rx.recv()).await.unwrap();
    assert_eq!(first, Some(TransportCommand::Pause));
    assert_eq!(second, Some(TransportCommand::SkipToNext));

    controller.stop_notification().await.unwrap();
    wait_for_update(&mut update_rx, |u| matches!(u, NotificationUpdate::Hidden)).await;
    assert_eq!(player.subscriber_count(), 0);
    assert!(host.registered_actions().is_none());
    assert!(host.posted.lock().unwrap().is_none());

    shutdown(controller, update_rx).await;
}

#[tokio::test]
async fn test_e2e_artwork_is_fetched_once_and_applied() {
    init_logger();

    let (base_url, hits) = serve_artwork(256, 128).await;
    let (host, player, _command_rx) = VirtualHost::with_player("player-1");
    player.set_song("Song A", "Artist A", Some(format!("{base_url}/cover.png")));
    player.set_status(PlaybackStatus::Playing, 0);

    let (controller, mut update_rx) =
        NotificationManager::start(host.clone(), HttpArtworkLoader::new(), config(9002)).unwrap();
    controller.start_notification().await.unwrap();

    let (_, first) = wait_for_post(&mut update_rx).await;
    assert!(first.large_icon.is_none(), "封面尚未获取时不应有大图标");

    let notification = timeout(WAIT, async {
        loop {
            let (_, notification) = wait_for_post(&mut update_rx).await;
            if notification.large_icon.is_some() {
                return notification;
            }
        }
    })
    .await
    .expect("封面未能按时应用");
    let artwork = notification.large_icon.unwrap();
    assert_eq!((artwork.width(), artwork.height()), (128, 64));

    // 大图标只取自元数据本身；同一封面地址不会再次获取
    player.set_status(PlaybackStatus::Paused, 500);
    player.set_song("Song A", "Artist A (Live)", Some(format!("{base_url}/cover.png")));
    let (_, notification) = wait_for_update(&mut update_rx, |u| {
        matches!(u, NotificationUpdate::Posted { notification, .. }
            if notification.text.as_deref() == Some("Artist A (Live)"))
    })
    .await
    .into_posted();
    assert!(notification.large_icon.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    shutdown(controller, update_rx).await;
}

#[tokio::test]
async fn test_e2e_failed_artwork_fetch_reports_diagnostic() {
    init_logger();

    let (base_url, _hits) = serve_artwork(16, 16).await;
    let (host, player, _command_rx) = VirtualHost::with_player("player-1");
    player.set_song("Song A", "Artist A", Some(format!("{base_url}/missing.png")));
    player.set_status(PlaybackStatus::Playing, 0);

    let (controller, mut update_rx) =
        NotificationManager::start(host, HttpArtworkLoader::new(), config(9003)).unwrap();
    controller.start_notification().await.unwrap();

    let diagnostic = wait_for_update(&mut update_rx, |u| {
        matches!(u, NotificationUpdate::Diagnostic(_))
    })
    .await;
    let NotificationUpdate::Diagnostic(info) = diagnostic else {
        unreachable!();
    };
    assert!(info.message.contains("missing.png"), "诊断信息: {}", info.message);

    let json = serde_json::to_value(NotificationUpdate::Diagnostic(info)).unwrap();
    assert_eq!(json["type"], "Diagnostic");
    assert_eq!(json["payload"]["level"], "Warning");

    shutdown(controller, update_rx).await;
}

#[tokio::test]
async fn test_e2e_session_replacement_follows_new_session() {
    init_logger();

    let (host, old_player, _old_rx) = VirtualHost::with_player("player-1");
    old_player.set_song("Old Song", "Old Artist", None);
    old_player.set_status(PlaybackStatus::Playing, 0);

    let (controller, mut update_rx) =
        NotificationManager::start(host.clone(), HttpArtworkLoader::new(), config(9004)).unwrap();
    controller.start_notification().await.unwrap();
    let (_, notification) = wait_for_post(&mut update_rx).await;
    assert_eq!(notification.title.as_deref(), Some("Old Song"));

    let (new_player, mut new_rx) = host.add_player("player-2");
    host.switch_session("player-2");
    old_player.destroy();

    timeout(WAIT, async {
        while new_player.subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("新会话未被订阅");
    assert_eq!(old_player.subscriber_count(), 0);

    new_player.set_status(PlaybackStatus::Playing, 0);
    new_player.set_song("New Song", "New Artist", None);
    let (_, notification) = wait_for_update(&mut update_rx, |u| {
        matches!(u, NotificationUpdate::Posted { notification, .. }
            if notification.title.as_deref() == Some("New Song"))
    })
    .await
    .into_posted();
    let style = notification.style.unwrap();
    assert_eq!(style.session, Some(SessionToken::new("player-2")));

    controller.dispatch_intent("com.example.player.prev").unwrap();
    let command = timeout(WAIT, new_rx.recv()).await.unwrap();
    assert_eq!(command, Some(TransportCommand::SkipToPrevious));

    shutdown(controller, update_rx).await;
}

#[tokio::test]
async fn test_e2e_second_manager_for_same_id_is_rejected() {
    init_logger();

    let (host, _player, _command_rx) = VirtualHost::with_player("player-1");
    let (controller, update_rx) =
        NotificationManager::start(host.clone(), HttpArtworkLoader::new(), config(9005)).unwrap();

    let second = NotificationManager::start(host.clone(), HttpArtworkLoader::new(), config(9005));
    assert!(matches!(second, Err(NotifierError::AlreadyRunning(9005))));

    let other = NotificationManager::start(host, HttpArtworkLoader::new(), config(9006));
    let (other_controller, other_rx) = other.unwrap();

    shutdown(controller, update_rx).await;
    shutdown(other_controller, other_rx).await;
}

trait IntoPosted {
    fn into_posted(self) -> (bool, Notification);
}

impl IntoPosted for NotificationUpdate {
    fn into_posted(self) -> (bool, Notification) {
        match self {
            NotificationUpdate::Posted {
                promoted,
                notification,
            } => (promoted, notification),
            other => panic!("期望 Posted，实际为 {other:?}"),
        }
    }
}
