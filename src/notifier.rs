//! 把媒体会话的状态同步到一条常驻通知上。
//!
//! [`MediaNotification`] 只在后台事件循环中被访问，所有方法都是同步且短小的。
//! 封面获取是唯一的异步操作：这里只发出请求，结果由事件循环投递回
//! [`MediaNotification::on_artwork_fetched`]，以请求时的 URI 作为令牌判断是否仍然有效。

use std::sync::Arc;

use tokio::sync::mpsc::{Sender as TokioSender, UnboundedSender, error::TrySendError};

use crate::{
    actions::NotificationAction,
    api::{
        DiagnosticInfo, DiagnosticLevel, MediaMetadata, NotificationUpdate,
        PlaybackState, PlaybackStatus, SessionToken,
    },
    builder::{ActionSlot, MediaStyle, NotificationBuilder, Visibility},
    config::NotificationConfig,
    error::HostError,
    host::{MediaController, NotificationHost, intent_filter},
    session::{SessionSignal, SessionSubscription},
    tasks::{ArtworkFetched, ArtworkRequest},
};

/// 播放/暂停按钮在通知中的位置，也是紧凑视图中唯一显示的按钮。
const PLAY_PAUSE_SLOT: usize = 1;

/// `MediaNotification` 向事件循环发送信号所用的通道。
pub(crate) struct NotifierChannels {
    /// 交给会话回调，用于投递会话信号。无界，每个快照都必须送达。
    pub session_tx: UnboundedSender<SessionSignal>,
    /// 封面获取请求。
    pub artwork_tx: TokioSender<ArtworkRequest>,
    /// 对外广播的更新。
    pub update_tx: TokioSender<NotificationUpdate>,
}

/// 跟踪一个媒体会话，并自动更新对应的通知。
pub(crate) struct MediaNotification<H: NotificationHost> {
    host: Arc<H>,
    config: NotificationConfig,
    channels: NotifierChannels,

    started: bool,
    receiver_registered: bool,
    /// 通知当前是否以前台通知的形式显示。
    foreground: bool,

    session_token: Option<SessionToken>,
    controller: Option<Arc<dyn MediaController>>,
    /// RAII Guard，仅在已启动时持有。
    subscription: Option<SessionSubscription>,

    playback_state: Option<PlaybackState>,
    metadata: Option<MediaMetadata>,

    builder: Option<NotificationBuilder>,
    play_pause_action: Option<ActionSlot>,
    /// 最近一次发起获取的封面地址。
    current_album_art: Option<String>,
}

impl<H: NotificationHost> MediaNotification<H> {
    pub(crate) fn new(host: Arc<H>, config: NotificationConfig, channels: NotifierChannels) -> Self {
        let mut notification = Self {
            host,
            config,
            channels,
            started: false,
            receiver_registered: false,
            foreground: false,
            session_token: None,
            controller: None,
            subscription: None,
            playback_state: None,
            metadata: None,
            builder: None,
            play_pause_action: None,
            current_album_art: None,
        };
        notification.update_session_token();
        notification
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    /// 显示通知并开始跟踪会话。已启动时不做任何事。
    pub(crate) fn start(&mut self) {
        if self.started {
            log::debug!("[MediaNotification] 通知已在运行，忽略重复的启动请求。");
            return;
        }
        log::info!("[MediaNotification] 正在启动通知...");

        self.subscribe_current_session();

        match self
            .host
            .register_receiver(&intent_filter(&self.config.package))
        {
            Ok(()) => self.receiver_registered = true,
            Err(e) => {
                log::warn!("[MediaNotification] 注册广播接收器失败: {e}");
                self.send_diagnostic(DiagnosticLevel::Warning, format!("注册广播接收器失败: {e}"));
            }
        }

        if let Some(controller) = &self.controller {
            self.metadata = controller.metadata();
            self.playback_state = controller.playback_state();
        }

        // 必须在设置 started 之后再更新通知
        self.started = true;
        self.update_notification_metadata();
    }

    /// 移除通知并停止跟踪会话。重复调用没有副作用。
    pub(crate) fn stop(&mut self) {
        if self.started {
            log::info!("[MediaNotification] 正在停止通知...");
        }
        self.started = false;
        self.subscription = None;

        if self.receiver_registered {
            self.receiver_registered = false;
            match self.host.unregister_receiver() {
                Ok(()) | Err(HostError::ReceiverNotRegistered) => {}
                Err(e) => log::warn!("[MediaNotification] 注销广播接收器失败: {e}"),
            }
        }

        self.hide();
    }

    /// 处理宿主转发来的广播动作。未知动作以及停止后到达的动作会被忽略。
    pub(crate) fn handle_intent(&self, intent: &str) {
        if !self.started {
            log::debug!("[MediaNotification] 通知已停止，忽略广播动作: {intent}");
            return;
        }
        let Some(action) = NotificationAction::from_intent(intent, &self.config.package) else {
            log::debug!("[MediaNotification] 忽略未知的广播动作: {intent}");
            return;
        };
        log::debug!("[MediaNotification] 收到广播动作 {action:?}");

        let Some(controller) = &self.controller else {
            log::warn!("[MediaNotification] 收到动作 {action:?}，但无活动会话，已忽略。");
            return;
        };
        controller.transport(action.transport_command());
    }

    pub(crate) fn handle_session_signal(&mut self, signal: SessionSignal) {
        if self.session_token.as_ref() != Some(signal.token()) {
            log::trace!(
                "[MediaNotification] 忽略来自旧会话 {} 的信号。",
                signal.token()
            );
            return;
        }

        match signal {
            SessionSignal::PlaybackStateChanged(_, state) => {
                log::debug!("[MediaNotification] 收到新的播放状态: {state:?}");
                self.playback_state = state;
                self.update_notification_playback_state();
            }
            SessionSignal::MetadataChanged(_, metadata) => {
                log::debug!("[MediaNotification] 收到新的元数据: {metadata:?}");
                self.metadata = metadata;
                self.update_notification_metadata();
            }
            SessionSignal::SessionDestroyed(token) => {
                log::info!("[MediaNotification] 会话 {token} 已销毁，正在切换到新会话。");
                self.update_session_token();
            }
        }
    }

    /// 重新查询会话标识。标识变化时注销旧会话的回调，并在已启动时订阅新会话。
    pub(crate) fn update_session_token(&mut self) {
        let fresh_token = self.host.session_token();
        if fresh_token == self.session_token {
            return;
        }
        log::debug!(
            "[MediaNotification] 会话标识变更: {:?} -> {fresh_token:?}",
            self.session_token
        );

        self.subscription = None;
        self.controller = fresh_token
            .as_ref()
            .map(|token| self.host.media_controller(token));
        self.session_token = fresh_token;

        if let Some(builder) = self.builder.as_mut() {
            builder.set_style(media_style(self.session_token.as_ref()));
        }
        if self.started {
            self.subscribe_current_session();
        }
    }

    /// 处理封面获取任务的结果。
    ///
    /// 只有当元数据仍然存在、并且当前需要的封面地址与请求时一致，才会更新通知。
    pub(crate) fn on_artwork_fetched(&mut self, fetched: ArtworkFetched) {
        let ArtworkFetched { uri, result } = fetched;
        let artwork = match result {
            Ok(artwork) => artwork,
            Err(e) => {
                log::warn!("[MediaNotification] 封面 {uri} 获取失败: {e}");
                self.send_diagnostic(DiagnosticLevel::Warning, format!("封面 {uri} 获取失败: {e}"));
                return;
            }
        };

        let desired = self
            .metadata
            .as_ref()
            .and_then(MediaMetadata::pending_artwork_uri);
        if desired != Some(uri.as_str()) {
            log::debug!("[MediaNotification] 封面 {uri} 已过期 (当前需要 {desired:?})，丢弃。");
            return;
        }

        log::debug!("[MediaNotification] 设置封面: {uri}");
        if let Some(builder) = self.builder.as_mut() {
            builder.set_large_icon(Some(artwork));
        }
        self.post();
    }

    fn subscribe_current_session(&mut self) {
        match (&self.controller, &self.session_token) {
            (Some(controller), Some(token)) => {
                self.subscription = Some(SessionSubscription::new(
                    controller.clone(),
                    token,
                    &self.channels.session_tx,
                ));
            }
            _ => log::debug!("[MediaNotification] 当前没有媒体会话，暂不订阅。"),
        }
    }

    fn update_notification_metadata(&mut self) {
        let Some(metadata) = self.metadata.clone() else {
            log::trace!("[MediaNotification] 没有元数据，跳过更新。");
            return;
        };
        if !self.started || self.playback_state.is_none() {
            self.hide();
            return;
        }

        self.update_play_pause_action();

        if self.builder.is_none() {
            log::debug!("[MediaNotification] 首次渲染，创建通知构建器。");
            self.builder = Some(self.base_builder());
        }

        let art = metadata.icon_bitmap.clone();

        if let Some(builder) = self.builder.as_mut() {
            builder
                .set_content_title(metadata.title.clone())
                .set_content_text(metadata.subtitle.clone())
                .set_large_icon(art.clone());
        }

        self.update_notification_playback_state();

        if art.is_none()
            && let Some(uri) = metadata.icon_uri
            && self.current_album_art.as_deref() != Some(uri.as_str())
        {
            self.current_album_art = Some(uri.clone());
            self.request_artwork(uri);
        }
    }

    fn update_notification_playback_state(&mut self) {
        let Some(state) = self.playback_state.filter(|_| self.started) else {
            log::debug!("[MediaNotification] 播放状态为空或通知已停止，取消通知。");
            self.hide();
            return;
        };
        if self.builder.is_none() {
            log::debug!("[MediaNotification] 尚未创建通知构建器，忽略播放状态更新。");
            return;
        }

        self.update_play_pause_action();
        let now = self.host.current_time_millis();

        if let Some(builder) = self.builder.as_mut() {
            if state.has_position() {
                log::trace!(
                    "[MediaNotification] 更新播放位置: {} 秒",
                    state.position_ms / 1000
                );
                builder
                    .set_when(now - state.position_ms)
                    .set_show_when(true)
                    .set_uses_chronometer(true);
            } else {
                log::trace!("[MediaNotification] 隐藏播放位置。");
                builder
                    .set_when(0)
                    .set_show_when(false)
                    .set_uses_chronometer(false);
            }
            if let Some(slot) = &self.play_pause_action {
                builder.set_action(PLAY_PAUSE_SLOT, slot);
            }
        }

        self.post();
    }

    fn update_play_pause_action(&mut self) {
        let action = match self.playback_state.map(|s| s.status) {
            Some(PlaybackStatus::Playing) => NotificationAction::Pause,
            _ => NotificationAction::Play,
        };
        match self.play_pause_action.as_mut() {
            Some(slot) => slot.retarget(action, &self.config),
            None => self.play_pause_action = Some(ActionSlot::new(action, &self.config)),
        }
    }

    fn base_builder(&self) -> NotificationBuilder {
        let play_pause = self
            .play_pause_action
            .clone()
            .unwrap_or_else(|| ActionSlot::new(NotificationAction::Play, &self.config));

        let mut builder = NotificationBuilder::new();
        builder
            .add_action(ActionSlot::new(NotificationAction::Previous, &self.config))
            .add_action(play_pause)
            .add_action(ActionSlot::new(NotificationAction::Next, &self.config))
            .set_style(media_style(self.session_token.as_ref()))
            .set_color(self.config.color)
            .set_small_icon(self.config.small_icon.clone())
            .set_visibility(Visibility::Public)
            .set_uses_chronometer(true);
        builder
    }

    fn post(&mut self) {
        if !self.started {
            return;
        }
        let Some(builder) = &self.builder else {
            return;
        };

        let notification = builder.build();
        let id = self.config.notification_id;
        let promoted = !self.foreground;
        let result = if promoted {
            self.host.start_foreground(id, &notification)
        } else {
            self.host.notify(id, &notification)
        };

        match result {
            Ok(()) => {
                if promoted {
                    log::info!("[MediaNotification] 通知 {id} 已提升为前台通知。");
                    self.foreground = true;
                }
                self.send_update(NotificationUpdate::Posted {
                    promoted,
                    notification,
                });
            }
            Err(e) => {
                log::warn!("[MediaNotification] 提交通知 {id} 失败: {e}");
                self.send_diagnostic(DiagnosticLevel::Error, format!("提交通知失败: {e}"));
            }
        }
    }

    fn hide(&mut self) {
        if !self.foreground {
            return;
        }
        self.host.stop_foreground(true);
        self.foreground = false;
        self.send_update(NotificationUpdate::Hidden);
    }

    fn request_artwork(&self, uri: String) {
        log::debug!("[MediaNotification] 开始异步获取封面: {uri}");
        let request = ArtworkRequest {
            uri,
            width: self.config.artwork_width,
            height: self.config.artwork_height,
        };
        if let Err(e) = self.channels.artwork_tx.try_send(request) {
            log::warn!("[MediaNotification] 发送封面获取请求失败: {e}");
        }
    }

    fn send_diagnostic(&self, level: DiagnosticLevel, message: impl Into<String>) {
        self.send_update(NotificationUpdate::Diagnostic(DiagnosticInfo::new(
            level, message,
        )));
    }

    fn send_update(&self, update: NotificationUpdate) {
        match self.channels.update_tx.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("[MediaNotification] 更新通道已满，丢弃一条更新。");
            }
            Err(TrySendError::Closed(_)) => {
                log::trace!("[MediaNotification] 更新通道已关闭。");
            }
        }
    }
}

fn media_style(session: Option<&SessionToken>) -> MediaStyle {
    MediaStyle {
        compact_actions: vec![PLAY_PAUSE_SLOT],
        session: session.cloned(),
    }
}
