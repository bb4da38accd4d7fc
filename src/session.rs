use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    api::{MediaMetadata, PlaybackState, SessionToken},
    host::MediaController,
};

/// 会话回调订阅的 ID，由宿主分配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// 会话回调转换成的内部信号，带上来源会话的标识。
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionSignal {
    PlaybackStateChanged(SessionToken, Option<PlaybackState>),
    MetadataChanged(SessionToken, Option<MediaMetadata>),
    SessionDestroyed(SessionToken),
}

impl SessionSignal {
    pub(crate) fn token(&self) -> &SessionToken {
        match self {
            Self::PlaybackStateChanged(token, _)
            | Self::MetadataChanged(token, _)
            | Self::SessionDestroyed(token) => token,
        }
    }
}

/// 宿主在会话发生变化时调用的回调入口。
///
/// 可以在任意线程上调用；信号会被投递到后台事件循环中按顺序处理，不会被丢弃。
#[derive(Debug, Clone)]
pub struct SessionEventSink {
    token: SessionToken,
    tx: UnboundedSender<SessionSignal>,
}

impl SessionEventSink {
    pub(crate) fn new(token: SessionToken, tx: UnboundedSender<SessionSignal>) -> Self {
        Self { token, tx }
    }

    /// 该回调所属的会话。
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// 播放状态已变化。
    pub fn playback_state_changed(&self, state: Option<PlaybackState>) {
        self.dispatch(SessionSignal::PlaybackStateChanged(self.token.clone(), state));
    }

    /// 元数据已变化。
    pub fn metadata_changed(&self, metadata: Option<MediaMetadata>) {
        self.dispatch(SessionSignal::MetadataChanged(self.token.clone(), metadata));
    }

    /// 会话已被销毁，宿主可能已经创建了新会话。
    pub fn session_destroyed(&self) {
        self.dispatch(SessionSignal::SessionDestroyed(self.token.clone()));
    }

    fn dispatch(&self, signal: SessionSignal) {
        if self.tx.send(signal).is_err() {
            log::debug!("[Session] 事件通道已关闭，会话 {} 的信号被忽略。", self.token);
        }
    }
}

/// RAII Guard，持有对一个会话的回调订阅。
///
/// 被 drop 时自动注销回调。
pub(crate) struct SessionSubscription {
    controller: Arc<dyn MediaController>,
    callback_id: CallbackId,
}

impl SessionSubscription {
    pub(crate) fn new(
        controller: Arc<dyn MediaController>,
        token: &SessionToken,
        tx: &UnboundedSender<SessionSignal>,
    ) -> Self {
        let callback_id =
            controller.register_callback(SessionEventSink::new(token.clone(), tx.clone()));
        log::trace!("[Session] 已订阅会话 {token} 的回调 ({callback_id:?})。");
        Self {
            controller,
            callback_id,
        }
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        log::trace!("[Session] 注销会话回调 ({:?})。", self.callback_id);
        self.controller.unregister_callback(self.callback_id);
    }
}
