use serde::Serialize;

use crate::{api::TransportCommand, config::ActionLabels};

/// 通知上按钮使用的图标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionIcon {
    /// 播放图标。
    Play,
    /// 暂停图标。
    Pause,
    /// 上一首图标。
    Previous,
    /// 下一首图标。
    Next,
}

impl ActionIcon {
    /// 图标在宿主平台上的资源名。
    pub fn resource_name(self) -> &'static str {
        match self {
            Self::Play => "ic_media_play",
            Self::Pause => "ic_media_pause",
            Self::Previous => "ic_media_previous",
            Self::Next => "ic_media_next",
        }
    }
}

/// 用户可以从通知上触发的四个固定动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotificationAction {
    /// 暂停。
    Pause,
    /// 播放。
    Play,
    /// 下一首。
    Next,
    /// 上一首。
    Previous,
}

impl NotificationAction {
    /// 需要注册广播接收器的全部动作。
    pub const ALL: [Self; 4] = [Self::Next, Self::Pause, Self::Play, Self::Previous];

    fn suffix(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Play => "play",
            Self::Next => "next",
            Self::Previous => "prev",
        }
    }

    /// 该动作对应的广播动作字符串，例如 `"com.example.player.pause"`。
    pub fn intent_action(self, package: &str) -> String {
        format!("{package}.{}", self.suffix())
    }

    /// 解析一个广播动作字符串。未知动作返回 `None`。
    pub fn from_intent(action: &str, package: &str) -> Option<Self> {
        let suffix = action.strip_prefix(package)?.strip_prefix('.')?;
        Self::ALL.into_iter().find(|a| a.suffix() == suffix)
    }

    /// 该动作要发送给媒体会话的传输控制命令。
    pub fn transport_command(self) -> TransportCommand {
        match self {
            Self::Pause => TransportCommand::Pause,
            Self::Play => TransportCommand::Play,
            Self::Next => TransportCommand::SkipToNext,
            Self::Previous => TransportCommand::SkipToPrevious,
        }
    }

    /// 按钮图标。
    pub fn icon(self) -> ActionIcon {
        match self {
            Self::Pause => ActionIcon::Pause,
            Self::Play => ActionIcon::Play,
            Self::Next => ActionIcon::Next,
            Self::Previous => ActionIcon::Previous,
        }
    }

    /// 按钮文字。
    pub fn label(self, labels: &ActionLabels) -> &str {
        match self {
            Self::Pause => &labels.pause,
            Self::Play => &labels.play,
            Self::Next => &labels.next,
            Self::Previous => &labels.previous,
        }
    }
}
