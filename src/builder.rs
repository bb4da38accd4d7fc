use serde::Serialize;

use crate::{
    actions::{ActionIcon, NotificationAction},
    api::{Artwork, SessionToken},
    config::NotificationConfig,
};

/// 通知上的一个按钮。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSlot {
    /// 按钮图标。
    pub icon: ActionIcon,
    /// 按钮文字。
    pub title: String,
    /// 点击按钮时触发的动作。
    pub action: NotificationAction,
    /// 点击按钮时宿主需要广播的动作字符串。
    pub intent: String,
}

impl ActionSlot {
    /// 根据配置为一个动作创建按钮。
    pub fn new(action: NotificationAction, config: &NotificationConfig) -> Self {
        Self {
            icon: action.icon(),
            title: action.label(&config.labels).to_string(),
            action,
            intent: action.intent_action(&config.package),
        }
    }

    /// 原地把按钮切换到另一个动作。
    pub fn retarget(&mut self, action: NotificationAction, config: &NotificationConfig) {
        if self.action == action {
            return;
        }
        self.icon = action.icon();
        self.title.clear();
        self.title.push_str(action.label(&config.labels));
        self.action = action;
        self.intent = action.intent_action(&config.package);
    }
}

/// 通知在锁屏上的可见性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Visibility {
    /// 锁屏上隐藏敏感内容。
    #[default]
    Private,
    /// 锁屏上完整显示。
    Public,
    /// 锁屏上完全不显示。
    Secret,
}

/// 媒体样式：紧凑视图中显示的按钮，以及关联的媒体会话。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MediaStyle {
    /// 紧凑视图中显示的按钮下标。
    pub compact_actions: Vec<usize>,
    /// 关联的媒体会话。
    pub session: Option<SessionToken>,
}

/// 可以交给宿主渲染的通知。
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Notification {
    /// 标题。
    pub title: Option<String>,
    /// 正文。
    pub text: Option<String>,
    /// 大图标（封面）。
    #[serde(skip)]
    pub large_icon: Option<Artwork>,
    /// 状态栏小图标的资源名。
    pub small_icon: String,
    /// 强调色 (ARGB)。
    pub color: u32,
    /// 锁屏可见性。
    pub visibility: Visibility,
    /// 按钮，按显示顺序排列。
    pub actions: Vec<ActionSlot>,
    /// 媒体样式。
    pub style: Option<MediaStyle>,
    /// 显示的时间点（Unix 毫秒）。
    pub when_ms: i64,
    /// 是否显示时间。
    pub show_when: bool,
    /// 是否以计时器形式显示时间。
    pub uses_chronometer: bool,
}

impl Notification {
    /// 按动作查找按钮。
    pub fn action(&self, action: NotificationAction) -> Option<&ActionSlot> {
        self.actions.iter().find(|slot| slot.action == action)
    }
}

/// 持有通知的可变字段，按需生成 [`Notification`]。
#[derive(Debug, Clone, Default)]
pub struct NotificationBuilder {
    notification: Notification,
}

impl NotificationBuilder {
    /// 创建一个空的构建器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个按钮。
    pub fn add_action(&mut self, slot: ActionSlot) -> &mut Self {
        self.notification.actions.push(slot);
        self
    }

    /// 替换指定位置的按钮。越界时忽略。
    pub fn set_action(&mut self, index: usize, slot: &ActionSlot) -> &mut Self {
        if let Some(existing) = self.notification.actions.get_mut(index) {
            existing.clone_from(slot);
        }
        self
    }

    /// 设置媒体样式。
    pub fn set_style(&mut self, style: MediaStyle) -> &mut Self {
        self.notification.style = Some(style);
        self
    }

    /// 设置强调色。
    pub fn set_color(&mut self, color: u32) -> &mut Self {
        self.notification.color = color;
        self
    }

    /// 设置小图标。
    pub fn set_small_icon(&mut self, icon: impl Into<String>) -> &mut Self {
        self.notification.small_icon = icon.into();
        self
    }

    /// 设置锁屏可见性。
    pub fn set_visibility(&mut self, visibility: Visibility) -> &mut Self {
        self.notification.visibility = visibility;
        self
    }

    /// 设置是否以计时器形式显示时间。
    pub fn set_uses_chronometer(&mut self, enabled: bool) -> &mut Self {
        self.notification.uses_chronometer = enabled;
        self
    }

    /// 设置标题。
    pub fn set_content_title(&mut self, title: Option<String>) -> &mut Self {
        self.notification.title = title;
        self
    }

    /// 设置正文。
    pub fn set_content_text(&mut self, text: Option<String>) -> &mut Self {
        self.notification.text = text;
        self
    }

    /// 设置大图标。
    pub fn set_large_icon(&mut self, icon: Option<Artwork>) -> &mut Self {
        self.notification.large_icon = icon;
        self
    }

    /// 设置显示的时间点。
    pub fn set_when(&mut self, when_ms: i64) -> &mut Self {
        self.notification.when_ms = when_ms;
        self
    }

    /// 设置是否显示时间。
    pub fn set_show_when(&mut self, show: bool) -> &mut Self {
        self.notification.show_when = show;
        self
    }

    /// 当前的大图标。
    pub fn large_icon(&self) -> Option<&Artwork> {
        self.notification.large_icon.as_ref()
    }

    /// 生成一份通知快照。
    pub fn build(&self) -> Notification {
        self.notification.clone()
    }
}
