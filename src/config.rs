use serde::{Deserialize, Serialize};

/// 通知按钮上显示的文字。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionLabels {
    /// 播放按钮。
    pub play: String,
    /// 暂停按钮。
    pub pause: String,
    /// 上一首按钮。
    pub previous: String,
    /// 下一首按钮。
    pub next: String,
}

impl Default for ActionLabels {
    fn default() -> Self {
        Self {
            play: "Play".to_string(),
            pause: "Pause".to_string(),
            previous: "Previous".to_string(),
            next: "Next".to_string(),
        }
    }
}

/// 媒体通知的配置。
///
/// 所有字段都有默认值，可以只覆盖需要的部分：
///
/// ```
/// use media_notification::NotificationConfig;
///
/// let config = NotificationConfig {
///     package: "com.example.player".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.notification_id, 412);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// 宿主通知服务使用的通知 ID。
    pub notification_id: i32,
    /// 广播动作的前缀，例如 `"{package}.play"`。
    pub package: String,
    /// 按钮文字。
    pub labels: ActionLabels,
    /// 状态栏小图标的资源名。
    pub small_icon: String,
    /// 通知的强调色 (ARGB)。
    pub color: u32,
    /// 封面缩放后的目标宽度。
    pub artwork_width: u32,
    /// 封面缩放后的目标高度。
    pub artwork_height: u32,
    /// 内部事件通道的容量。
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            notification_id: 412,
            package: "media.notification".to_string(),
            labels: ActionLabels::default(),
            small_icon: "ic_notification".to_string(),
            color: 0xFF30_3F9F,
            artwork_width: 128,
            artwork_height: 128,
            channel_capacity: 32,
        }
    }
}
