use thiserror::Error;
use tokio::sync::mpsc::error::{SendError, TrySendError};

use crate::api::NotifierCommand;

/// 定义库的统一错误枚举。
#[derive(Debug, Error)]
pub enum NotifierError {
    /// 无法启动后台工作线程。
    ///
    /// 这通常发生在 `std::thread::Builder::spawn` 失败时。
    #[error("无法启动后台工作线程: {0}")]
    WorkerThread(String),

    /// 向工作线程的命令通道发送外部命令时失败。
    ///
    /// 这通常意味着后台工作线程已经退出。
    #[error("向工作线程发送外部命令失败")]
    CommandSendError(#[from] SendError<NotifierCommand>),

    /// 命令通道已满，非阻塞发送失败。
    #[error("命令通道已满，命令被丢弃")]
    CommandChannelFull,

    /// 创建 Tokio 异步运行时失败。
    #[error("Tokio 运行时创建失败: {0}")]
    TokioRuntime(#[from] std::io::Error),

    /// 同一个通知 ID 的后台服务已在运行。
    #[error("通知 {0} 的后台服务已在运行，无法重复启动。")]
    AlreadyRunning(i32),

    /// 锁已被毒化。
    #[error("锁已被毒化: {0}")]
    MutexPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for NotifierError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        NotifierError::MutexPoisoned(err.to_string())
    }
}

impl From<TrySendError<NotifierCommand>> for NotifierError {
    fn from(err: TrySendError<NotifierCommand>) -> Self {
        match err {
            TrySendError::Full(_) => NotifierError::CommandChannelFull,
            TrySendError::Closed(cmd) => NotifierError::CommandSendError(SendError(cmd)),
        }
    }
}

/// 宿主平台实现 [`NotificationHost`](crate::NotificationHost) 时报告的错误。
///
/// 这些错误只会被记录，不会向调用方传播。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// 注销一个从未注册（或已注销）的广播接收器。
    #[error("广播接收器未注册")]
    ReceiverNotRegistered,

    /// 宿主服务暂时不可用。
    #[error("宿主服务不可用: {0}")]
    Unavailable(String),
}

/// 封面获取过程中可能发生的错误。
#[derive(Debug, Error)]
pub enum ArtworkError {
    /// URI 无法解析。
    #[error("无效的封面 URI '{uri}': {source}")]
    InvalidUri {
        /// 原始 URI 字符串。
        uri: String,
        /// 解析错误。
        #[source]
        source: url::ParseError,
    },

    /// 不支持的 URI 协议。
    #[error("不支持的封面 URI 协议: {0}")]
    UnsupportedScheme(String),

    /// HTTP 请求失败。
    #[error("封面下载失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 读取本地文件失败。
    #[error("封面读取失败: {0}")]
    Io(#[from] std::io::Error),

    /// 封面数据超出大小限制。
    #[error("封面数据 ({size} 字节) 超出最大限制 ({limit} 字节)")]
    TooLarge {
        /// 已读取或声明的大小。
        size: u64,
        /// 允许的最大大小。
        limit: u64,
    },

    /// 没有获取到任何数据。
    #[error("封面数据为空")]
    Empty,

    /// 图片解码失败。
    #[error("封面解码失败: {0}")]
    Decode(#[from] image::ImageError),

    /// 后台解码任务异常退出。
    #[error("封面解码任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 本库统一的 `Result` 类型别名。
pub type Result<T> = std::result::Result<T, NotifierError>;
