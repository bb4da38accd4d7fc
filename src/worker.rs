use std::{sync::Arc, thread};

use tokio::{
    runtime::Builder as RuntimeBuilder,
    sync::mpsc::{
        Receiver as TokioReceiver, Sender as TokioSender, UnboundedReceiver,
        channel as tokio_channel, unbounded_channel,
    },
};

use crate::{
    api::{NotificationUpdate, NotifierCommand},
    config::NotificationConfig,
    error::{NotifierError, Result},
    host::{ArtworkLoader, NotificationHost},
    notifier::{MediaNotification, NotifierChannels},
    session::SessionSignal,
    tasks::{self, ArtworkFetched, ArtworkRequest},
};

/// `NotificationWorker` 是整个库的核心协调器。
///
/// 它在一个专用的后台线程中运行单线程的 Tokio 运行时，负责：
/// 1.  **事件驱动循环**: 使用 `tokio::select!` 统一处理外部命令、会话回调和封面获取结果。
/// 2.  **串行化**: 所有对 [`MediaNotification`] 的访问都发生在这个循环里，无需加锁。
/// 3.  **封面获取**: 为每个请求派生一个独立的任务，完成后把结果送回循环。
pub(crate) struct NotificationWorker<H: NotificationHost, L: ArtworkLoader> {
    notification: MediaNotification<H>,
    loader: Arc<L>,

    /// 从 `NotificationController` 接收外部命令。
    command_rx: TokioReceiver<NotifierCommand>,
    /// 从会话回调接收信号。
    session_rx: UnboundedReceiver<SessionSignal>,
    /// 从 `MediaNotification` 接收封面获取请求。
    artwork_request_rx: TokioReceiver<ArtworkRequest>,
    /// 交给封面获取任务，用于回传结果。
    artwork_result_tx: TokioSender<ArtworkFetched>,
    artwork_result_rx: TokioReceiver<ArtworkFetched>,
}

impl<H: NotificationHost, L: ArtworkLoader> NotificationWorker<H, L> {
    fn new(
        host: Arc<H>,
        loader: L,
        config: NotificationConfig,
        command_rx: TokioReceiver<NotifierCommand>,
        update_tx: TokioSender<NotificationUpdate>,
    ) -> Self {
        let capacity = config.channel_capacity.max(1);
        // 会话信号不可丢弃
        let (session_tx, session_rx) = unbounded_channel::<SessionSignal>();
        let (artwork_tx, artwork_request_rx) = tokio_channel::<ArtworkRequest>(capacity);
        let (artwork_result_tx, artwork_result_rx) = tokio_channel::<ArtworkFetched>(capacity);

        let notification = MediaNotification::new(
            host,
            config,
            NotifierChannels {
                session_tx,
                artwork_tx,
                update_tx,
            },
        );

        Self {
            notification,
            loader: Arc::new(loader),
            command_rx,
            session_rx,
            artwork_request_rx,
            artwork_result_tx,
            artwork_result_rx,
        }
    }

    /// 工作线程的入口点：创建运行时并驱动事件循环，直到收到关闭命令。
    fn run(
        host: Arc<H>,
        loader: L,
        config: NotificationConfig,
        command_rx: TokioReceiver<NotifierCommand>,
        update_tx: TokioSender<NotificationUpdate>,
    ) -> Result<()> {
        log::info!("[NotificationWorker] Worker 正在启动...");

        let runtime = RuntimeBuilder::new_current_thread().enable_all().build()?;

        runtime.block_on(async move {
            let mut worker = Self::new(host, loader, config, command_rx, update_tx);
            log::debug!("[NotificationWorker] 初始化完成，即将进入事件循环。");
            worker.main_event_loop().await;

            log::trace!("[NotificationWorker] 事件循环已退出，正在执行清理...");
            worker.notification.stop();
        });

        log::info!("[NotificationWorker] 工作线程即将终止。");
        Ok(())
    }

    async fn main_event_loop(&mut self) {
        loop {
            tokio::select! {
                // 优先处理外部命令，特别是 Shutdown。
                biased;

                maybe_command = self.command_rx.recv() => {
                    match maybe_command {
                        Some(NotifierCommand::Shutdown) => {
                            log::debug!("[NotificationWorker] 收到关闭命令，准备退出...");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        None => {
                            log::warn!("[NotificationWorker] 命令通道已断开，准备退出...");
                            break;
                        }
                    }
                },

                Some(signal) = self.session_rx.recv() => {
                    self.notification.handle_session_signal(signal);
                },

                Some(fetched) = self.artwork_result_rx.recv() => {
                    self.notification.on_artwork_fetched(fetched);
                },

                Some(request) = self.artwork_request_rx.recv() => {
                    self.spawn_artwork_fetch(request);
                },
            }
        }
    }

    fn handle_command(&mut self, command: NotifierCommand) {
        log::trace!("[NotificationWorker] 收到外部命令: {command:?}");
        match command {
            NotifierCommand::StartNotification => self.notification.start(),
            NotifierCommand::StopNotification => self.notification.stop(),
            NotifierCommand::Intent(action) => self.notification.handle_intent(&action),
            NotifierCommand::RefreshSession => self.notification.update_session_token(),
            NotifierCommand::Shutdown => {
                // 已在事件循环中优先处理
            }
        }
        log::trace!(
            "[NotificationWorker] 命令处理完毕，通知 {}。",
            if self.notification.is_started() { "运行中" } else { "已停止" }
        );
    }

    fn spawn_artwork_fetch(&self, request: ArtworkRequest) {
        tokio::spawn(tasks::fetch_artwork_task(
            self.loader.clone(),
            request,
            self.artwork_result_tx.clone(),
        ));
    }
}

/// 启动通知后台线程。
pub(crate) fn start_notification_worker_thread<H, L>(
    host: Arc<H>,
    loader: L,
    config: NotificationConfig,
    command_rx: TokioReceiver<NotifierCommand>,
    update_tx: TokioSender<NotificationUpdate>,
) -> Result<thread::JoinHandle<()>>
where
    H: NotificationHost,
    L: ArtworkLoader,
{
    let thread_name = format!("media_notification_{}", config.notification_id);
    thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            log::debug!("[NotificationWorker Thread] 线程已启动。");
            if let Err(e) = NotificationWorker::run(host, loader, config, command_rx, update_tx) {
                log::error!("[NotificationWorker Thread] 运行出错: {e}");
            }
            log::debug!("[NotificationWorker Thread] 线程已结束。");
        })
        .map_err(|e| NotifierError::WorkerThread(e.to_string()))
}
