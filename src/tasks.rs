use std::{sync::Arc, time::Instant};

use tokio::sync::mpsc::Sender as TokioSender;

use crate::{api::Artwork, error::ArtworkError, host::ArtworkLoader};

/// 一次封面获取请求。`uri` 同时作为完成时比较用的令牌。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArtworkRequest {
    pub uri: String,
    pub width: u32,
    pub height: u32,
}

/// 封面获取任务的结果，投递回事件循环处理。
#[derive(Debug)]
pub(crate) struct ArtworkFetched {
    pub uri: String,
    pub result: Result<Artwork, ArtworkError>,
}

/// 下载并缩放封面，然后把结果送回事件循环。
///
/// 不重试，不取消。结果是否仍然有效由接收方判断。
pub(crate) async fn fetch_artwork_task<L: ArtworkLoader>(
    loader: Arc<L>,
    request: ArtworkRequest,
    result_tx: TokioSender<ArtworkFetched>,
) {
    let start_time = Instant::now();
    log::trace!("[Artwork Fetcher] 正在获取封面: {}", request.uri);

    let result = loader
        .load(&request.uri, request.width, request.height)
        .await;

    match &result {
        Ok(artwork) => {
            log::trace!(
                "[Artwork Fetcher] 获取到封面 {artwork:?}。总耗时: {:?}",
                start_time.elapsed()
            );
        }
        Err(e) => {
            log::warn!(
                "[Artwork Fetcher] 获取封面 {} 失败: {e}, 总耗时: {:?}",
                request.uri,
                start_time.elapsed()
            );
        }
    }

    let fetched = ArtworkFetched {
        uri: request.uri,
        result,
    };
    if result_tx.send(fetched).await.is_err() {
        log::debug!("[Artwork Fetcher] 事件循环已关闭，丢弃封面结果。");
    }
}
