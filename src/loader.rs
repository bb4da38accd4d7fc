use image::{DynamicImage, RgbaImage, imageops::FilterType};
use url::Url;

use crate::{api::Artwork, error::ArtworkError, host::ArtworkLoader};

/// 允许获取的封面图片的最大字节数，防止过大的图片消耗过多内存。
pub const MAX_ARTWORK_SIZE_BYTES: usize = 20_971_520; // 20 MB

/// 基于 `reqwest` 的封面加载器。
///
/// 支持 `http`、`https` 和 `file` 协议。图片解码在阻塞线程池中进行。
#[derive(Debug, Clone, Default)]
pub struct HttpArtworkLoader {
    client: reqwest::Client,
}

impl HttpArtworkLoader {
    /// 使用默认的 HTTP 客户端创建加载器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用一个已配置好的 HTTP 客户端创建加载器。
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, ArtworkError> {
        let url = Url::parse(uri).map_err(|source| ArtworkError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;

        let bytes = match url.scheme() {
            "http" | "https" => {
                let mut response = self.client.get(url).send().await?.error_for_status()?;
                if let Some(len) = response.content_length() {
                    check_size(len)?;
                }
                // 分块响应没有 Content-Length，边读边检查
                let mut bytes = Vec::new();
                while let Some(chunk) = response.chunk().await? {
                    check_size(bytes.len() as u64 + chunk.len() as u64)?;
                    bytes.extend_from_slice(&chunk);
                }
                bytes
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| ArtworkError::UnsupportedScheme(uri.to_string()))?;
                check_size(tokio::fs::metadata(&path).await?.len())?;
                tokio::fs::read(path).await?
            }
            other => return Err(ArtworkError::UnsupportedScheme(other.to_string())),
        };

        if bytes.is_empty() {
            return Err(ArtworkError::Empty);
        }
        check_size(bytes.len() as u64)?;
        Ok(bytes)
    }
}

impl ArtworkLoader for HttpArtworkLoader {
    async fn load(&self, uri: &str, width: u32, height: u32) -> Result<Artwork, ArtworkError> {
        let bytes = self.fetch_bytes(uri).await?;
        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| rescale(&img, width, height))
        })
        .await??;
        Ok(Artwork::new(image))
    }
}

fn check_size(size: u64) -> Result<(), ArtworkError> {
    if size > MAX_ARTWORK_SIZE_BYTES as u64 {
        log::warn!(
            "[Artwork Loader] 封面数据 ({size} 字节) 超出最大限制 ({MAX_ARTWORK_SIZE_BYTES} 字节)，已丢弃。"
        );
        return Err(ArtworkError::TooLarge {
            size,
            limit: MAX_ARTWORK_SIZE_BYTES as u64,
        });
    }
    Ok(())
}

/// 按比例缩放图片，使其恰好放入 `width` x `height` 的区域内。
pub fn rescale(image: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    image
        .resize(width.max(1), height.max(1), FilterType::Lanczos3)
        .to_rgba8()
}
