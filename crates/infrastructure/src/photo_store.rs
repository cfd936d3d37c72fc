//! 本地文件系统图片存储
//!
//! 校验大小和文件头后写入配置目录，返回 `/photos/<文件名>` 形式的定位符，
//! 由 web-api 的静态文件路由对外提供。

use std::path::PathBuf;

use application::photo::{PhotoStore, PhotoStoreError, PhotoSubject};
use async_trait::async_trait;
use domain::PhotoLocator;
use uuid::Uuid;

pub const PUBLIC_PREFIX: &str = "/photos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

pub struct FsPhotoStore {
    root: PathBuf,
    max_bytes: usize,
}

impl FsPhotoStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }
}

#[async_trait]
impl PhotoStore for FsPhotoStore {
    async fn store(
        &self,
        subject: PhotoSubject,
        bytes: Vec<u8>,
    ) -> Result<PhotoLocator, PhotoStoreError> {
        if bytes.is_empty() {
            return Err(PhotoStoreError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(PhotoStoreError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let format = ImageFormat::sniff(&bytes).ok_or(PhotoStoreError::UnsupportedFormat)?;

        let file_name = format!("{subject}-{}.{}", Uuid::new_v4(), format.extension());
        self.ensure_root().await?;
        tokio::fs::write(self.root.join(&file_name), &bytes).await?;

        tracing::info!(%subject, file = %file_name, size = bytes.len(), "图片已保存");
        PhotoLocator::new(format!("{PUBLIC_PREFIX}/{file_name}"))
            .map_err(|err| PhotoStoreError::Io(std::io::Error::other(err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::UserId;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[tokio::test]
    async fn stores_png_and_returns_public_locator() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path(), 1024);

        let locator = store
            .store(PhotoSubject::User(UserId::generate()), PNG_HEADER.to_vec())
            .await
            .unwrap();

        let file = locator.as_str().strip_prefix("/photos/").unwrap();
        assert!(file.starts_with("user-"));
        assert!(file.ends_with(".png"));
        let written = tokio::fs::read(dir.path().join(file)).await.unwrap();
        assert_eq!(written, PNG_HEADER);
    }

    #[tokio::test]
    async fn rejects_empty_oversized_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPhotoStore::new(dir.path(), 16);
        let subject = PhotoSubject::User(UserId::generate());

        assert!(matches!(
            store.store(subject, Vec::new()).await,
            Err(PhotoStoreError::Empty)
        ));
        assert!(matches!(
            store.store(subject, vec![0xFF; 17]).await,
            Err(PhotoStoreError::TooLarge { limit: 16 })
        ));
        assert!(matches!(
            store.store(subject, b"%PDF-1.7".to_vec()).await,
            Err(PhotoStoreError::UnsupportedFormat)
        ));
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a..."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WAVE"), None);
    }
}
