use std::sync::Arc;

use application::{
    CancellationToken, InMemoryStore, MessagingService, PhotoStore, SystemClock,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use config::AppConfig;
use infrastructure::{FsPhotoStore, Infrastructure};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use web_api::{router, AppState};

pub struct TestApp {
    router: Router,
    pub store: InMemoryStore,
    photos: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let photos = tempfile::tempdir().expect("photo dir");
        let mut config = AppConfig::default();
        config.storage.photo_dir = photos.path().to_path_buf();
        config.storage.max_photo_bytes = 1024;

        let store = InMemoryStore::new();
        let photo_store: Arc<dyn PhotoStore> = Arc::new(FsPhotoStore::new(
            photos.path(),
            config.storage.max_photo_bytes,
        ));
        let infra = Infrastructure::in_memory(store.clone(), photo_store);
        let service = MessagingService::new(infra.messaging_dependencies(Arc::new(SystemClock)));

        let state = AppState::new(
            Arc::new(service),
            infra.identity.clone(),
            infra.photo_store.clone(),
            CancellationToken::new(),
        );

        Self {
            router: router(state, &config),
            store,
            photos,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        self.multipart(Method::PUT, uri, token, &[], Some((field, bytes)))
            .await
    }

    /// 发送 multipart 表单：若干文本字段加一个可选的文件字段
    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> (StatusCode, Value) {
        let boundary = "test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"upload\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.dispatch(request).await
    }

    /// 图片目录里已落盘的文件数
    pub fn stored_photos(&self) -> usize {
        std::fs::read_dir(self.photos.path()).unwrap().count()
    }

    pub async fn get_raw(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// 登录并返回凭据
    pub async fn login(&self, name: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/session",
                None,
                Some(serde_json::json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["identifier"].as_str().unwrap().to_owned()
    }
}
