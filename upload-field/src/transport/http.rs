use std::{io, sync::Arc};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use storage_core::StorageClient;
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{
    AcceptList, ProgressSink, TransferProgress, TransportError, UploadRequest, UploadTransport,
};
use crate::field::item::FileSource;

const DEFAULT_UPLOAD_CONCURRENCY: usize = 2;
const MEMORY_CHUNK_SIZE: usize = 64 * 1024;
const CUSTOM_METADATA_PREFIX: &str = "x-storage-meta-";

/// Uploads through the storage REST API: ask for an upload link, stream the
/// body to it, then read back the stored resource.
#[derive(Clone)]
pub struct HttpTransport {
    client: StorageClient,
    upload_limit: Arc<Semaphore>,
    accept: AcceptList,
}

#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub upload_concurrency: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

impl HttpTransport {
    pub fn new(client: StorageClient) -> Self {
        Self::with_config(client, TransportConfig::default())
    }

    pub fn with_config(client: StorageClient, config: TransportConfig) -> Self {
        Self {
            client,
            upload_limit: Arc::new(Semaphore::new(config.upload_concurrency.max(1))),
            accept: AcceptList::default(),
        }
    }

    pub fn accepting(mut self, accept: AcceptList) -> Self {
        self.accept = accept;
        self
    }

    fn check_accepted(&self, request: &UploadRequest) -> Result<(), TransportError> {
        let file = &request.file;
        let content_type = request
            .metadata
            .as_ref()
            .and_then(|m| m.content_type.as_deref())
            .or(file.content_type());
        if self.accept.accepts(file.name(), content_type) {
            Ok(())
        } else {
            Err(TransportError::Rejected {
                name: file.name().to_string(),
                content_type: content_type.unwrap_or("unknown").to_string(),
            })
        }
    }

    async fn body_for(
        &self,
        request: &UploadRequest,
        progress: ProgressSink,
    ) -> Result<(reqwest::Body, u64), TransportError> {
        let (body, total) = match request.file.source() {
            FileSource::Path(path) => {
                let total = tokio::fs::metadata(path).await?.len();
                if total > 0 {
                    let file = tokio::fs::File::open(path).await?;
                    let mut counter = ProgressCounter::new(total, progress);
                    let stream = ReaderStream::new(file).inspect(move |chunk| {
                        if let Ok(chunk) = chunk {
                            counter.record(chunk.len());
                        }
                    });
                    (reqwest::Body::wrap_stream(stream), total)
                } else {
                    (reqwest::Body::from(Vec::new()), 0)
                }
            }
            FileSource::Memory(bytes) => {
                let total = bytes.len() as u64;
                let chunks: Vec<Result<Vec<u8>, io::Error>> = bytes
                    .chunks(MEMORY_CHUNK_SIZE)
                    .map(|chunk| Ok(chunk.to_vec()))
                    .collect();
                let mut counter = ProgressCounter::new(total, progress);
                let stream = futures_util::stream::iter(chunks).inspect(move |chunk| {
                    if let Ok(chunk) = chunk {
                        counter.record(chunk.len());
                    }
                });
                (reqwest::Body::wrap_stream(stream), total)
            }
        };
        if total == 0 {
            return Err(TransportError::EmptyFile {
                name: request.file.name().to_string(),
            });
        }
        Ok((body, total))
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressSink,
    ) -> Result<String, TransportError> {
        self.check_accepted(&request)?;
        let _permit = self
            .upload_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::ConcurrencyClosed)?;

        let (body, total) = self.body_for(&request, progress.clone()).await?;
        let _ = progress.send(TransferProgress::new(0, total));

        let link = self
            .client
            .get_upload_link(&request.destination, true)
            .await?;
        debug!(destination = %request.destination, total, "uploading");

        let mut put = self
            .client
            .http()
            .put(link.href)
            .header(CONTENT_LENGTH, total)
            .body(body);
        let metadata = request.metadata.as_ref();
        if let Some(content_type) = metadata
            .and_then(|m| m.content_type.as_deref())
            .or(request.file.content_type())
        {
            put = put.header(CONTENT_TYPE, content_type);
        }
        if let Some(metadata) = metadata {
            if let Some(cache_control) = metadata.cache_control.as_deref() {
                put = put.header(CACHE_CONTROL, cache_control);
            }
            for (key, value) in &metadata.custom {
                put = put.header(format!("{CUSTOM_METADATA_PREFIX}{key}"), value.as_str());
            }
        }
        put.send().await?.error_for_status()?;

        let resource = self.client.get_resource(&request.destination).await?;
        Ok(resource.path)
    }

    async fn download_url(&self, stored_path: &str) -> Result<String, TransportError> {
        let link = self.client.get_download_link(stored_path).await?;
        Ok(link.href.to_string())
    }
}

struct ProgressCounter {
    sent: u64,
    total: u64,
    progress: ProgressSink,
}

impl ProgressCounter {
    fn new(total: u64, progress: ProgressSink) -> Self {
        Self {
            sent: 0,
            total,
            progress,
        }
    }

    fn record(&mut self, len: usize) {
        self.sent = self.sent.saturating_add(len as u64);
        let _ = self
            .progress
            .send(TransferProgress::new(self.sent, self.total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::item::{FileHandle, UploadMetadata};
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_upload_flow(server: &MockServer, stored: &str) {
        Mock::given(method("GET"))
            .and(path("/v1/storage/resources/upload"))
            .and(query_param("path", stored))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/put/{stored}", server.uri()),
                "method": "PUT"
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/storage/resources"))
            .and(query_param("path", stored))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": stored,
                "name": stored.rsplit('/').next().unwrap_or(stored)
            })))
            .mount(server)
            .await;
    }

    fn transport(server: &MockServer) -> HttpTransport {
        let client = StorageClient::with_base_url(&server.uri(), "test-token").unwrap();
        HttpTransport::with_config(
            client,
            TransportConfig {
                upload_concurrency: 1,
            },
        )
    }

    fn request(file: FileHandle, destination: &str) -> UploadRequest {
        UploadRequest {
            file,
            destination: destination.to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn uploads_file_from_disk_and_reports_progress() {
        let server = MockServer::start().await;
        mount_upload_flow(&server, "uploads/in.bin").await;
        Mock::given(method("PUT"))
            .and(path("/put/uploads/in.bin"))
            .and(body_bytes(b"payload"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stored = transport(&server)
            .upload(request(FileHandle::from_path(&source), "uploads/in.bin"), tx)
            .await
            .unwrap();

        assert_eq!(stored, "uploads/in.bin");
        let mut last = None;
        while let Ok(progress) = rx.try_recv() {
            last = Some(progress);
        }
        assert_eq!(last, Some(TransferProgress::new(7, 7)));
    }

    #[tokio::test]
    async fn sends_metadata_headers() {
        let server = MockServer::start().await;
        mount_upload_flow(&server, "uploads/a.png").await;
        Mock::given(method("PUT"))
            .and(path("/put/uploads/a.png"))
            .and(header("content-type", "image/webp"))
            .and(header("cache-control", "max-age=60"))
            .and(header("x-storage-meta-owner", "ops"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut metadata = UploadMetadata {
            content_type: Some("image/webp".into()),
            cache_control: Some("max-age=60".into()),
            ..UploadMetadata::default()
        };
        metadata.custom.insert("owner".into(), "ops".into());
        let (tx, _rx) = mpsc::unbounded_channel();
        let file = FileHandle::from_bytes("a.png", None, b"png-bytes".to_vec());
        let stored = transport(&server)
            .upload(
                UploadRequest {
                    file,
                    destination: "uploads/a.png".into(),
                    metadata: Some(metadata),
                },
                tx,
            )
            .await
            .unwrap();
        assert_eq!(stored, "uploads/a.png");
    }

    #[tokio::test]
    async fn rejects_empty_files_before_requesting_a_link() {
        let server = MockServer::start().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let file = FileHandle::from_bytes("empty.png", None, Vec::new());
        let err = transport(&server)
            .upload(request(file, "uploads/empty.png"), tx)
            .await
            .expect_err("expected empty file error");
        assert!(matches!(err, TransportError::EmptyFile { name } if name == "empty.png"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_files_outside_accepted_types() {
        let server = MockServer::start().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let file = FileHandle::from_bytes("clip.mp4", None, b"video".to_vec());
        let err = transport(&server)
            .accepting(AcceptList::new(["image/*"]))
            .upload(request(file, "uploads/clip.mp4"), tx)
            .await
            .expect_err("expected rejection");
        assert!(
            matches!(err, TransportError::Rejected { content_type, .. } if content_type == "video/mp4")
        );
    }

    #[tokio::test]
    async fn surfaces_upload_failures() {
        let server = MockServer::start().await;
        mount_upload_flow(&server, "uploads/a.png").await;
        Mock::given(method("PUT"))
            .and(path("/put/uploads/a.png"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let file = FileHandle::from_bytes("a.png", None, b"png".to_vec());
        let err = transport(&server)
            .upload(request(file, "uploads/a.png"), tx)
            .await
            .expect_err("expected server error");
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[tokio::test]
    async fn resolves_download_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/storage/resources/download"))
            .and(query_param("path", "uploads/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": "https://cdn.example/uploads/a.png",
                "method": "GET"
            })))
            .mount(&server)
            .await;

        let url = transport(&server)
            .download_url("uploads/a.png")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/uploads/a.png");
    }
}
