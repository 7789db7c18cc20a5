use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::http::HttpClient;
use crate::types::{ChatMessage, Confirmation, Document, DocumentList};

/// Async client for the document and chat-history REST endpoints.
#[derive(Clone)]
pub struct DocumentsClient {
    http: HttpClient,
}

impl DocumentsClient {
    pub fn new(api_base: &str) -> ApiResult<Self> {
        Ok(Self {
            http: HttpClient::new(api_base)?,
        })
    }

    pub fn api_base(&self) -> &str {
        self.http.api_base()
    }

    /// Upload a PDF. The server extracts its text; embeddings are generated
    /// later by [`process_document`](Self::process_document).
    pub async fn upload_document(&self, path: &Path) -> ApiResult<Document> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidUpload(format!("no file name in {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| ApiError::Client(format!("upload mime: {e}")))?;
        let form = Form::new().part("archivo", part);

        let req = self
            .http
            .request(Method::POST, "/api/documentos/")
            .multipart(form);
        let doc: Document = decode("upload", self.http.send("upload", req).await?).await?;
        info!(id = doc.id, file = %file_name, size, "document uploaded");
        Ok(doc)
    }

    /// Generate embeddings for a stored document.
    pub async fn process_document(&self, id: i64) -> ApiResult<Document> {
        let path = format!("/api/documentos/{id}/procesar");
        let req = self.http.request(Method::POST, &path);
        let doc: Document = decode("process", self.http.send("process", req).await?).await?;
        info!(id, processed = doc.processed, "document processed");
        Ok(doc)
    }

    pub async fn list_documents(&self) -> ApiResult<Vec<Document>> {
        let req = self.http.request(Method::GET, "/api/documentos/");
        let list: DocumentList = decode("list", self.http.send("list", req).await?).await?;
        Ok(list.documentos)
    }

    /// Delete a document. Returns the server's confirmation message.
    pub async fn delete_document(&self, id: i64) -> ApiResult<String> {
        let path = format!("/api/documentos/{id}");
        let req = self.http.request(Method::DELETE, &path);
        let confirmation: Confirmation =
            decode("delete", self.http.send("delete", req).await?).await?;
        info!(id, "document deleted");
        Ok(confirmation.mensaje)
    }

    /// Stored chat messages for a document. The server caps the result at
    /// 50 entries when `limit` is `None`.
    pub async fn chat_history(
        &self,
        document_id: i64,
        limit: Option<u32>,
    ) -> ApiResult<Vec<ChatMessage>> {
        let path = format!("/api/chat/historial/{document_id}");
        let mut req = self.http.request(Method::GET, &path);
        if let Some(limit) = limit {
            req = req.query(&[("limite", limit)]);
        }
        decode("history", self.http.send("history", req).await?).await
    }
}

async fn decode<T: DeserializeOwned>(op: &'static str, resp: reqwest::Response) -> ApiResult<T> {
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("{op}: {e}")))
}
