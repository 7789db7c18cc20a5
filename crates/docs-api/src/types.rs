use chrono::NaiveDateTime;
use serde::Deserialize;

/// A stored document as reported by the backend. Which fields are present
/// depends on the endpoint; absent ones take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha_creacion", default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(rename = "fecha_actualizacion", default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(rename = "tiene_embeddings", default)]
    pub has_embeddings: bool,
    #[serde(rename = "procesado", default)]
    pub processed: bool,
    /// Size of the extracted text in bytes.
    #[serde(rename = "tamaño", default)]
    pub size: u64,
    /// Confirmation text attached to create/process responses.
    #[serde(rename = "mensaje", default)]
    pub message: Option<String>,
}

/// A stored chat message from the history endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    #[serde(rename = "contenido")]
    pub content: String,
    #[serde(rename = "es_usuario")]
    pub from_user: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "documento_id", default)]
    pub document_id: Option<i64>,
}

#[derive(Deserialize)]
pub(crate) struct DocumentList {
    pub documentos: Vec<Document>,
}

#[derive(Deserialize)]
pub(crate) struct Confirmation {
    pub mensaje: String,
}
