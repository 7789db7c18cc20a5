use std::path::PathBuf;

use clap::{Args, Subcommand};
use docs_api::{ChatMessage, Document};
use tracing::info;

use crate::config::ServerArgs;
use crate::error::DeskResult;

#[derive(Subcommand, Debug)]
pub enum DocumentsCommand {
    /// List stored documents
    List,
    /// Upload a PDF
    Upload {
        path: PathBuf,
        /// Generate embeddings right after the upload
        #[arg(long)]
        process: bool,
    },
    /// Generate embeddings for a document
    Process { id: i64 },
    /// Delete a document and its embeddings
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Document whose conversation to show
    document_id: i64,
    /// Maximum number of messages (server default: 50)
    #[arg(long)]
    limit: Option<u32>,
}

pub async fn run_documents(server: &ServerArgs, command: DocumentsCommand) -> DeskResult<()> {
    let client = server.documents_client()?;

    match command {
        DocumentsCommand::List => {
            let docs = client.list_documents().await?;
            if docs.is_empty() {
                println!("no documents");
            }
            for doc in &docs {
                println!("{}", format_document(doc));
            }
        }
        DocumentsCommand::Upload { path, process } => {
            let doc = client.upload_document(&path).await?;
            println!("{}", format_document(&doc));
            if process {
                info!(id = doc.id, "processing uploaded document");
                let doc = client.process_document(doc.id).await?;
                println!("{}", format_document(&doc));
            }
        }
        DocumentsCommand::Process { id } => {
            let doc = client.process_document(id).await?;
            println!("{}", format_document(&doc));
        }
        DocumentsCommand::Delete { id } => {
            let message = client.delete_document(id).await?;
            println!("{message}");
        }
    }
    Ok(())
}

pub async fn run_history(server: &ServerArgs, args: HistoryArgs) -> DeskResult<()> {
    let client = server.documents_client()?;
    let history = client.chat_history(args.document_id, args.limit).await?;
    if history.is_empty() {
        println!("no messages for document {}", args.document_id);
    }
    for msg in &history {
        println!("{}", format_history_entry(msg));
    }
    Ok(())
}

pub(crate) fn format_document(doc: &Document) -> String {
    let status = if doc.processed { "processed" } else { "pending" };
    let mut line = format!("{:>5}  {}  [{status}]  {} bytes", doc.id, doc.name, doc.size);
    if let Some(updated) = doc.updated_at {
        line.push_str(&format!("  updated {}", updated.format("%Y-%m-%d %H:%M")));
    }
    if let Some(message) = &doc.message {
        line.push_str(&format!("  ({message})"));
    }
    line
}

fn format_history_entry(msg: &ChatMessage) -> String {
    let who = if msg.from_user { "you" } else { "assistant" };
    format!("{} {who}: {}", msg.created_at.format("%H:%M:%S"), msg.content)
}
