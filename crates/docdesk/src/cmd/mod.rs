mod chat;
mod documents;

pub use chat::{ChatArgs, run_chat};
pub use documents::{DocumentsCommand, HistoryArgs, run_documents, run_history};
