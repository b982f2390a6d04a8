//! Tower-lsp backend for the AL language server.
//!
//! Supports `textDocument/didOpen`, `didChange`, `didClose` (publishing
//! diagnostics from the parser and type checker), `hover` (the resolved
//! type of the identifier under the cursor, plus the doc comment of its
//! declaration when one exists), and `definition`.

use std::collections::HashMap;
use std::sync::Mutex;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::analysis::{self, AnalysisResult};

/// Per-document state stored in the server.
struct DocumentState {
    analysis: AnalysisResult,
}

/// The AL LSP backend: a client handle for notifications plus an
/// in-memory document store keyed by URI.
pub struct AlBackend {
    client: Client,
    documents: Mutex<HashMap<String, DocumentState>>,
}

impl AlBackend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Mutex::new(HashMap::new()),
        }
    }

    async fn analyze_and_publish(&self, uri: Url, source: String) {
        let result = analysis::analyze_document(&source);
        let diagnostics = result.diagnostics.clone();

        {
            let mut docs = self.documents.lock().unwrap();
            docs.insert(uri.to_string(), DocumentState { analysis: result });
        }

        self.client
            .publish_diagnostics(uri, diagnostics, None)
            .await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for AlBackend {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "AL language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let source = params.text_document.text;
        self.analyze_and_publish(uri, source).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // Full sync: the first change carries the whole document.
        if let Some(change) = params.content_changes.into_iter().next() {
            self.analyze_and_publish(uri, change.text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        {
            let mut docs = self.documents.lock().unwrap();
            docs.remove(&params.text_document.uri.to_string());
        }
        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params
            .text_document_position_params
            .text_document
            .uri
            .to_string();
        let position = params.text_document_position_params.position;
        let (line, col) = analysis::position_to_point(&position);

        let docs = self.documents.lock().unwrap();
        let Some(doc) = docs.get(&uri) else {
            return Ok(None);
        };

        // The type of the identifier under the cursor, plus the doc
        // comment of its declaration when one exists.
        let ty = analysis::type_at(&doc.analysis, line, col);
        let doc_comment = analysis::doc_at(&doc.analysis, line, col);
        let value = match (ty, doc_comment) {
            (Some(ty), Some(comment)) => {
                format!("```al\n{}\n```\n---\n{}", ty, comment)
            }
            (Some(ty), None) => format!("```al\n{}\n```", ty),
            (None, Some(comment)) => comment.to_string(),
            (None, None) => return Ok(None),
        };

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: None,
        }))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params
            .text_document_position_params
            .text_document
            .uri
            .clone();
        let position = params.text_document_position_params.position;
        let (line, col) = analysis::position_to_point(&position);

        let docs = self.documents.lock().unwrap();
        let Some(doc) = docs.get(&uri.to_string()) else {
            return Ok(None);
        };

        match analysis::definition_at(&doc.analysis, line, col) {
            Some(span) => Ok(Some(GotoDefinitionResponse::Scalar(Location {
                uri,
                range: analysis::span_to_range(span),
            }))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_advertises_capabilities() {
        let (service, _) = tower_lsp::LspService::new(AlBackend::new);
        let server = service.inner();
        let result = server
            .initialize(InitializeParams::default())
            .await
            .unwrap();
        let caps = result.capabilities;
        assert!(caps.hover_provider.is_some());
        assert!(caps.definition_provider.is_some());
        assert!(caps.text_document_sync.is_some());
    }
}
