//! LSP server for the AL language, speaking JSON-RPC over stdio.

pub mod analysis;
mod server;

pub use server::AlBackend;

use tower_lsp::{LspService, Server};

/// Serve LSP over stdio until the client disconnects.
pub async fn run_stdio() {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::new(AlBackend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
