use crate::utils::paths::{is_org_file, uri_to_path_buf};
use dashmap::DashMap;
use log::debug;
use ropey::Rope;
use std::path::{Path, PathBuf};
use tower_lsp_server::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
};

/// Open Org documents, full-text synced.
#[derive(Debug, Default)]
pub struct DocumentStore {
    pub document_map: DashMap<PathBuf, Rope>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            document_map: DashMap::new(),
        }
    }

    pub fn handle_did_open(&self, params: DidOpenTextDocumentParams) -> Option<PathBuf> {
        debug!("opened: {}", params.text_document.uri.path());
        if !is_org_file(&params.text_document.uri) {
            return None;
        }
        let path = uri_to_path_buf(&params.text_document.uri)?;

        self.document_map
            .insert(path.clone(), Rope::from_str(&params.text_document.text));
        Some(path)
    }

    pub fn handle_did_change(&self, mut params: DidChangeTextDocumentParams) -> Option<PathBuf> {
        debug!("changed: {}", params.text_document.uri.path());
        if !is_org_file(&params.text_document.uri) {
            return None;
        }
        let path = uri_to_path_buf(&params.text_document.uri)?;

        // Full sync: the last change carries the whole document.
        let content = params.content_changes.pop()?.text;
        self.document_map
            .insert(path.clone(), Rope::from_str(&content));
        Some(path)
    }

    pub fn handle_did_close(&self, params: &DidCloseTextDocumentParams) {
        debug!("closed: {}", params.text_document.uri.path());
        if let Some(path) = uri_to_path_buf(&params.text_document.uri) {
            self.document_map.remove(&path);
        }
    }

    /// The given line of an open document, including its trailing newline.
    pub fn line_at(&self, path: &Path, line: usize) -> Option<String> {
        let doc = self.document_map.get(path)?;
        doc.lines().nth(line).map(|s| s.to_string())
    }
}
