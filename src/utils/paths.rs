use std::path::{Path, PathBuf};
use tower_lsp_server::lsp_types::Uri;
use tower_lsp_server::UriExt;

pub fn is_org_file(uri: &Uri) -> bool {
    uri.to_file_path().is_some_and(|p| is_org_file_path(&p))
}

pub fn is_org_file_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("org"))
}

pub fn uri_to_path_buf(uri: &Uri) -> Option<PathBuf> {
    uri.to_file_path().map(|p| p.into_owned())
}
