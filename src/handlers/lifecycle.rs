use crate::server::Backend;
use crate::settings::Settings;
use log::{debug, info};
use tower_lsp_server::lsp_types::{DidChangeConfigurationParams, InitializeParams};

pub async fn handle_initialize(backend: &Backend, params: &InitializeParams) {
    if let Some(options) = &params.initialization_options {
        let settings = Settings::from_value(options);
        debug!(
            "initial settings: {} languages, {} aliases, {} tangle entries",
            settings.languages.len(),
            settings.aliases.len(),
            settings.tangle_extensions.len()
        );
        *backend.settings.write().await = settings;
    }
}

pub async fn handle_did_change_configuration(
    backend: &Backend,
    params: DidChangeConfigurationParams,
) {
    let settings = Settings::from_value(&params.settings);
    info!(
        "configuration updated: {} languages, {} aliases",
        settings.languages.len(),
        settings.aliases.len()
    );
    *backend.settings.write().await = settings;
}
