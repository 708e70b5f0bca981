use crate::server::Backend;
use crate::settings::{EditStyle, Settings};
use crate::template::{self, BlockWrapper, Expansion};
use crate::utils::{as_pos_idx, byte_to_utf16_idx, paths::uri_to_path_buf, utf16_to_byte_idx};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::lsp_types::{
    ExecuteCommandParams, MessageActionItem, MessageType, Position, Range, TextEdit, Uri,
    WorkspaceEdit,
};
use tower_lsp_server::Client;

pub const PREFIX_CHECK: &str = "orgBlock.prefixCheck";
pub const LIST_CANDIDATES: &str = "orgBlock.listCandidates";
pub const PREVIEW: &str = "orgBlock.preview";
pub const POST_INSERT: &str = "orgBlock.postInsert";

pub const ALL: [&str; 4] = [PREFIX_CHECK, LIST_CANDIDATES, PREVIEW, POST_INSERT];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostInsertArgs {
    uri: Uri,
    /// Cursor position right after the typed trigger and prefix.
    position: Position,
    /// The accepted candidate.
    insertion: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostInsertResult {
    /// Where the cursor belongs after the edit: on the empty body line.
    cursor: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    edit: Option<EditDirective>,
}

/// Tells the client glue to re-open the block body in a dedicated
/// language-specific buffer. The server cannot switch editor modes itself.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EditDirective {
    action: &'static str,
    language: String,
}

pub async fn handle_execute_command(
    backend: &Backend,
    mut params: ExecuteCommandParams,
) -> Result<Option<Value>> {
    let arg = if params.arguments.is_empty() {
        Value::Null
    } else {
        params.arguments.remove(0)
    };

    match params.command.as_str() {
        PREFIX_CHECK => {
            let settings = backend.settings.read().await;
            let line = arg.as_str().unwrap_or_default();
            let prefix =
                template::trigger_match(line, settings.complete_at_bol).map(|m| m.prefix);
            Ok(Some(serde_json::json!(prefix)))
        }
        LIST_CANDIDATES => {
            let settings = backend.settings.read().await;
            let prefix = arg.as_str().unwrap_or_default();
            Ok(Some(serde_json::json!(settings.candidates(prefix))))
        }
        PREVIEW => {
            let settings = backend.settings.read().await;
            let candidate = arg.as_str().unwrap_or_default();
            Ok(Some(serde_json::json!(template::preview(
                candidate, &settings
            ))))
        }
        POST_INSERT => match serde_json::from_value::<PostInsertArgs>(arg) {
            Ok(args) => post_insert(backend, args).await,
            Err(e) => {
                warn!("postInsert: malformed arguments: {e}");
                Ok(None)
            }
        },
        other => {
            warn!("unknown command: {other}");
            Ok(None)
        }
    }
}

/// Expand an accepted candidate into a block wrapper at the trigger site.
///
/// A bare `src` insertion first prompts for a language; cancelling the prompt
/// aborts the whole expansion before any edit is applied, so no partial state
/// is ever left in the document.
async fn post_insert(backend: &Backend, args: PostInsertArgs) -> Result<Option<Value>> {
    let settings = backend.settings.read().await.clone();

    let wrapper = match template::classify(&args.insertion, &settings) {
        Expansion::SourcePrompt => {
            let Some(lang) = prompt_language(&backend.client, &settings).await else {
                debug!("postInsert: language prompt cancelled, aborting");
                return Ok(None);
            };
            BlockWrapper::for_language(&lang, &settings)
        }
        Expansion::Alias(full_name) => BlockWrapper::for_alias(&full_name),
        Expansion::Language(lang) => BlockWrapper::for_language(&lang, &settings),
    };

    let Some(path) = uri_to_path_buf(&args.uri) else {
        return Ok(None);
    };
    let Some(line) = backend.documents.line_at(&path, args.position.line as usize) else {
        warn!("postInsert: no open document line at {}", path.display());
        return Ok(None);
    };

    let (range, indent) = expansion_site(&line, args.position, &settings);
    let new_text = wrapper.render(&indent, settings.content_indent);

    let edit = WorkspaceEdit {
        changes: Some(HashMap::from([(
            args.uri.clone(),
            vec![TextEdit { range, new_text }],
        )])),
        ..WorkspaceEdit::default()
    };

    match backend.client.apply_edit(edit).await {
        Ok(response) if response.applied => {}
        Ok(response) => {
            warn!("postInsert: edit not applied: {:?}", response.failure_reason);
            return Ok(None);
        }
        Err(e) => {
            warn!("postInsert: applyEdit failed: {e}");
            return Ok(None);
        }
    }

    let cursor = Position::new(
        range.start.line + 1,
        as_pos_idx(indent.len() + settings.content_indent),
    );

    let edit = match settings.edit_style {
        EditStyle::Inline => None,
        EditStyle::Prompt => {
            if wrapper.is_sub_mode_editable() && confirm_edit(&backend.client).await {
                Some(EditDirective {
                    action: "editSource",
                    language: wrapper.edit_language().unwrap_or_default().to_owned(),
                })
            } else {
                None
            }
        }
        EditStyle::Auto => wrapper.edit_language().map(|lang| EditDirective {
            action: "editSource",
            language: lang.to_owned(),
        }),
    };

    let result = PostInsertResult { cursor, edit };
    Ok(serde_json::to_value(result).ok())
}

/// The range the expansion replaces (trigger+prefix through cursor, plus an
/// auto-paired `>` right after it) and the indentation continuation lines
/// reuse.
fn expansion_site(line: &str, position: Position, settings: &Settings) -> (Range, String) {
    let eol = line.trim_end_matches(['\n', '\r']).len();
    let cursor = utf16_to_byte_idx(line, position.character as usize).min(eol);
    let start = template::trigger_match(&line[..cursor], settings.complete_at_bol)
        .map_or(cursor, |m| m.start);

    let mut end_character = as_pos_idx(byte_to_utf16_idx(line, cursor));
    if line[cursor..].starts_with('>') {
        end_character += 1;
    }

    let indent = if settings.auto_indent {
        line[..line.len() - line.trim_start().len()].to_owned()
    } else {
        String::new()
    };

    (
        Range::new(
            Position::new(position.line, as_pos_idx(byte_to_utf16_idx(line, start))),
            Position::new(position.line, end_character),
        ),
        indent,
    )
}

async fn prompt_language(client: &Client, settings: &Settings) -> Option<String> {
    let actions: Vec<MessageActionItem> = settings
        .language_names()
        .into_iter()
        .map(|title| MessageActionItem {
            title,
            properties: HashMap::new(),
        })
        .collect();
    let actions = if actions.is_empty() { None } else { Some(actions) };

    client
        .show_message_request(MessageType::INFO, "Source block language:", actions)
        .await
        .ok()
        .flatten()
        .map(|item| item.title)
}

async fn confirm_edit(client: &Client) -> bool {
    let actions = vec![
        MessageActionItem {
            title: "Edit now".to_owned(),
            properties: HashMap::new(),
        },
        MessageActionItem {
            title: "Leave inline".to_owned(),
            properties: HashMap::new(),
        },
    ];
    matches!(
        client
            .show_message_request(
                MessageType::INFO,
                "Edit source block in a dedicated buffer?",
                Some(actions),
            )
            .await,
        Ok(Some(item)) if item.title == "Edit now"
    )
}
