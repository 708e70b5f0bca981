use crate::document_store::DocumentStore;
use crate::ext::duration::DurationFormat;
use crate::settings::Settings;
use crate::template::{self, BlockWrapper, Expansion, BEGIN_PREFIX, END_PREFIX, SOURCE_BLOCK};
use crate::utils::{as_pos_idx, byte_to_utf16_idx, paths::uri_to_path_buf, utf16_to_byte_idx};
use log::debug;
use std::time::Instant;
use tower_lsp_server::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, CompletionTextEdit,
    Documentation, InsertTextFormat, MarkupContent, MarkupKind, Position, Range, TextEdit,
};

pub fn handle_completion(
    settings: &Settings,
    documents: &DocumentStore,
    params: &CompletionParams,
) -> Option<CompletionResponse> {
    let start = Instant::now();
    let position = params.text_document_position.position;

    let path = uri_to_path_buf(&params.text_document_position.text_document.uri)?;
    let line = documents.line_at(&path, position.line as usize)?;

    let eol = line.trim_end_matches(['\n', '\r']).len();
    let cursor = utf16_to_byte_idx(&line, position.character as usize).min(eol);
    let trigger = template::trigger_match(&line[..cursor], settings.complete_at_bol)?;

    let range = replaced_range(&line, position.line, trigger.start, cursor);
    let indent = if settings.auto_indent {
        leading_whitespace(&line)
    } else {
        ""
    };

    let items: Vec<CompletionItem> = settings
        .candidates(&trigger.prefix)
        .into_iter()
        .map(|candidate| {
            let new_text = snippet_for(&candidate, settings, indent);
            CompletionItem {
                label: candidate.clone(),
                kind: Some(CompletionItemKind::SNIPPET),
                detail: Some(detail_for(&candidate, settings)),
                documentation: Some(Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: format!("```org\n{}\n```", template::preview(&candidate, settings)),
                })),
                insert_text_format: Some(InsertTextFormat::SNIPPET),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit { range, new_text })),
                ..Default::default()
            }
        })
        .collect();

    debug!(
        "completion in {}: {} L{}C{} <{} -> {} items",
        start.elapsed().log_str(),
        path.display(),
        position.line + 1,
        position.character + 1,
        trigger.prefix,
        items.len()
    );

    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// The range the accepted candidate replaces: trigger through cursor, plus an
/// auto-paired `>` immediately after the cursor if the editor inserted one.
/// `trigger_start` and `cursor` are byte offsets into `line`; the returned
/// range is in UTF-16 code units as the protocol requires.
fn replaced_range(line: &str, line_number: u32, trigger_start: usize, cursor: usize) -> Range {
    let mut end_character = as_pos_idx(byte_to_utf16_idx(line, cursor));
    if line[cursor..].starts_with('>') {
        end_character += 1;
    }
    Range::new(
        Position::new(line_number, as_pos_idx(byte_to_utf16_idx(line, trigger_start))),
        Position::new(line_number, end_character),
    )
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn snippet_for(candidate: &str, settings: &Settings, indent: &str) -> String {
    match template::classify(candidate, settings) {
        // No prompt is possible mid-completion, so bare `src` gets a
        // placeholder over the known languages instead.
        Expansion::SourcePrompt => {
            let languages = settings.language_names();
            let placeholder = if languages.is_empty() {
                "${1:language}".to_owned()
            } else {
                format!("${{1|{}|}}", languages.join(","))
            };
            let content_indent = settings.content_indent;
            format!(
                "{BEGIN_PREFIX}{SOURCE_BLOCK} {placeholder}\n{indent}{:content_indent$}$0\n{indent}{END_PREFIX}{SOURCE_BLOCK}",
                ""
            )
        }
        Expansion::Alias(full_name) => {
            BlockWrapper::for_alias(&full_name).render_snippet(indent, settings.content_indent)
        }
        Expansion::Language(lang) => {
            BlockWrapper::for_language(&lang, settings).render_snippet(indent, settings.content_indent)
        }
    }
}

fn detail_for(candidate: &str, settings: &Settings) -> String {
    match template::classify(candidate, settings) {
        Expansion::SourcePrompt => "source block".to_owned(),
        Expansion::Alias(full_name) => format!("{BEGIN_PREFIX}{full_name} block"),
        Expansion::Language(lang) => format!("{lang} source block"),
    }
}
