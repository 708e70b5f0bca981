use crate::settings::Settings;
use regex::Regex;
use std::sync::LazyLock;

pub const BEGIN_PREFIX: &str = "#+begin_";
pub const END_PREFIX: &str = "#+end_";

/// The one block type with no inherent language.
pub const SOURCE_BLOCK: &str = "src";

static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([^\s<]*)$").unwrap());
static TRIGGER_BOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<([^\s<]*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Byte offset of the `<` trigger character within the searched text.
    pub start: usize,
    /// The partial name typed after the trigger. May be empty.
    pub prefix: String,
}

/// Detect a `<name` run ending exactly at the cursor. With `at_bol_only` the
/// trigger must be the first non-whitespace character of the line.
pub fn trigger_match(before_cursor: &str, at_bol_only: bool) -> Option<TriggerMatch> {
    let re = if at_bol_only {
        &TRIGGER_BOL_RE
    } else {
        &TRIGGER_RE
    };
    let prefix = re.captures(before_cursor)?.get(1)?;
    Some(TriggerMatch {
        start: prefix.start() - 1,
        prefix: prefix.as_str().to_owned(),
    })
}

/// The three mutually exclusive expansion branches, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Bare `src`: a concrete language must be supplied before rendering.
    SourcePrompt,
    /// A structure-template alias full name, possibly multi-word.
    Alias(String),
    /// Anything else is treated as a language name.
    Language(String),
}

pub fn classify(insertion: &str, settings: &Settings) -> Expansion {
    if insertion == SOURCE_BLOCK {
        Expansion::SourcePrompt
    } else if settings.is_alias(insertion) {
        Expansion::Alias(insertion.to_owned())
    } else {
        Expansion::Language(insertion.to_owned())
    }
}

/// The text after `#+begin_` and `#+end_` on the wrapper lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWrapper {
    pub begin: String,
    pub end: String,
}

impl BlockWrapper {
    /// A `src` block for `lang` (empty for a bare preview), with the
    /// language's header defaults appended when enabled.
    #[must_use]
    pub fn for_language(lang: &str, settings: &Settings) -> Self {
        let mut begin = String::from(SOURCE_BLOCK);
        if !lang.is_empty() {
            begin.push(' ');
            begin.push_str(lang);
            if settings.explicit_lang_defaults {
                begin.push_str(&settings.header_defaults(lang));
            }
        }
        Self {
            begin,
            end: SOURCE_BLOCK.to_owned(),
        }
    }

    /// A block named by an alias full-name string. Aliases may be multi-word
    /// (`src emacs-lisp`); only the first token closes the block.
    #[must_use]
    pub fn for_alias(full_name: &str) -> Self {
        let end = full_name
            .split_whitespace()
            .next()
            .unwrap_or(full_name)
            .to_owned();
        Self {
            begin: full_name.to_owned(),
            end,
        }
    }

    /// Whether the host could edit this block's body in a dedicated
    /// language-specific buffer.
    #[must_use]
    pub fn is_sub_mode_editable(&self) -> bool {
        self.begin.split_whitespace().next() == Some(SOURCE_BLOCK)
    }

    /// The concrete language to edit the body in, when one is resolvable.
    #[must_use]
    pub fn edit_language(&self) -> Option<&str> {
        let mut tokens = self.begin.split_whitespace();
        if tokens.next()? != SOURCE_BLOCK {
            return None;
        }
        tokens.next().filter(|t| !t.starts_with(':'))
    }

    /// The full wrapper text: opening line, an empty body line indented by
    /// `content_indent` spaces, and the closing line. `indent` is prepended
    /// to every line but the first, which starts where the trigger was.
    #[must_use]
    pub fn render(&self, indent: &str, content_indent: usize) -> String {
        format!(
            "{BEGIN_PREFIX}{}\n{indent}{:content_indent$}\n{indent}{END_PREFIX}{}",
            self.begin, "", self.end
        )
    }

    /// Like [`render`](Self::render), as an LSP snippet leaving the cursor on
    /// the body line.
    #[must_use]
    pub fn render_snippet(&self, indent: &str, content_indent: usize) -> String {
        format!(
            "{BEGIN_PREFIX}{}\n{indent}{:content_indent$}$0\n{indent}{END_PREFIX}{}",
            self.begin, "", self.end
        )
    }
}

/// Render what expanding `candidate` would produce, on a scratch string.
/// A bare `src` candidate is previewed with an empty language insertion.
#[must_use]
pub fn preview(candidate: &str, settings: &Settings) -> String {
    let wrapper = match classify(candidate, settings) {
        Expansion::SourcePrompt => BlockWrapper::for_language("", settings),
        Expansion::Alias(full_name) => BlockWrapper::for_alias(&full_name),
        Expansion::Language(lang) => BlockWrapper::for_language(&lang, settings),
    };
    wrapper.render("", settings.content_indent)
}
