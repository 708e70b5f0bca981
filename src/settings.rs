use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// What to do after a source block has been inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStyle {
    /// Leave the cursor in the block body.
    Inline,
    /// Ask before opening a dedicated edit buffer.
    Prompt,
    /// Open a dedicated edit buffer whenever a concrete language is known.
    Auto,
}

/// Client-supplied configuration: the four behavior toggles plus the three
/// tables candidates are drawn from. Sent as `initializationOptions` and
/// replaced wholesale by `workspace/didChangeConfiguration`.
///
/// Table values are kept as raw JSON so that legacy shapes (non-string alias
/// values, malformed header argument lists) degrade to "entry skipped"
/// instead of rejecting the whole configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Only trigger when `<` is the first non-whitespace character on the line.
    pub complete_at_bol: bool,
    /// Append per-language header defaults to the opening line.
    pub explicit_lang_defaults: bool,
    pub edit_style: EditStyle,
    /// Reuse the current line's indentation for the inserted block.
    pub auto_indent: bool,
    /// Number of spaces the empty block body is indented by.
    pub content_indent: usize,
    /// Language name -> loader info. Only the keys matter here.
    pub languages: BTreeMap<String, Value>,
    /// Short key -> full block-type string, e.g. `"s" -> "src"`.
    pub aliases: BTreeMap<String, Value>,
    /// Language name -> tangle file extension. Only the keys matter here.
    pub tangle_extensions: BTreeMap<String, Value>,
    /// Language name -> ordered `[key, value]` header argument pairs.
    pub header_defaults: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            complete_at_bol: true,
            explicit_lang_defaults: true,
            edit_style: EditStyle::Auto,
            auto_indent: true,
            content_indent: 2,
            languages: BTreeMap::new(),
            aliases: BTreeMap::new(),
            tangle_extensions: BTreeMap::new(),
            header_defaults: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Parse a settings payload, accepting either the bare settings object or
    /// one nested under an `"orgBlock"` key. Each field is read independently,
    /// so one unusable value falls back to that field's default and leaves the
    /// rest of the payload intact.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let section = value.get("orgBlock").unwrap_or(value);
        let mut settings = Self::default();
        let Some(map) = section.as_object() else {
            return settings;
        };

        read_field(map, "completeAtBol", &mut settings.complete_at_bol);
        read_field(map, "explicitLangDefaults", &mut settings.explicit_lang_defaults);
        read_field(map, "editStyle", &mut settings.edit_style);
        read_field(map, "autoIndent", &mut settings.auto_indent);
        read_field(map, "contentIndent", &mut settings.content_indent);
        read_field(map, "languages", &mut settings.languages);
        read_field(map, "aliases", &mut settings.aliases);
        read_field(map, "tangleExtensions", &mut settings.tangle_extensions);
        read_field(map, "headerDefaults", &mut settings.header_defaults);
        settings
    }

    /// The deduplicated, sorted union of language names, alias full-name
    /// strings, and tangle-table language names, filtered to entries that
    /// start with `prefix`. Byte-wise and case-sensitive throughout.
    #[must_use]
    pub fn candidates(&self, prefix: &str) -> Vec<String> {
        let mut set = BTreeSet::new();
        set.extend(self.language_names());
        set.extend(
            self.aliases
                .values()
                .filter_map(Value::as_str)
                .map(str::to_owned),
        );
        set.extend(
            self.tangle_extensions
                .keys()
                .filter(|k| is_language_name(k))
                .cloned(),
        );
        set.into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    /// Well-formed keys of the language table, sorted.
    #[must_use]
    pub fn language_names(&self) -> Vec<String> {
        self.languages
            .keys()
            .filter(|k| is_language_name(k))
            .cloned()
            .collect()
    }

    /// Whether `insertion` is one of the alias full-name strings (a value of
    /// the alias table, not a key).
    #[must_use]
    pub fn is_alias(&self, insertion: &str) -> bool {
        self.aliases
            .values()
            .filter_map(Value::as_str)
            .any(|v| v == insertion)
    }

    /// Fold the header defaults for `lang` into ` :key1 value1 :key2 value2`,
    /// preserving the table's ordering. Unknown language or malformed entry
    /// yields the empty string.
    #[must_use]
    pub fn header_defaults(&self, lang: &str) -> String {
        let Some(value) = self.header_defaults.get(lang) else {
            return String::new();
        };
        let Ok(pairs) = serde_json::from_value::<Vec<(String, String)>>(value.clone()) else {
            return String::new();
        };

        let mut folded = String::new();
        for (key, val) in pairs {
            folded.push(' ');
            if !key.starts_with(':') {
                folded.push(':');
            }
            folded.push_str(&key);
            folded.push(' ');
            folded.push_str(&val);
        }
        folded
    }
}

fn read_field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, slot: &mut T) {
    if let Some(value) = map.get(key) {
        if let Ok(parsed) = serde_json::from_value(value.clone()) {
            *slot = parsed;
        }
    }
}

/// Language names come from symbol-keyed host tables; anything else (numeric
/// keys, embedded whitespace) is a legacy shape and is skipped.
fn is_language_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}
