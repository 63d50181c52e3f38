// keywords.rs: keyword searches typed into the location bar
//
// File: $XDG_CONFIG_HOME/lariza/keywordsearch
//
//   # keyword  template
//   g   https://www.google.com/search?q=%s
//   w   https://en.wikipedia.org/w/index.php?search=%s
//
// Typing "w rust language" then loads the wikipedia template with `%s`
// replaced by "rust%20language".

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Keywords {
    templates: HashMap<String, String>,
}

impl Keywords {
    /// A missing or unreadable file just means no keywords.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let keywords = Self::parse(&text);
                tracing::info!(
                    "Loaded {} keyword search(es) from {}",
                    keywords.len(),
                    path.display()
                );
                keywords
            }
            Err(e) => {
                tracing::debug!("No keyword searches ({}: {e})", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let templates = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(' '))
            .map(|(keyword, template)| (keyword, template.trim()))
            .filter(|(_, template)| !template.is_empty())
            .map(|(keyword, template)| (keyword.to_owned(), template.to_owned()))
            .collect();
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// `"<keyword> <query>"` → search URI, if the keyword is known.
    pub fn expand(&self, input: &str) -> Option<String> {
        let (keyword, query) = input.split_once(' ')?;
        let template = self.templates.get(keyword)?;
        Some(template.replacen("%s", &escape_query(query), 1))
    }
}

/// Percent-escape everything except RFC 3986 unreserved characters. Non-ASCII
/// UTF-8 is left as-is.
pub fn escape_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut rest = query;
    while !rest.is_empty() {
        let ascii_end = rest.find(|c: char| !c.is_ascii()).unwrap_or(rest.len());
        out.push_str(&urlencoding::encode(&rest[..ascii_end]));
        let tail = &rest[ascii_end..];
        let wide_end = tail.find(|c: char| c.is_ascii()).unwrap_or(tail.len());
        out.push_str(&tail[..wide_end]);
        rest = &tail[wide_end..];
    }
    out
}

// ── tests ─────────────────────────────────────────────────────────────────────
