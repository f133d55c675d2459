//! C8 — per-client mapping from short reference tokens (`@e1`, `@e2`, ...)
//! to the CSS selector produced by the most recent find/find-all/map call
//! (spec §3 "RefTable", §4.2 "Ref-token expansion").

use std::collections::HashMap;

/// Parses a `@e<n>` token. Returns `None` for anything else, including a
/// leading `@e` followed by non-digits — such tokens pass through unchanged
/// and the caller gets a normal not-found error (spec §4.2).
pub fn parse_ref_token(selector: &str) -> Option<u32> {
    let rest = selector.strip_prefix("@e")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

#[derive(Debug, Default, Clone)]
pub struct RefTable {
    entries: HashMap<u32, String>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the table wholesale with `selectors`, keyed `@e1..@en` in
    /// the order given (spec: "Replaced wholesale on each find/find-all/map").
    pub fn install(&mut self, selectors: impl IntoIterator<Item = String>) {
        self.entries.clear();
        for (i, selector) in selectors.into_iter().enumerate() {
            self.entries.insert(i as u32 + 1, selector);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, n: u32) -> Option<&str> {
        self.entries.get(&n).map(String::as_str)
    }

    /// Expands `selector` if it is a `@eN` ref token with a known binding;
    /// otherwise returns it unchanged (spec §4.2).
    pub fn expand<'a>(&self, selector: &'a str) -> std::borrow::Cow<'a, str> {
        match parse_ref_token(selector).and_then(|n| self.get(n)) {
            Some(resolved) => std::borrow::Cow::Owned(resolved.to_string()),
            None => std::borrow::Cow::Borrowed(selector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_tokens() {
        assert_eq!(parse_ref_token("@e1"), Some(1));
        assert_eq!(parse_ref_token("@e42"), Some(42));
    }

    #[test]
    fn rejects_non_tokens() {
        assert_eq!(parse_ref_token("@e"), None);
        assert_eq!(parse_ref_token("@ex"), None);
        assert_eq!(parse_ref_token(".foo"), None);
        assert_eq!(parse_ref_token("e1"), None);
    }

    #[test]
    fn find_all_installs_document_order_keys() {
        let mut table = RefTable::new();
        table.install(vec!["li:nth-child(1)".into(), "li:nth-child(2)".into()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some("li:nth-child(1)"));
        assert_eq!(table.get(2), Some("li:nth-child(2)"));
    }

    #[test]
    fn unknown_token_passes_through_unchanged() {
        let table = RefTable::new();
        assert_eq!(table.expand("@e5"), "@e5");
    }

    #[test]
    fn known_token_expands_to_selector() {
        let mut table = RefTable::new();
        table.install(vec!["a.link".into()]);
        assert_eq!(table.expand("@e1"), "a.link");
    }

    #[test]
    fn install_replaces_wholesale() {
        let mut table = RefTable::new();
        table.install(vec!["a".into(), "b".into(), "c".into()]);
        table.install(vec!["x".into()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(2), None);
    }
}
