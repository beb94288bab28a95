//! Command URL templates.
//!
//! A template is a "/"-separated path such as `get/genus/_id`. Segments that
//! start with [`PLACEHOLDER_MARKER`] are named placeholders which must be
//! bound before the command can be built. Keyword clauses (`Filtering`,
//! `Sorting`, `GroupByField`) are appended as query parameters.

use crate::error::ProtocolError;
use crate::PLACEHOLDER_MARKER;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;
use std::fmt;

/// Characters left untouched by form encoding; space is handled separately.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

/// Query keywords understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Filtering,
    Sorting,
    GroupByField,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Filtering => "Filtering",
            Keyword::Sorting => "Sorting",
            Keyword::GroupByField => "GroupByField",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form-url-encodes a value: space becomes `+`, `A-Za-z0-9.-*_` are kept and
/// every other byte of the UTF-8 encoding becomes `%XX`.
pub fn form_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, part) in value.split(' ').enumerate() {
        if i > 0 {
            out.push('+');
        }
        out.extend(utf8_percent_encode(part, FORM_ENCODE_SET));
    }
    out
}

/// Lists the placeholder names of a template in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    template
        .split('/')
        .filter(|seg| seg.starts_with(PLACEHOLDER_MARKER))
        .collect()
}

/// Builds a command URL from a template, bound values and keyword clauses.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    template: String,
    prefix: Option<String>,
    bindings: HashMap<String, String>,
    clauses: Vec<(Keyword, String)>,
}

impl CommandBuilder {
    /// Creates a builder for the given template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            prefix: None,
            bindings: HashMap::new(),
            clauses: Vec::new(),
        }
    }

    /// Returns the template this builder was created with.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Binds a placeholder. The marker may be omitted: `bind("id", ..)` and
    /// `bind("_id", ..)` are equivalent.
    pub fn bind(mut self, name: &str, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    /// Binds several placeholders at once.
    pub fn bind_all<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        for (name, value) in params {
            self.set(name.as_ref(), value);
        }
        self
    }

    /// Binds a placeholder in place.
    pub fn set(&mut self, name: &str, value: impl ToString) {
        let key = if name.starts_with(PLACEHOLDER_MARKER) {
            name.to_string()
        } else {
            format!("{}{}", PLACEHOLDER_MARKER, name)
        };
        self.bindings.insert(key, value.to_string());
    }

    /// Sets a string prepended verbatim to the built command.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Stores a keyword clause. Setting an existing keyword replaces its value
    /// in place; an empty value removes the clause.
    pub fn clause(mut self, keyword: Keyword, value: impl Into<String>) -> Self {
        self.set_clause(keyword, value);
        self
    }

    /// In-place form of [`CommandBuilder::clause`].
    pub fn set_clause(&mut self, keyword: Keyword, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.clear_clause(keyword);
            return;
        }
        match self.clauses.iter_mut().find(|(k, _)| *k == keyword) {
            Some(entry) => entry.1 = value,
            None => self.clauses.push((keyword, value)),
        }
    }

    /// Removes a keyword clause if present.
    pub fn clear_clause(&mut self, keyword: Keyword) {
        self.clauses.retain(|(k, _)| *k != keyword);
    }

    /// Returns the clause value for a keyword.
    pub fn clause_value(&self, keyword: Keyword) -> Option<&str> {
        self.clauses
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, v)| v.as_str())
    }

    /// Produces the command string.
    pub fn build(&self) -> Result<String, ProtocolError> {
        let mut out = String::with_capacity(self.template.len() + 32);
        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
        }

        for (i, segment) in self.template.split('/').enumerate() {
            if i > 0 {
                out.push('/');
            }
            if segment.starts_with(PLACEHOLDER_MARKER) {
                let value = self.bindings.get(segment).ok_or_else(|| {
                    ProtocolError::MissingParameter {
                        name: segment.to_string(),
                        template: self.template.clone(),
                    }
                })?;
                out.push_str(value);
            } else {
                out.push_str(segment);
            }
        }

        let mut sep = '?';
        for (keyword, value) in &self.clauses {
            out.push(sep);
            out.push_str(keyword.as_str());
            out.push('=');
            out.push_str(&form_encode(value));
            sep = '&';
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_without_placeholders() {
        let cmd = CommandBuilder::new("list/genus").build().unwrap();
        assert_eq!(cmd, "list/genus");
    }

    #[test]
    fn test_bind_with_and_without_marker() {
        let cmd = CommandBuilder::new("update/genus/_id")
            .bind("_id", 12)
            .build()
            .unwrap();
        assert_eq!(cmd, "update/genus/12");

        let cmd = CommandBuilder::new("update/genus/_id")
            .bind("id", "12")
            .build()
            .unwrap();
        assert_eq!(cmd, "update/genus/12");
    }

    #[test]
    fn test_missing_parameter_names_placeholder() {
        let err = CommandBuilder::new("list/specimen/_nperpage/page/_num")
            .bind("_nperpage", 50)
            .build()
            .unwrap_err();
        match err {
            ProtocolError::MissingParameter { name, template } => {
                assert_eq!(name, "_num");
                assert_eq!(template, "list/specimen/_nperpage/page/_num");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prefix_is_verbatim() {
        let cmd = CommandBuilder::new("get/genus/_id")
            .with_prefix("http://dal.example.org/dal/")
            .bind_all([("_id", "3")])
            .build()
            .unwrap();
        assert_eq!(cmd, "http://dal.example.org/dal/get/genus/3");
    }

    #[test]
    fn test_clauses_in_insertion_order() {
        let cmd = CommandBuilder::new("list/trial/_nperpage/page/_num")
            .bind("nperpage", 10)
            .bind("num", 1)
            .clause(Keyword::Sorting, "TrialId DESC")
            .clause(Keyword::Filtering, "TrialName LIKE 'A%'")
            .build()
            .unwrap();
        assert_eq!(
            cmd,
            "list/trial/10/page/1?Sorting=TrialId+DESC&Filtering=TrialName+LIKE+%27A%25%27"
        );
    }

    #[test]
    fn test_clause_replace_and_remove() {
        let mut builder = CommandBuilder::new("list/genus")
            .clause(Keyword::Filtering, "a")
            .clause(Keyword::Sorting, "b");
        builder.set_clause(Keyword::Filtering, "c");
        assert_eq!(builder.build().unwrap(), "list/genus?Filtering=c&Sorting=b");

        builder.set_clause(Keyword::Filtering, "");
        assert_eq!(builder.clause_value(Keyword::Filtering), None);
        assert_eq!(builder.build().unwrap(), "list/genus?Sorting=b");

        builder.clear_clause(Keyword::Sorting);
        assert_eq!(builder.build().unwrap(), "list/genus");
    }

    #[test]
    fn test_form_encode() {
        assert_eq!(form_encode("a b"), "a+b");
        assert_eq!(form_encode("A-z.0_9*"), "A-z.0_9*");
        assert_eq!(form_encode("x=1&y"), "x%3D1%26y");
        assert_eq!(form_encode("é"), "%C3%A9");
        assert_eq!(form_encode(""), "");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("list/specimen/_nperpage/page/_num"),
            vec!["_nperpage", "_num"]
        );
        assert!(placeholders("list/group").is_empty());
    }

    #[test]
    fn test_trailing_empty_segment_kept() {
        let cmd = CommandBuilder::new("list/genus/").build().unwrap();
        assert_eq!(cmd, "list/genus/");
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = CommandBuilder::new("get/site/_id")
            .bind("id", 7)
            .clause(Keyword::GroupByField, "SiteTypeId");
        assert_eq!(builder.build().unwrap(), builder.build().unwrap());
    }

    fn template_strategy() -> impl Strategy<Value = Vec<(bool, String)>> {
        prop::collection::vec((any::<bool>(), "[a-z]{1,8}"), 1..8)
    }

    proptest! {
        #[test]
        fn prop_build_succeeds_iff_all_bound(segments in template_strategy(), skip in any::<prop::sample::Index>()) {
            let parts: Vec<String> = segments
                .iter()
                .enumerate()
                .map(|(i, (is_placeholder, name))| {
                    if *is_placeholder {
                        format!("_{}{}", name, i)
                    } else {
                        format!("{}{}", name, i)
                    }
                })
                .collect();
            let template = parts.join("/");
            let names = placeholders(&template);

            let all = CommandBuilder::new(template.as_str())
                .bind_all(names.iter().map(|n| (*n, "v")));
            prop_assert!(all.build().is_ok());

            if !names.is_empty() {
                let missing = names[skip.index(names.len())];
                let partial = CommandBuilder::new(template.as_str())
                    .bind_all(names.iter().filter(|n| **n != missing).map(|n| (*n, "v")));
                match partial.build() {
                    Err(ProtocolError::MissingParameter { name, .. }) => prop_assert_eq!(name, missing),
                    other => prop_assert!(false, "expected MissingParameter, got {:?}", other),
                }
            }
        }
    }
}
