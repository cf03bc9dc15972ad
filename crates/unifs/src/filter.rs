// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use crate::{Error, Result};

#[cfg(test)]
#[path = "./filter_test.rs"]
mod filter_test;

/// A compiled search filter matched against a single path name segment.
///
/// Filters support `*` (any run of characters) and `?` (a single
/// character); everything else matches literally. A trailing `.*` also
/// matches names that carry no extension at all, so `foo.*` accepts both
/// `foo` and `foo.bar`.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    form: Form,
}

#[derive(Debug, Clone)]
enum Form {
    /// `""`, `"*"` and `"*.*"` match every name
    All,
    /// no special characters, plain string equality
    Exact(String),
    Regex(regex::Regex),
}

impl SearchPattern {
    /// Compile a filter string.
    ///
    /// Filters apply to a single name segment and so must not contain
    /// directory separators.
    pub fn parse(filter: &str) -> Result<Self> {
        if filter.contains('/') || filter.contains('\\') {
            return Err(Error::invalid_filter(
                filter,
                "filters must not contain directory separators",
            ));
        }
        if matches!(filter, "" | "*" | "*.*") {
            return Ok(Self { form: Form::All });
        }
        if !filter.contains(['*', '?', '.']) {
            return Ok(Self {
                form: Form::Exact(filter.to_string()),
            });
        }

        // a trailing `.*` also matches the bare name with no extension
        let (body, optional_extension) = match filter.strip_suffix(".*") {
            Some(body) if !body.is_empty() => (body, true),
            _ => (filter, false),
        };
        let mut pattern = String::with_capacity(filter.len() + 8);
        pattern.push('^');
        for ch in body.chars() {
            match ch {
                '*' => pattern.push_str(".*?"),
                '?' => pattern.push('.'),
                '.' => pattern.push_str("\\."),
                ch if is_regex_meta(ch) => {
                    pattern.push('\\');
                    pattern.push(ch);
                }
                ch => pattern.push(ch),
            }
        }
        if optional_extension {
            pattern.push_str("(\\.[^.]*)?");
        }
        pattern.push('$');

        let regex = regex::Regex::new(&pattern)
            .map_err(|err| Error::invalid_filter(filter, err.to_string()))?;
        Ok(Self {
            form: Form::Regex(regex),
        })
    }

    /// True if the given name segment matches this filter.
    pub fn matches(&self, name: &str) -> bool {
        match &self.form {
            Form::All => true,
            Form::Exact(exact) => exact == name,
            Form::Regex(regex) => regex.is_match(name),
        }
    }
}

fn is_regex_meta(ch: char) -> bool {
    matches!(
        ch,
        '\\' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|'
    )
}
