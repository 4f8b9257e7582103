//! Backend domain stripping.
//!
//! Removes absolute and protocol-relative references to the backend's
//! hostname so that callers only ever see path-relative URLs.
//!
//! ```text
//! https://api.backend.example.com/login  →  /login
//! //cdn.backend.example.com/app.js       →  /app.js
//! ```

use std::borrow::Cow;

use regex::Regex;

/// Strips `(https?:)?//<labels>.<root>[:port]` from text.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct DomainRewriter {
    pattern: Regex,
    root_domain: String,
}

impl DomainRewriter {
    /// Compile the rewrite pattern for `root_domain`.
    pub fn new(root_domain: &str) -> Result<Self, regex::Error> {
        // Subdomain labels are consumed greedily, so a removal can never join
        // its surroundings into a fresh match.
        let pattern = Regex::new(&format!(
            r"(?:https?:)?//(?:[\w-]+\.)*{}(?::\d+)?",
            regex::escape(root_domain)
        ))?;

        Ok(Self {
            pattern,
            root_domain: root_domain.to_string(),
        })
    }

    /// The root domain this rewriter strips.
    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Remove every backend domain reference from `text`.
    ///
    /// Borrows the input when nothing matched.
    pub fn strip<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = self.pattern.replace_all(text, "");

        // A removal can leave a `/` that joins the next `/x.<root>` into a new
        // match. Every pass shortens the text, so this terminates.
        loop {
            let next = match self.pattern.replace_all(&out, "") {
                Cow::Borrowed(_) => None,
                Cow::Owned(next) => Some(next),
            };
            match next {
                Some(next) => out = Cow::Owned(next),
                None => return out,
            }
        }
    }
}
