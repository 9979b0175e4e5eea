//! Backend-conditional text.
//!
//! Spec documents embed per-backend alternatives as tagged comments, for
//! example `/*MYSQL INT(11) *//*SQLITE INTEGER */`. The comments are parsed
//! once, when the document is loaded, into a list of fragments; rendering
//! for a backend is then a plain concatenation.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// One piece of backend-conditional text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// Text shared by every backend.
    Shared(String),
    /// Text that only applies to one backend.
    Only(Backend, String),
}

/// Text with optional per-backend alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DialectedRepr", into = "String")]
pub struct Dialected {
    fragments: Vec<Fragment>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DialectedRepr {
    Text(String),
    PerBackend { mysql: String, sqlite: String },
}

impl From<DialectedRepr> for Dialected {
    fn from(repr: DialectedRepr) -> Self {
        match repr {
            DialectedRepr::Text(text) => Self::parse(&text),
            DialectedRepr::PerBackend { mysql, sqlite } => Self::per_backend(mysql, sqlite),
        }
    }
}

impl From<Dialected> for String {
    fn from(value: Dialected) -> Self {
        value.render()
    }
}

impl From<&str> for Dialected {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl Dialected {
    /// Text that is identical on every backend.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![Fragment::Shared(text.into())],
        }
    }

    /// One alternative per backend, nothing shared.
    #[must_use]
    pub fn per_backend(mysql: impl Into<String>, sqlite: impl Into<String>) -> Self {
        Self {
            fragments: vec![
                Fragment::Only(Backend::MySql, mysql.into()),
                Fragment::Only(Backend::Sqlite, sqlite.into()),
            ],
        }
    }

    /// Parses marker comments out of `text`.
    ///
    /// Comment openers inside single or double quoted literals are left
    /// alone. Comments whose tag is not a known backend marker are dropped,
    /// and an unterminated comment is kept verbatim.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut fragments = Vec::new();
        let mut shared = String::new();
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            if quote.is_none() && rest.starts_with("/*") {
                let Some(end) = rest[2..].find("*/") else {
                    shared.push_str(rest);
                    break;
                };
                if !shared.is_empty() {
                    fragments.push(Fragment::Shared(std::mem::take(&mut shared)));
                }
                let body = &rest[2..2 + end];
                if let Some(backend) = Backend::ALL
                    .into_iter()
                    .find(|backend| body.starts_with(backend.marker()))
                {
                    let value = body[backend.marker().len()..].trim();
                    fragments.push(Fragment::Only(backend, value.to_string()));
                }
                pos += 2 + end + 2;
                continue;
            }

            let Some(c) = rest.chars().next() else { break };
            match quote {
                _ if escaped => escaped = false,
                Some(_) if c == '\\' => escaped = true,
                Some(q) if c == q => quote = None,
                None if c == '\'' || c == '"' => quote = Some(c),
                _ => {}
            }
            shared.push(c);
            pos += c.len_utf8();
        }

        if !shared.is_empty() {
            fragments.push(Fragment::Shared(shared));
        }
        Self { fragments }
    }

    /// Returns the text as seen by `backend`.
    #[must_use]
    pub fn resolve(&self, backend: Backend) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Shared(text) => out.push_str(text),
                Fragment::Only(b, text) if *b == backend => out.push_str(text),
                Fragment::Only(..) => {}
            }
        }
        out.trim().to_string()
    }

    /// Renders back to marker syntax.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Shared(text) => out.push_str(text),
                Fragment::Only(backend, text) => {
                    out.push_str(&format!("/*{} {} */", backend.marker(), text));
                }
            }
        }
        out
    }

    /// Returns the parsed fragments.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Returns true if the text resolves to nothing on every backend.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Backend::ALL
            .into_iter()
            .all(|backend| self.resolve(backend).is_empty())
    }
}
