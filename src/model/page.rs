//! Link-following page envelope.

use serde::Deserialize;

/// One page of a paginated collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub links: Option<Links>,
}

/// Navigation links of a page. Both are relative to the API root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// The next link, if one is present and non-empty.
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.next.as_deref())
            .filter(|next| !next.is_empty())
    }
}
