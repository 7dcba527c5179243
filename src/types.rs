use std::{collections::BTreeMap, fmt};

/// Header map keyed by lower-cased header name.
pub type Headers = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful response with its payload decoded into `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
}

/// Inserts `name: value` with a lower-cased name, replacing any previous value.
pub(crate) fn insert_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    headers.insert(name.trim().to_ascii_lowercase(), value.into());
}

/// Merges `overrides` over `defaults`; on a name collision the override wins.
pub(crate) fn merge_headers(defaults: &Headers, overrides: &Headers) -> Headers {
    let mut merged = defaults.clone();
    for (name, value) in overrides {
        insert_header(&mut merged, name, value.clone());
    }
    merged
}
