use std::fmt;

/// Methods a timer callback may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parse a declared method, case-insensitively. `None` for anything outside the closed set.
    pub fn parse(method: &str) -> Option<Self> {
        match method.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Method for a timer's declared `methods`: the first entry, POST when empty.
    pub fn from_declared(methods: &[String]) -> Result<Self, String> {
        match methods.first() {
            None => Ok(Self::default()),
            Some(m) => Self::parse(m).ok_or_else(|| m.clone()),
        }
    }

    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_reqwest(), f)
    }
}
