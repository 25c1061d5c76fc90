use std::fmt;

/// Jenkins API token. Kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// User name and API token sent as HTTP basic auth on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: Token,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: impl Into<Token>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }

    /// Builds credentials only when both halves are present.
    pub fn from_parts(user: Option<&str>, token: Option<&str>) -> Option<Self> {
        match (user, token) {
            (Some(user), Some(token)) if !user.is_empty() => Some(Self::new(user, token)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_redacted_in_debug_output() {
        let creds = Credentials::new("alice", "s3cret");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn from_parts_requires_user_and_token() {
        assert!(Credentials::from_parts(Some("alice"), Some("t")).is_some());
        assert!(Credentials::from_parts(Some("alice"), None).is_none());
        assert!(Credentials::from_parts(None, Some("t")).is_none());
        assert!(Credentials::from_parts(Some(""), Some("t")).is_none());
    }
}
