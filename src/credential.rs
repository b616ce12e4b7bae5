//! Credentials attached to outbound requests.
//!
//! Token acquisition lives outside this crate. A [`Credential`] is handed to each HTTP client at
//! construction time and only knows how to decorate a request with the header it carries.

use reqwest::RequestBuilder;

/// Authentication material for one remote service.
#[derive(Clone, Default)]
pub enum Credential {
    /// Static key sent in a service-specific header (e.g. `api-key`).
    ApiKey {
        /// Header name expected by the service.
        header: &'static str,
        /// Secret value.
        key: String,
    },
    /// Bearer token issued by an external identity provider.
    Bearer(String),
    /// No authentication; used against local emulators and test servers.
    #[default]
    Anonymous,
}

impl Credential {
    /// Prefer an API key, fall back to a bearer token, otherwise send requests unauthenticated.
    pub fn resolve(header: &'static str, api_key: Option<&str>, token: Option<&str>) -> Self {
        match (api_key, token) {
            (Some(key), _) if !key.is_empty() => Self::ApiKey {
                header,
                key: key.to_string(),
            },
            (_, Some(token)) if !token.is_empty() => Self::Bearer(token.to_string()),
            _ => Self::Anonymous,
        }
    }

    /// Decorate a request with this credential.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::ApiKey { header, key } => request.header(*header, key),
            Self::Bearer(token) => request.bearer_auth(token),
            Self::Anonymous => request,
        }
    }

    /// Short label used in logs; never includes the secret.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey { .. } => "api-key",
            Self::Bearer(_) => "bearer",
            Self::Anonymous => "anonymous",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_takes_precedence_over_token() {
        let credential = Credential::resolve("api-key", Some("secret"), Some("token"));
        assert!(matches!(credential, Credential::ApiKey { header: "api-key", ref key } if key == "secret"));
    }

    #[test]
    fn falls_back_to_bearer_then_anonymous() {
        assert!(matches!(
            Credential::resolve("api-key", None, Some("token")),
            Credential::Bearer(_)
        ));
        assert!(matches!(
            Credential::resolve("api-key", Some(""), None),
            Credential::Anonymous
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let credential = Credential::resolve("api-key", Some("secret"), None);
        assert_eq!(format!("{credential:?}"), "api-key");
    }
}
