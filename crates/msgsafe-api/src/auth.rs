//! Request authentication.

use async_trait::async_trait;

use msgsafe_core::SafeResult;

/// Supplies a bearer token when no explicit server credentials exist
/// (managed/on-prem deployments).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// `Ok(None)` means no token is available; the request goes out
    /// unauthenticated.
    async fn bearer_token(&self) -> SafeResult<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { user: String, password: String },
    Bearer(String),
    None,
}

/// Resolve authentication for a request.
///
/// Explicit user + password win; otherwise the token provider is asked;
/// otherwise the request is anonymous. A user without a password (or the
/// reverse) does not count as explicit credentials.
pub async fn resolve_auth(
    user: Option<&str>,
    password: Option<&str>,
    tokens: Option<&dyn TokenProvider>,
) -> SafeResult<Auth> {
    if let (Some(user), Some(password)) = (
        user.filter(|u| !u.is_empty()),
        password.filter(|p| !p.is_empty()),
    ) {
        return Ok(Auth::Basic {
            user: user.to_string(),
            password: password.to_string(),
        });
    }
    if let Some(tokens) = tokens {
        if let Some(token) = tokens.bearer_token().await? {
            return Ok(Auth::Bearer(token));
        }
    }
    Ok(Auth::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedToken(Option<String>);

    #[async_trait]
    impl TokenProvider for FixedToken {
        async fn bearer_token(&self) -> SafeResult<Option<String>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn explicit_credentials_win_over_token() {
        let tokens = FixedToken(Some("tok".into()));
        let auth = resolve_auth(Some("user"), Some("pass"), Some(&tokens))
            .await
            .unwrap();
        assert_eq!(
            auth,
            Auth::Basic {
                user: "user".into(),
                password: "pass".into()
            }
        );
    }

    #[tokio::test]
    async fn partial_credentials_fall_back_to_token() {
        let tokens = FixedToken(Some("tok".into()));
        let auth = resolve_auth(Some("user"), None, Some(&tokens)).await.unwrap();
        assert_eq!(auth, Auth::Bearer("tok".into()));
    }

    #[tokio::test]
    async fn no_credentials_no_token_is_anonymous() {
        let tokens = FixedToken(None);
        assert_eq!(
            resolve_auth(None, None, Some(&tokens)).await.unwrap(),
            Auth::None
        );
        assert_eq!(resolve_auth(None, None, None).await.unwrap(), Auth::None);
    }
}
