use secrecy::{ExposeSecret, SecretString};

/// Basic-auth credentials for a git remote. The core resolves these from an
/// external secret store; this type only carries the resolved value.
#[derive(Clone)]
pub struct GitAuth {
    pub username: String,
    pub password: SecretString,
}

impl GitAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub(crate) fn credentials_callback(
        &self,
    ) -> impl Fn(&str, Option<&str>, git2::CredentialType) -> Result<git2::Cred, git2::Error> + '_ {
        move |_url, _username_from_url, _allowed_types| {
            git2::Cred::userpass_plaintext(&self.username, self.password.expose_secret())
        }
    }
}

impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitAuth").field("username", &self.username).finish_non_exhaustive()
    }
}
