use std::{fmt, fs, path::Path};

use crate::application::api::ApiError;

use super::error::InfraError;

/// Bearer token used for blog API requests.
///
/// A key file takes precedence over the environment. A missing token is not
/// an error until a request needs it.
#[derive(Clone, Default)]
pub struct CredentialSource {
    token: Option<String>,
}

impl CredentialSource {
    pub fn resolve(key_file: Option<&Path>, env_key: Option<String>) -> Result<Self, InfraError> {
        let token = match key_file {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|err| {
                    InfraError::configuration(format!(
                        "failed to read key file {}: {err}",
                        path.display()
                    ))
                })?;
                non_blank(raw)
            }
            None => env_key.and_then(non_blank),
        };
        Ok(Self { token })
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: non_blank(token.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.token.is_some()
    }

    pub fn bearer(&self) -> Result<String, ApiError> {
        self.token
            .as_deref()
            .map(|token| format!("Bearer {token}"))
            .ok_or(ApiError::MissingCredential)
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSource")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_blank(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn key_file_wins_over_env() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "  from-file  ").expect("write key");

        let source = CredentialSource::resolve(Some(file.path()), Some("from-env".into()))
            .expect("resolve");
        assert_eq!(source.bearer().expect("token"), "Bearer from-file");
    }

    #[test]
    fn env_is_used_without_key_file() {
        let source = CredentialSource::resolve(None, Some("from-env".into())).expect("resolve");
        assert_eq!(source.bearer().expect("token"), "Bearer from-env");
    }

    #[test]
    fn blank_sources_are_missing() {
        let source = CredentialSource::resolve(None, Some("   ".into())).expect("resolve");
        assert!(!source.is_present());
        assert_eq!(source.bearer(), Err(ApiError::MissingCredential));
    }

    #[test]
    fn unreadable_key_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.key");
        let err = CredentialSource::resolve(Some(&missing), None).expect_err("must fail");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let source = CredentialSource::from_token("secret");
        assert!(!format!("{source:?}").contains("secret"));
    }
}
