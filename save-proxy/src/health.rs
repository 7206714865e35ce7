use serde::Serialize;

use crate::config::Secrets;

/// Configuration status exposed on the health path. Reports whether the
/// secrets are set, never their values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub client_shared_key_present: bool,
    pub client_shared_key_length: usize,
    pub github_token_present: bool,
}

impl HealthReport {
    pub fn from_secrets(secrets: &Secrets) -> Self {
        let key_length = secrets.client_shared_key_len();
        HealthReport {
            ok: true,
            client_shared_key_present: key_length > 0,
            client_shared_key_length: key_length,
            github_token_present: !secrets.store_token.is_empty(),
        }
    }
}
