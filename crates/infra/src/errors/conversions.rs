//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use meshport_common::KeychainError;
use meshport_domain::MeshportError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MeshportError);

impl From<InfraError> for MeshportError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MeshportError> for InfraError {
    fn from(value: MeshportError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoMeshportError {
    fn into_meshport(self) -> MeshportError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → MeshportError */
/* -------------------------------------------------------------------------- */

impl IntoMeshportError for KeyringError {
    fn into_meshport(self) -> MeshportError {
        use KeyringError::{Ambiguous, BadEncoding, NoEntry, NoStorageAccess, PlatformFailure};

        let description = self.to_string();

        match self {
            NoEntry => MeshportError::Storage("keychain entry not found".into()),
            BadEncoding(_) => {
                MeshportError::Storage("credential in keychain is not valid UTF-8".into())
            }
            Ambiguous(entries) => MeshportError::Storage(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => {
                MeshportError::Storage(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                MeshportError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => MeshportError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_meshport())
    }
}

impl IntoMeshportError for KeychainError {
    fn into_meshport(self) -> MeshportError {
        match self {
            KeychainError::Keyring(err) => err.into_meshport(),
            KeychainError::NotFound => MeshportError::Storage("keychain entry not found".into()),
            KeychainError::AccessFailed(message) => MeshportError::Storage(message),
        }
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        InfraError(value.into_meshport())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MeshportError */
/* -------------------------------------------------------------------------- */

impl IntoMeshportError for HttpError {
    fn into_meshport(self) -> MeshportError {
        if self.is_timeout() {
            return MeshportError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return MeshportError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return MeshportError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() {
            return MeshportError::malformed(self.to_string());
        }

        if let Some(status) = self.status() {
            return MeshportError::protocol(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status"),
            );
        }

        MeshportError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_meshport())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn keyring_no_entry_maps_to_storage() {
        let mapped: MeshportError = InfraError::from(KeyringError::NoEntry).into();
        match mapped {
            MeshportError::Storage(msg) => assert!(msg.contains("keychain")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn keychain_access_failure_keeps_message() {
        let err = KeychainError::AccessFailed("locked".into());
        let mapped: MeshportError = InfraError::from(err).into();
        assert_eq!(mapped, MeshportError::Storage("locked".into()));
    }

    #[tokio::test]
    async fn http_status_maps_to_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: MeshportError = InfraError::from(error).into();
        match mapped {
            MeshportError::Protocol { status: Some(503), .. } => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_maps_to_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped: MeshportError = InfraError::from(error).into();
        assert!(matches!(mapped, MeshportError::Network(_)));
    }
}
