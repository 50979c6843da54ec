//! Integration tests for the UI-facing commands
//!
//! The browser and listener are in-memory doubles; the token endpoint and
//! platform APIs are wiremock servers behind the real HTTP clients.

use std::sync::Arc;

use meshport_core::testing::{FakeAuthorizationServer, InMemorySettingsStore};
use meshport_domain::{
    AuthConfig, CatalogConfig, Config, ExportConfig, MeshportError, WorkflowState,
};
use meshport_lib::commands;
use meshport_lib::context::{AppContext, HostPorts};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    ctx: AppContext,
    settings: Arc<InMemorySettingsStore>,
    api: MockServer,
    _idp: MockServer,
}

async fn harness(server: FakeAuthorizationServer) -> Harness {
    let idp = MockServer::start().await;
    let api = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3600
        })))
        .mount(&idp)
        .await;
    Mock::given(method("GET"))
        .and(path("/itwins/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "iTwins": [{"id": "p1", "displayName": "Bridge", "number": "B-001"}]
        })))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/imodels/"))
        .and(query_param("iTwinId", "p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "iModels": [{"id": "m1", "displayName": "Deck"}]
        })))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/imodels/m1/changesets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "changesets": [{"id": "cs-2", "index": 2}, {"id": "cs-1", "index": 1}]
        })))
        .mount(&api)
        .await;

    let config = Config {
        auth: AuthConfig {
            client_id: "native-commands".into(),
            authorization_url: format!("{}/connect/authorize", idp.uri()),
            token_url: format!("{}/connect/token", idp.uri()),
            ..AuthConfig::default()
        },
        export: ExportConfig {
            base_url: api.uri(),
            poll_interval_secs: 1,
            max_poll_attempts: Some(3),
            ..ExportConfig::default()
        },
        catalog: CatalogConfig { base_url: api.uri(), ..CatalogConfig::default() },
        ..Config::default()
    };

    let settings = Arc::new(InMemorySettingsStore::new());
    let server = Arc::new(server);
    let ports = HostPorts { settings: settings.clone(), listener: server.clone(), browser: server };
    let ctx = AppContext::new_with_ports(config, ports).unwrap();

    Harness { ctx, settings, api, _idp: idp }
}

#[tokio::test]
async fn login_lands_on_project_selection() {
    let h = harness(FakeAuthorizationServer::granting("code-1")).await;

    let view = commands::login(&h.ctx).await.unwrap();

    assert_eq!(view.step_level, 2);
    assert!(!view.busy);
    match view.state {
        WorkflowState::SelectProject { projects } => assert_eq!(projects[0].id, "p1"),
        other => panic!("unexpected state {other:?}"),
    }
    assert_eq!(h.settings.value("accessToken").as_deref(), Some("access-1"));

    let status = commands::auth_status(&h.ctx).await.unwrap();
    assert!(status.signed_in);
    assert!(status.expires_at.is_some());
}

#[tokio::test]
async fn selecting_a_version_and_exporting_yields_download_link() {
    let h = harness(FakeAuthorizationServer::granting("code-1")).await;
    Mock::given(method("GET"))
        .and(path("/mesh-export/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exports": []})))
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path("/mesh-export/"))
        .and(body_json(json!({"iModelId": "m1", "changesetId": "cs-1", "exportType": "3DTiles"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "export": {"id": "job-1", "status": "InProgress"}
        })))
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("GET"))
        .and(path("/mesh-export/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "export": {
                "id": "job-1",
                "status": "Complete",
                "_links": {"mesh": {"href": "https://blob.test/job-1"}}
            }
        })))
        .mount(&h.api)
        .await;

    commands::login(&h.ctx).await.unwrap();
    commands::select_project(&h.ctx, "p1").await.unwrap();
    let view = commands::select_model(&h.ctx, "m1").await.unwrap();
    match &view.state {
        WorkflowState::SelectModel { selection: Some(selection), .. } => {
            assert_eq!(selection.changesets[0].id, "cs-2");
        }
        other => panic!("unexpected state {other:?}"),
    }
    commands::select_version(&h.ctx, Some("cs-1")).await.unwrap();

    let view = commands::start_export(&h.ctx).await.unwrap();

    assert_eq!(view.step_level, 3);
    assert_eq!(view.download_href.as_deref(), Some("https://blob.test/job-1"));
}

#[tokio::test]
async fn unknown_project_is_rejected_without_leaving_selection() {
    let h = harness(FakeAuthorizationServer::granting("code-1")).await;
    commands::login(&h.ctx).await.unwrap();

    let err = commands::select_project(&h.ctx, "nope").await.unwrap_err();

    assert!(matches!(err, MeshportError::InvalidInput(_)));
    assert!(matches!(commands::workflow_state(&h.ctx).state, WorkflowState::SelectProject { .. }));
}

#[tokio::test]
async fn denied_login_shows_error_and_login_again_restarts() {
    let h = harness(FakeAuthorizationServer::denying("access_denied", "user said no")).await;

    let err = commands::login(&h.ctx).await.unwrap_err();
    assert!(matches!(err, MeshportError::Authorization(_)));

    let view = commands::workflow_state(&h.ctx);
    assert_eq!(view.step_level, 1);
    assert!(view.state.error_message().is_some());

    // Still denied, but the terminal error state was reset before retrying.
    let err = commands::login(&h.ctx).await.unwrap_err();
    assert!(matches!(err, MeshportError::Authorization(_)));
}

#[tokio::test]
async fn logout_clears_credentials_and_resets() {
    let h = harness(FakeAuthorizationServer::granting("code-1")).await;
    commands::login(&h.ctx).await.unwrap();

    let view = commands::logout(&h.ctx).await.unwrap();

    assert_eq!(view.state, WorkflowState::Idle);
    assert!(h.settings.value("accessToken").is_none());
    assert!(!commands::auth_status(&h.ctx).await.unwrap().signed_in);
}

#[tokio::test]
async fn cancel_returns_to_idle() {
    let h = harness(FakeAuthorizationServer::granting("code-1")).await;
    commands::login(&h.ctx).await.unwrap();

    let view = commands::cancel(&h.ctx).await.unwrap();

    assert_eq!(view.state, WorkflowState::Idle);
    assert_eq!(view.step_level, 1);
}
