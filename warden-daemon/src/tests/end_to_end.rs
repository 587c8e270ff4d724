// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Handler-level flows: broker authentication persisting users, the
//! authorization gate and the NSS lookup surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use warden_broker::BrokerManager;
use warden_types::ErrorCode;

use crate::authorizer::Authorizer;
use crate::handler::{DaemonHandler, Request, Response};
use crate::tests::test_env::{TestEnv, current_uid};

fn handler(env: &TestEnv) -> DaemonHandler {
    DaemonHandler::new(
        env.manager.clone(),
        Arc::new(BrokerManager::with_sample(Duration::from_millis(50))),
        Authorizer::new(current_uid()),
    )
}

fn layouts() -> Vec<HashMap<String, String>> {
    vec![
        [
            ("type", "form"),
            ("entry", "required:chars,chars_password,digits"),
            ("wait", "optional:true"),
            ("button", "optional"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    ]
}

fn expect_ok(response: Response) -> serde_json::Value {
    match response {
        Response::Ok { result } => result,
        Response::Error { code, message } => panic!("unexpected error {code:?}: {message}"),
    }
}

fn expect_error(response: Response) -> ErrorCode {
    match response {
        Response::Ok { result } => panic!("unexpected success: {result}"),
        Response::Error { code, .. } => code,
    }
}

async fn authenticate(handler: &DaemonHandler, username: &str) -> serde_json::Value {
    let result = expect_ok(
        handler
            .handle(
                Request::NewSession {
                    broker_id: "sample".into(),
                    username: username.into(),
                    lang: "C".into(),
                },
                current_uid(),
            )
            .await,
    );
    let session_id = result["session_id"].as_str().unwrap().to_owned();

    expect_ok(
        handler
            .handle(
                Request::GetAuthenticationModes {
                    session_id: session_id.clone(),
                    supported_ui_layouts: layouts(),
                },
                current_uid(),
            )
            .await,
    );
    expect_ok(
        handler
            .handle(
                Request::SelectAuthenticationMode {
                    session_id: session_id.clone(),
                    mode_id: "password".into(),
                },
                current_uid(),
            )
            .await,
    );
    expect_ok(
        handler
            .handle(
                Request::IsAuthenticated {
                    session_id,
                    auth_data: json!({"challenge": "goodpass"}).to_string(),
                },
                current_uid(),
            )
            .await,
    )
}

#[tokio::test]
async fn test_granted_session_persists_the_user() {
    let env = TestEnv::new();
    let handler = handler(&env);

    let result = authenticate(&handler, "grace").await;
    assert_eq!(result["access"], "granted");

    // The broker descriptor was materialized as a POSIX account.
    let entry = env.manager.user_by_name("grace").unwrap();
    assert_eq!(entry.uid, 10000);
    assert_eq!(entry.shell, "/bin/bash");

    let cloud = env.manager.group_by_name("cloud-users").unwrap();
    assert_eq!(cloud.users, vec!["grace"]);

    // The local group went through the editor, and the broker binding
    // was recorded.
    assert_eq!(env.editor_calls(), vec!["-a grace warden-local"]);
    assert_eq!(env.manager.broker_for_user("grace").unwrap(), "sample");
}

#[tokio::test]
async fn test_previous_broker_after_authentication() {
    let env = TestEnv::new();
    let handler = handler(&env);
    authenticate(&handler, "grace").await;

    let result = expect_ok(
        handler
            .handle(
                Request::GetPreviousBroker {
                    username: "grace".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(result["broker_id"], "sample");
}

#[tokio::test]
async fn test_privileged_methods_require_the_privileged_uid() {
    let env = TestEnv::new();
    let handler = handler(&env);
    authenticate(&handler, "grace").await;

    let peer = current_uid() + 1;
    for request in [
        Request::DisableUser {
            username: "grace".into(),
        },
        Request::EnableUser {
            username: "grace".into(),
        },
        Request::UpdateBrokerForUser {
            username: "grace".into(),
            broker_id: "local".into(),
        },
        Request::GetShadowByName {
            name: "grace".into(),
        },
        Request::ListShadows,
        Request::UserPreCheck {
            username: "grace".into(),
        },
    ] {
        let code = expect_error(handler.handle(request, peer).await);
        assert_eq!(code, ErrorCode::PermissionDenied);
    }
}

#[tokio::test]
async fn test_disabled_user_cannot_open_a_session() {
    let env = TestEnv::new();
    let handler = handler(&env);
    authenticate(&handler, "grace").await;

    expect_ok(
        handler
            .handle(
                Request::DisableUser {
                    username: "grace".into(),
                },
                current_uid(),
            )
            .await,
    );

    let code = expect_error(
        handler
            .handle(
                Request::NewSession {
                    broker_id: "sample".into(),
                    username: "grace".into(),
                    lang: "C".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(code, ErrorCode::PermissionDenied);

    expect_ok(
        handler
            .handle(
                Request::EnableUser {
                    username: "grace".into(),
                },
                current_uid(),
            )
            .await,
    );
    expect_ok(
        handler
            .handle(
                Request::NewSession {
                    broker_id: "sample".into(),
                    username: "grace".into(),
                    lang: "C".into(),
                },
                current_uid(),
            )
            .await,
    );
}

#[tokio::test]
async fn test_pre_check_registers_a_preauth_user() {
    let env = TestEnv::new();
    let handler = handler(&env);

    let entry = expect_ok(
        handler
            .handle(
                Request::UserPreCheck {
                    username: "dave".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(entry["name"], "dave");
    assert_eq!(entry["uid"], 10000);

    // Pre-auth users answer point lookups but stay out of listings.
    let users = expect_ok(handler.handle(Request::ListUsers, current_uid()).await);
    assert_eq!(users.as_array().unwrap().len(), 0);
    let entry = expect_ok(
        handler
            .handle(
                Request::GetUserByName {
                    name: "dave".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(entry["uid"], 10000);

    let code = expect_error(
        handler
            .handle(
                Request::UserPreCheck {
                    username: "user-unknown".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_nss_lookup_surface() {
    let env = TestEnv::new();
    let handler = handler(&env);
    authenticate(&handler, "grace").await;

    let by_id = expect_ok(
        handler
            .handle(Request::GetUserById { uid: 10000 }, current_uid())
            .await,
    );
    assert_eq!(by_id["name"], "grace");

    let group = expect_ok(
        handler
            .handle(Request::GetGroupById { gid: 10000 }, current_uid())
            .await,
    );
    assert_eq!(group["name"], "grace");

    let groups = expect_ok(handler.handle(Request::ListGroups, current_uid()).await);
    assert!(groups.as_array().unwrap().len() >= 2);

    let shadow = expect_ok(
        handler
            .handle(
                Request::GetShadowByName {
                    name: "grace".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(shadow["last_pwd_change"], -1);

    let code = expect_error(
        handler
            .handle(
                Request::GetUserByName {
                    name: "nobody".into(),
                },
                current_uid(),
            )
            .await,
    );
    assert_eq!(code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_list_methods_return_empty_not_notfound() {
    let env = TestEnv::new();
    let handler = handler(&env);

    for request in [Request::ListUsers, Request::ListGroups] {
        let result = expect_ok(handler.handle(request, current_uid()).await);
        assert_eq!(result.as_array().unwrap().len(), 0);
    }
    let result = expect_ok(handler.handle(Request::ListShadows, current_uid()).await);
    assert_eq!(result.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_available_brokers() {
    let env = TestEnv::new();
    let handler = handler(&env);

    let brokers = expect_ok(handler.handle(Request::AvailableBrokers, current_uid()).await);
    let ids: Vec<&str> = brokers
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["local", "sample"]);
}

#[test]
fn test_request_wire_format() {
    let request: Request = serde_json::from_str(
        r#"{"method": "new_session", "params": {"broker_id": "sample", "username": "alice", "lang": "C"}}"#,
    )
    .unwrap();
    assert!(matches!(request, Request::NewSession { .. }));

    let request: Request = serde_json::from_str(r#"{"method": "list_users"}"#).unwrap();
    assert!(matches!(request, Request::ListUsers));
}
