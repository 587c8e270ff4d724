// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Request handler bridging the RPC surface to the identity manager and
//! the broker manager.
//!
//! Store-touching operations run inside `spawn_blocking`; the broker
//! session calls stay on the async runtime so wait-bearing modes can
//! block without pinning a worker thread.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use warden_broker::BrokerManager;
use warden_types::{Access, ErrorCode, UserInfo};

use crate::authorizer::Authorizer;
use crate::error::{DaemonError, Result};
use crate::manager::IdentityManager;

/// One request as read off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Request {
    AvailableBrokers,
    GetPreviousBroker {
        username: String,
    },
    NewSession {
        broker_id: String,
        username: String,
        lang: String,
    },
    GetAuthenticationModes {
        session_id: String,
        supported_ui_layouts: Vec<HashMap<String, String>>,
    },
    SelectAuthenticationMode {
        session_id: String,
        mode_id: String,
    },
    IsAuthenticated {
        session_id: String,
        auth_data: String,
    },
    EndSession {
        session_id: String,
    },
    CancelIsAuthenticated {
        session_id: String,
    },
    UserPreCheck {
        username: String,
    },
    GetUserByName {
        name: String,
    },
    GetUserById {
        uid: u32,
    },
    GetGroupByName {
        name: String,
    },
    GetGroupById {
        gid: u32,
    },
    ListUsers,
    ListGroups,
    GetShadowByName {
        name: String,
    },
    ListShadows,
    EnableUser {
        username: String,
    },
    DisableUser {
        username: String,
    },
    UpdateBrokerForUser {
        username: String,
        broker_id: String,
    },
}

/// One response as written to the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { result: serde_json::Value },
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn ok(result: serde_json::Value) -> Self {
        Response::Ok { result }
    }

    pub fn error(err: &DaemonError) -> Self {
        Response::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Dispatches requests against the daemon's core services.
#[derive(Clone)]
pub struct DaemonHandler {
    manager: Arc<IdentityManager>,
    brokers: Arc<BrokerManager>,
    authorizer: Authorizer,
}

impl DaemonHandler {
    pub fn new(
        manager: Arc<IdentityManager>,
        brokers: Arc<BrokerManager>,
        authorizer: Authorizer,
    ) -> Self {
        Self {
            manager,
            brokers,
            authorizer,
        }
    }

    /// Handle one request on behalf of the peer owning `peer_uid`.
    pub async fn handle(&self, request: Request, peer_uid: u32) -> Response {
        match self.dispatch(request, peer_uid).await {
            Ok(result) => Response::ok(result),
            Err(err) => {
                debug!("Request failed: {err}");
                Response::error(&err)
            }
        }
    }

    async fn dispatch(&self, request: Request, peer_uid: u32) -> Result<serde_json::Value> {
        match request {
            Request::AvailableBrokers => {
                Ok(serde_json::to_value(self.brokers.available_brokers()).unwrap_or_default())
            }
            Request::GetPreviousBroker { username } => {
                let manager = self.manager.clone();
                let broker_id = self
                    .blocking(move |m| m.broker_for_user(&username), manager)
                    .await?;
                Ok(json!({ "broker_id": broker_id }))
            }
            Request::NewSession {
                broker_id,
                username,
                lang,
            } => {
                let manager = self.manager.clone();
                let name = username.clone();
                if self.blocking(move |m| m.user_disabled(&name), manager).await? {
                    return Err(DaemonError::PermissionDenied);
                }
                let (session_id, key) = self.brokers.new_session(&broker_id, &username, &lang)?;
                Ok(json!({ "session_id": session_id, "encryption_key": key }))
            }
            Request::GetAuthenticationModes {
                session_id,
                supported_ui_layouts,
            } => {
                let modes = self
                    .brokers
                    .authentication_modes(&session_id, &supported_ui_layouts)?;
                Ok(serde_json::to_value(modes).unwrap_or_default())
            }
            Request::SelectAuthenticationMode {
                session_id,
                mode_id,
            } => {
                let layout = self
                    .brokers
                    .select_authentication_mode(&session_id, &mode_id)?;
                Ok(serde_json::to_value(layout).unwrap_or_default())
            }
            Request::IsAuthenticated {
                session_id,
                auth_data,
            } => {
                let (access, data) = self.brokers.is_authenticated(&session_id, &auth_data).await?;
                if access == Access::Granted {
                    self.persist_granted_user(&session_id, &data).await?;
                }
                Ok(json!({ "access": access, "data": data }))
            }
            Request::EndSession { session_id } => {
                self.brokers.end_session(&session_id)?;
                Ok(json!({}))
            }
            Request::CancelIsAuthenticated { session_id } => {
                self.brokers.cancel_is_authenticated(&session_id)?;
                Ok(json!({}))
            }
            Request::UserPreCheck { username } => {
                self.authorizer.check(peer_uid)?;
                let info_json = self.brokers.user_pre_check(&username)?;
                let info: UserInfo = serde_json::from_str(&info_json).map_err(|e| {
                    DaemonError::Internal(format!("broker returned malformed userinfo: {e}"))
                })?;
                let manager = self.manager.clone();
                let entry = self
                    .blocking(
                        move |m| {
                            m.register_user_preauth(&info.name)?;
                            m.user_by_name(&info.name)
                        },
                        manager,
                    )
                    .await?;
                Ok(serde_json::to_value(entry).unwrap_or_default())
            }
            Request::GetUserByName { name } => {
                let manager = self.manager.clone();
                let entry = self.blocking(move |m| m.user_by_name(&name), manager).await?;
                Ok(serde_json::to_value(entry).unwrap_or_default())
            }
            Request::GetUserById { uid } => {
                let manager = self.manager.clone();
                let entry = self.blocking(move |m| m.user_by_id(uid), manager).await?;
                Ok(serde_json::to_value(entry).unwrap_or_default())
            }
            Request::GetGroupByName { name } => {
                let manager = self.manager.clone();
                let entry = self.blocking(move |m| m.group_by_name(&name), manager).await?;
                Ok(serde_json::to_value(entry).unwrap_or_default())
            }
            Request::GetGroupById { gid } => {
                let manager = self.manager.clone();
                let entry = self.blocking(move |m| m.group_by_id(gid), manager).await?;
                Ok(serde_json::to_value(entry).unwrap_or_default())
            }
            Request::ListUsers => {
                let manager = self.manager.clone();
                let users = self.blocking(move |m| m.all_users(), manager).await?;
                Ok(serde_json::to_value(users).unwrap_or_default())
            }
            Request::ListGroups => {
                let manager = self.manager.clone();
                let groups = self.blocking(move |m| m.all_groups(), manager).await?;
                Ok(serde_json::to_value(groups).unwrap_or_default())
            }
            Request::GetShadowByName { name } => {
                self.authorizer.check(peer_uid)?;
                let manager = self.manager.clone();
                let entry = self
                    .blocking(move |m| m.shadow_by_name(&name), manager)
                    .await?;
                Ok(serde_json::to_value(entry).unwrap_or_default())
            }
            Request::ListShadows => {
                self.authorizer.check(peer_uid)?;
                let manager = self.manager.clone();
                let shadows = self.blocking(move |m| m.all_shadows(), manager).await?;
                Ok(serde_json::to_value(shadows).unwrap_or_default())
            }
            Request::EnableUser { username } => {
                self.authorizer.check(peer_uid)?;
                let manager = self.manager.clone();
                self.blocking(move |m| m.enable_user(&username), manager)
                    .await?;
                Ok(json!({}))
            }
            Request::DisableUser { username } => {
                self.authorizer.check(peer_uid)?;
                let manager = self.manager.clone();
                self.blocking(move |m| m.disable_user(&username), manager)
                    .await?;
                Ok(json!({}))
            }
            Request::UpdateBrokerForUser {
                username,
                broker_id,
            } => {
                self.authorizer.check(peer_uid)?;
                // Reject bindings to brokers that are not configured.
                self.brokers.broker(&broker_id)?;
                let manager = self.manager.clone();
                self.blocking(
                    move |m| m.update_broker_for_user(&username, &broker_id),
                    manager,
                )
                .await?;
                Ok(json!({}))
            }
        }
    }

    /// Persist the user descriptor a granted session returned and record
    /// which broker authenticated it.
    async fn persist_granted_user(&self, session_id: &str, data: &str) -> Result<()> {
        let parsed: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| DaemonError::Internal(format!("broker returned malformed data: {e}")))?;
        let Some(userinfo) = parsed.get("userinfo") else {
            // Brokers may grant without a descriptor, e.g. on a password
            // reset for an already-persisted user.
            return Ok(());
        };
        let info: UserInfo = serde_json::from_value(userinfo.clone())
            .map_err(|e| DaemonError::Internal(format!("broker returned malformed userinfo: {e}")))?;
        let broker_id = self.brokers.broker_id_for_session(session_id)?;

        let manager = self.manager.clone();
        let name = info.name.to_lowercase();
        self.blocking(
            move |m| {
                m.update_user(&info)?;
                m.update_broker_for_user(&name, &broker_id)
            },
            manager,
        )
        .await
        .map_err(|e| {
            warn!("Failed to persist granted user: {e}");
            e
        })
    }

    /// Run a synchronous manager operation off the async runtime.
    async fn blocking<T: Send + 'static>(
        &self,
        op: impl FnOnce(&IdentityManager) -> Result<T> + Send + 'static,
        manager: Arc<IdentityManager>,
    ) -> Result<T> {
        tokio::task::spawn_blocking(move || op(&manager))
            .await
            .map_err(|e| DaemonError::Internal(format!("task join error: {e}")))?
    }
}
