// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! The sample broker: a complete, deterministic session/auth engine.
//!
//! Sessions move through `Fresh -> ModesListed -> ModeSelected <->
//! AuthInFlight` until a terminal access decision. At most one
//! `is_authenticated` call runs per session; a concurrent call fails with
//! Busy and `cancel_is_authenticated` preempts the in-flight wait.
//!
//! Nothing here is a real credential check. Challenges are fixed
//! constants, the "broker key" is a placeholder and wait modes are
//! timers. Real brokers negotiate their own transport protection.

mod modes;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use warden_types::{Access, GroupInfo, UserInfo};

use crate::error::{Error, Result};
use crate::layout::{LayoutCapabilities, UiLayout};

pub use modes::{AuthMode, ResetPolicy, Verification, build_modes, mode_id, sort_modes};

/// Stable identifier of the sample broker.
pub const SAMPLE_BROKER_ID: &str = "sample";

/// Placeholder handed to clients as the broker "encryption key". Not a
/// secret; real brokers negotiate their own transport protection.
const BROKER_KEY: &str = "sample-broker-key-not-a-secret";

/// Retries allowed per mode before the session is denied.
const MAX_ATTEMPTS: u32 = 5;

/// MFA steps required for users enrolled in multi-factor auth.
const NEEDED_MFA_STEPS: u32 = 3;

/// An offered mode as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDescriptor {
    pub id: String,
    pub label: String,
}

#[derive(Debug)]
struct Session {
    username: String,
    lang: String,
    reset_policy: ResetPolicy,
    modes: Vec<AuthMode>,
    selected_mode: Option<String>,
    attempts: HashMap<String, u32>,
    needed_mfa: u32,
    current_mfa: u32,
    last_mode_used: Option<String>,
}

/// The sample broker engine.
pub struct SampleBroker {
    sessions: RwLock<HashMap<String, Session>>,
    in_flight: Mutex<HashMap<String, InFlightEntry>>,
    next_call_id: AtomicU64,
    last_selected: Mutex<HashMap<String, String>>,
    wait_duration: Duration,
}

/// One in-flight is_authenticated call. The call id distinguishes a
/// stale completion from a call that started after a cancellation
/// detached its predecessor.
struct InFlightEntry {
    call_id: u64,
    token: CancellationToken,
}

impl Default for SampleBroker {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SampleBroker {
    /// Create the broker; `wait_duration` is how long wait-bearing modes
    /// block before their timeout outcome fires.
    pub fn new(wait_duration: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_call_id: AtomicU64::new(0),
            last_selected: Mutex::new(HashMap::new()),
            wait_duration,
        }
    }

    /// Open a session for `username`. Returns the session id and the
    /// placeholder broker key.
    pub fn new_session(&self, username: &str, lang: &str) -> Result<(String, String)> {
        if username.contains("unknown") {
            return Err(Error::UserNotFound(username.to_owned()));
        }

        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            username: username.to_owned(),
            lang: lang.to_owned(),
            reset_policy: reset_policy_for(username),
            modes: Vec::new(),
            selected_mode: None,
            attempts: HashMap::new(),
            needed_mfa: if username.contains("mfa") {
                NEEDED_MFA_STEPS
            } else {
                1
            },
            current_mfa: 0,
            last_mode_used: None,
        };
        debug!(
            "New sample session {session_id} for {username} (lang {})",
            session.lang
        );
        self.sessions
            .write()
            .unwrap()
            .insert(session_id.clone(), session);
        Ok((session_id, BROKER_KEY.to_owned()))
    }

    /// Enumerate the modes available to this session given the layouts
    /// the client can render.
    pub fn authentication_modes(
        &self,
        session_id: &str,
        supported_layouts: &[HashMap<String, String>],
    ) -> Result<Vec<ModeDescriptor>> {
        let layouts: Vec<LayoutCapabilities> = supported_layouts
            .iter()
            .filter_map(LayoutCapabilities::parse)
            .collect();

        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionUnknown(session_id.to_owned()))?;

        let mut modes = build_modes(&session.username, session.reset_policy, &layouts);

        // An in-flight MFA chain narrows the offer to unused MFA-capable
        // modes.
        if session.current_mfa > 0 && session.current_mfa < session.needed_mfa {
            modes.retain(|m| {
                m.is_mfa_capable() && Some(m.id.as_str()) != session.last_mode_used.as_deref()
            });
        }

        let last = self
            .last_selected
            .lock()
            .unwrap()
            .get(&session.username)
            .cloned();
        sort_modes(&mut modes, last.as_deref());

        let descriptors = modes
            .iter()
            .map(|m| ModeDescriptor {
                id: m.id.clone(),
                label: m.label.clone(),
            })
            .collect();
        session.modes = modes;
        session.selected_mode = None;
        Ok(descriptors)
    }

    /// Record the client's mode choice, run its side effects and return
    /// the layout to render.
    pub fn select_authentication_mode(&self, session_id: &str, mode_id: &str) -> Result<UiLayout> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionUnknown(session_id.to_owned()))?;

        let mode = session
            .modes
            .iter_mut()
            .find(|m| m.id == mode_id)
            .ok_or_else(|| Error::UnknownMode(mode_id.to_owned()))?;

        // Side effects happen before the layout is returned so the
        // client always sees state the verifier will accept.
        if let Verification::RotatingCode { current } = &mut mode.verify {
            *current = (*current + 1) % 1_000_000;
            debug!("Rotated one-time code for session {session_id}");
        }

        let ui = mode.ui.clone();
        session.selected_mode = Some(mode_id.to_owned());
        Ok(ui)
    }

    /// Evaluate one authentication step.
    ///
    /// At most one call may be in flight per session; a second concurrent
    /// call fails with [`Error::Busy`]. Cancellation via
    /// [`Self::cancel_is_authenticated`] preempts wait-bearing modes.
    pub async fn is_authenticated(
        &self,
        session_id: &str,
        auth_data: &str,
    ) -> Result<(Access, String)> {
        let data: serde_json::Map<String, serde_json::Value> = serde_json::from_str(auth_data)
            .map_err(|e| Error::InvalidAuthData(e.to_string()))?;

        let (mode, username) = {
            let sessions = self.sessions.read().unwrap();
            let session = sessions
                .get(session_id)
                .ok_or_else(|| Error::SessionUnknown(session_id.to_owned()))?;
            let mode = session
                .selected_mode
                .as_ref()
                .and_then(|id| session.modes.iter().find(|m| &m.id == id))
                .cloned();
            (mode, session.username.clone())
        };

        let token = CancellationToken::new();
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if in_flight.contains_key(session_id) {
                return Err(Error::Busy(session_id.to_owned()));
            }
            in_flight.insert(
                session_id.to_owned(),
                InFlightEntry {
                    call_id,
                    token: token.clone(),
                },
            );
        }
        let _guard = InFlightGuard {
            broker: self,
            session_id,
            call_id,
        };

        let (access, message) = match &mode {
            None => (Access::Denied, "no authentication mode selected".to_owned()),
            Some(mode) => self.evaluate(mode, &data, &token).await,
        };

        let mode_id = mode.as_ref().map(|m| m.id.as_str());
        self.finish(session_id, &username, mode_id, access, message)
    }

    async fn evaluate(
        &self,
        mode: &AuthMode,
        data: &serde_json::Map<String, serde_json::Value>,
        token: &CancellationToken,
    ) -> (Access, String) {
        match &mode.verify {
            Verification::Challenge { expected } => match data.get("challenge") {
                Some(serde_json::Value::String(challenge)) if challenge == expected => {
                    (Access::Granted, String::new())
                }
                Some(_) => (Access::Retry, "invalid challenge".to_owned()),
                None => (Access::Retry, "missing challenge".to_owned()),
            },
            Verification::RotatingCode { current } => {
                let expected = format!("{current:06}");
                match data.get("challenge") {
                    Some(serde_json::Value::String(challenge)) if *challenge == expected => {
                        (Access::Granted, String::new())
                    }
                    Some(_) => (Access::Retry, "invalid one time code".to_owned()),
                    None => (Access::Retry, "missing one time code".to_owned()),
                }
            }
            Verification::NewPassword { skippable } => {
                let skipped = data.get("skip").and_then(|v| v.as_str()) == Some("true");
                if skipped && *skippable {
                    return (Access::Granted, String::new());
                }
                match data.get("challenge").and_then(|v| v.as_str()) {
                    Some(password) if !password.is_empty() => (Access::Granted, String::new()),
                    _ => (Access::Retry, "empty new password".to_owned()),
                }
            }
            Verification::Wait { grant } => {
                if data.get("wait").and_then(|v| v.as_str()) != Some("true") {
                    return (Access::Retry, "authentication mode expects a wait".to_owned());
                }
                tokio::select! {
                    _ = token.cancelled() => (Access::Cancelled, String::new()),
                    _ = tokio::time::sleep(self.wait_duration) => {
                        if *grant {
                            (Access::Granted, String::new())
                        } else {
                            (Access::Denied, "the acknowledgment was rejected".to_owned())
                        }
                    }
                }
            }
        }
    }

    /// Post-verification bookkeeping under the session write lock.
    fn finish(
        &self,
        session_id: &str,
        username: &str,
        mode_id: Option<&str>,
        access: Access,
        message: String,
    ) -> Result<(Access, String)> {
        let mut sessions = self.sessions.write().unwrap();
        let session = match sessions.get_mut(session_id) {
            Some(session) => session,
            // end_session cancelled us and already removed the session.
            None if access == Access::Cancelled => {
                return Ok((Access::Cancelled, serde_json::json!({}).to_string()));
            }
            None => return Err(Error::SessionUnknown(session_id.to_owned())),
        };

        let (access, data) = match access {
            Access::Granted => {
                if let Some(id) = mode_id {
                    self.last_selected
                        .lock()
                        .unwrap()
                        .insert(username.to_owned(), id.to_owned());
                    session.last_mode_used = Some(id.to_owned());
                }
                session.current_mfa += 1;
                if session.current_mfa < session.needed_mfa {
                    let data = serde_json::json!({
                        "message": format!(
                            "{} more authentication steps required",
                            session.needed_mfa - session.current_mfa
                        ),
                    });
                    (Access::Next, data)
                } else {
                    info!("Session {session_id}: access granted to {username}");
                    let data = serde_json::json!({ "userinfo": sample_user_info(username) });
                    (Access::Granted, data)
                }
            }
            Access::Retry => {
                let attempts = session
                    .attempts
                    .entry(mode_id.unwrap_or_default().to_owned())
                    .or_insert(0);
                *attempts += 1;
                if *attempts >= MAX_ATTEMPTS {
                    (
                        Access::Denied,
                        serde_json::json!({ "message": "maximum attempts reached" }),
                    )
                } else {
                    (Access::Retry, serde_json::json!({ "message": message }))
                }
            }
            access => {
                let data = if message.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::json!({ "message": message })
                };
                (access, data)
            }
        };

        Ok((access, data.to_string()))
    }

    /// Fire and detach the cancellation handle of an in-flight call.
    ///
    /// No-op when nothing is in flight.
    pub fn cancel_is_authenticated(&self, session_id: &str) {
        if let Some(entry) = self.in_flight.lock().unwrap().remove(session_id) {
            entry.token.cancel();
        }
    }

    /// Terminate a session, cancelling any in-flight authentication.
    pub fn end_session(&self, session_id: &str) -> Result<()> {
        self.cancel_is_authenticated(session_id);
        self.sessions
            .write()
            .unwrap()
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| Error::SessionUnknown(session_id.to_owned()))
    }

    /// Whether the broker would accept `name`, and the descriptor it
    /// would return on a grant (for NSS pre-auth).
    pub fn user_pre_check(&self, name: &str) -> Result<String> {
        if name.contains("unknown") {
            return Err(Error::UserNotFound(name.to_owned()));
        }
        Ok(serde_json::to_string(&sample_user_info(name)).expect("static shape"))
    }
}

/// Removes the in-flight marker on every exit path of is_authenticated.
///
/// The marker is only removed when it still belongs to this call; after
/// a cancellation detached it, a newer call may own the slot.
struct InFlightGuard<'a> {
    broker: &'a SampleBroker,
    session_id: &'a str,
    call_id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.broker.in_flight.lock().unwrap();
        if in_flight
            .get(self.session_id)
            .is_some_and(|entry| entry.call_id == self.call_id)
        {
            in_flight.remove(self.session_id);
        }
    }
}

fn reset_policy_for(username: &str) -> ResetPolicy {
    if username.contains("needs-reset") {
        ResetPolicy::MustReset
    } else if username.contains("can-reset") {
        ResetPolicy::CanReset
    } else {
        ResetPolicy::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_fresh() {
        let broker = SampleBroker::default();
        let (sid, key) = broker.new_session("alice", "C").unwrap();
        assert!(!sid.is_empty());
        assert_eq!(key, BROKER_KEY);

        // Distinct sessions get distinct ids.
        let (other, _) = broker.new_session("alice", "C").unwrap();
        assert_ne!(sid, other);
    }

    #[test]
    fn test_authentication_without_selected_mode_is_denied() {
        let broker = SampleBroker::default();
        let (sid, _) = broker.new_session("alice", "C").unwrap();

        let (access, _) = tokio_test::block_on(broker.is_authenticated(&sid, "{}")).unwrap();
        assert_eq!(access, Access::Denied);
    }

    #[test]
    fn test_select_requires_listed_modes() {
        let broker = SampleBroker::default();
        let (sid, _) = broker.new_session("alice", "C").unwrap();

        // No modes listed yet, so any selection is unknown.
        assert!(matches!(
            broker.select_authentication_mode(&sid, "password"),
            Err(Error::UnknownMode(_))
        ));
    }

    #[test]
    fn test_reset_policies_from_username() {
        assert_eq!(reset_policy_for("alice"), ResetPolicy::None);
        assert_eq!(
            reset_policy_for("user-needs-reset"),
            ResetPolicy::MustReset
        );
        assert_eq!(reset_policy_for("user-can-reset"), ResetPolicy::CanReset);
    }
}

/// The descriptor the sample broker hands over on a grant.
fn sample_user_info(username: &str) -> UserInfo {
    UserInfo {
        name: username.to_owned(),
        uid: None,
        gecos: format!("{username} (sample broker)"),
        dir: format!("/home/{username}"),
        shell: "/bin/bash".to_owned(),
        groups: vec![
            GroupInfo {
                name: "cloud-users".to_owned(),
                gid: None,
                ugid: "cloud-users-ugid".to_owned(),
            },
            GroupInfo {
                name: "warden-local".to_owned(),
                gid: None,
                ugid: String::new(),
            },
        ],
    }
}

