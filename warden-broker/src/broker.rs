// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Broker dispatch.
//!
//! Concrete brokers are a sum type rather than trait objects; the
//! manager stores them by stable id and every session-shaped call
//! dispatches here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use warden_types::Access;

use crate::error::{Error, Result};
use crate::layout::UiLayout;
use crate::sample::{ModeDescriptor, SAMPLE_BROKER_ID, SampleBroker};

/// Id of the distinguished local broker.
///
/// Accounts bound to it authenticate through the host's own PAM stack;
/// warden only tracks the binding, so every session operation is
/// refused.
pub const LOCAL_BROKER_ID: &str = "local";

/// Broker identity as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub id: String,
    pub name: String,
}

/// A configured broker.
pub enum Broker {
    Local,
    Sample(SampleBroker),
}

impl Broker {
    pub fn id(&self) -> &'static str {
        match self {
            Broker::Local => LOCAL_BROKER_ID,
            Broker::Sample(_) => SAMPLE_BROKER_ID,
        }
    }

    pub fn info(&self) -> BrokerInfo {
        match self {
            Broker::Local => BrokerInfo {
                id: LOCAL_BROKER_ID.to_owned(),
                name: "Local accounts".to_owned(),
            },
            Broker::Sample(_) => BrokerInfo {
                id: SAMPLE_BROKER_ID.to_owned(),
                name: "Sample broker".to_owned(),
            },
        }
    }

    pub fn new_session(&self, username: &str, lang: &str) -> Result<(String, String)> {
        match self {
            Broker::Local => Err(Error::LocalBroker),
            Broker::Sample(broker) => broker.new_session(username, lang),
        }
    }

    pub fn authentication_modes(
        &self,
        session_id: &str,
        supported_layouts: &[HashMap<String, String>],
    ) -> Result<Vec<ModeDescriptor>> {
        match self {
            Broker::Local => Err(Error::LocalBroker),
            Broker::Sample(broker) => broker.authentication_modes(session_id, supported_layouts),
        }
    }

    pub fn select_authentication_mode(&self, session_id: &str, mode_id: &str) -> Result<UiLayout> {
        match self {
            Broker::Local => Err(Error::LocalBroker),
            Broker::Sample(broker) => broker.select_authentication_mode(session_id, mode_id),
        }
    }

    pub async fn is_authenticated(
        &self,
        session_id: &str,
        auth_data: &str,
    ) -> Result<(Access, String)> {
        match self {
            Broker::Local => Err(Error::LocalBroker),
            Broker::Sample(broker) => broker.is_authenticated(session_id, auth_data).await,
        }
    }

    pub fn cancel_is_authenticated(&self, session_id: &str) {
        match self {
            Broker::Local => {}
            Broker::Sample(broker) => broker.cancel_is_authenticated(session_id),
        }
    }

    pub fn end_session(&self, session_id: &str) -> Result<()> {
        match self {
            Broker::Local => Err(Error::LocalBroker),
            Broker::Sample(broker) => broker.end_session(session_id),
        }
    }

    pub fn user_pre_check(&self, name: &str) -> Result<String> {
        match self {
            Broker::Local => Err(Error::LocalBroker),
            Broker::Sample(broker) => broker.user_pre_check(name),
        }
    }
}
