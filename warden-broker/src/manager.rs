// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Ownership of the configured brokers and session routing.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use log::debug;
use warden_types::Access;

use crate::broker::{Broker, BrokerInfo};
use crate::error::{Error, Result};
use crate::layout::UiLayout;
use crate::sample::{ModeDescriptor, SampleBroker};

/// Holds the configured brokers and maps live sessions to the broker
/// that opened them.
///
/// The local broker is always present.
pub struct BrokerManager {
    brokers: Vec<Broker>,
    session_routes: RwLock<HashMap<String, usize>>,
}

impl BrokerManager {
    /// Build a manager from the configured brokers; the local broker is
    /// prepended unconditionally.
    pub fn new(brokers: Vec<Broker>) -> Self {
        let mut all = vec![Broker::Local];
        all.extend(brokers);
        Self {
            brokers: all,
            session_routes: RwLock::new(HashMap::new()),
        }
    }

    /// The default production set: local plus the sample broker.
    pub fn with_sample(wait_duration: Duration) -> Self {
        Self::new(vec![Broker::Sample(SampleBroker::new(wait_duration))])
    }

    /// All configured brokers, local first.
    pub fn available_brokers(&self) -> Vec<BrokerInfo> {
        self.brokers.iter().map(Broker::info).collect()
    }

    /// Look up a broker by stable id.
    pub fn broker(&self, id: &str) -> Result<&Broker> {
        self.brokers
            .iter()
            .find(|b| b.id() == id)
            .ok_or_else(|| Error::UnknownBroker(id.to_owned()))
    }

    fn broker_for_session(&self, session_id: &str) -> Result<&Broker> {
        let routes = self.session_routes.read().unwrap();
        let index = *routes
            .get(session_id)
            .ok_or_else(|| Error::SessionUnknown(session_id.to_owned()))?;
        Ok(&self.brokers[index])
    }

    /// The id of the broker that opened `session_id`.
    pub fn broker_id_for_session(&self, session_id: &str) -> Result<String> {
        Ok(self.broker_for_session(session_id)?.id().to_owned())
    }

    /// Open a session on `broker_id` and remember the route for the
    /// session-scoped calls that follow.
    pub fn new_session(
        &self,
        broker_id: &str,
        username: &str,
        lang: &str,
    ) -> Result<(String, String)> {
        let (index, broker) = self
            .brokers
            .iter()
            .enumerate()
            .find(|(_, b)| b.id() == broker_id)
            .ok_or_else(|| Error::UnknownBroker(broker_id.to_owned()))?;

        let (session_id, key) = broker.new_session(username, lang)?;
        self.session_routes
            .write()
            .unwrap()
            .insert(session_id.clone(), index);
        debug!("Session {session_id} routed to broker {broker_id}");
        Ok((session_id, key))
    }

    pub fn authentication_modes(
        &self,
        session_id: &str,
        supported_layouts: &[HashMap<String, String>],
    ) -> Result<Vec<ModeDescriptor>> {
        self.broker_for_session(session_id)?
            .authentication_modes(session_id, supported_layouts)
    }

    pub fn select_authentication_mode(&self, session_id: &str, mode_id: &str) -> Result<UiLayout> {
        self.broker_for_session(session_id)?
            .select_authentication_mode(session_id, mode_id)
    }

    pub async fn is_authenticated(
        &self,
        session_id: &str,
        auth_data: &str,
    ) -> Result<(Access, String)> {
        self.broker_for_session(session_id)?
            .is_authenticated(session_id, auth_data)
            .await
    }

    pub fn cancel_is_authenticated(&self, session_id: &str) -> Result<()> {
        self.broker_for_session(session_id)?
            .cancel_is_authenticated(session_id);
        Ok(())
    }

    /// End a session and forget its route.
    pub fn end_session(&self, session_id: &str) -> Result<()> {
        let result = self.broker_for_session(session_id)?.end_session(session_id);
        self.session_routes.write().unwrap().remove(session_id);
        result
    }

    /// Ask every non-local broker whether it would accept `name`.
    ///
    /// Returns the first broker's user descriptor, or `UserNotFound`
    /// when nobody claims the user.
    pub fn user_pre_check(&self, name: &str) -> Result<String> {
        for broker in &self.brokers {
            if matches!(broker, Broker::Local) {
                continue;
            }
            match broker.user_pre_check(name) {
                Ok(info) => return Ok(info),
                Err(Error::UserNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::UserNotFound(name.to_owned()))
    }
}
