// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Broker abstraction for the warden daemon.
//!
//! A broker is an identity source that authenticates users and returns
//! user descriptors on success. The [`BrokerManager`] owns the configured
//! brokers and routes session-scoped calls to the broker that opened the
//! session. The distinguished "local" broker marks accounts that
//! authenticate through the host's own PAM stack and refuses session
//! operations.
//!
//! The in-tree [`SampleBroker`] implements the full session state
//! machine: mode discovery from the client's supported UI layouts, mode
//! selection with side effects, per-step evaluation with retries, MFA
//! chaining and cancellation.

mod broker;
mod error;
mod layout;
mod manager;
mod sample;

pub use broker::{Broker, BrokerInfo, LOCAL_BROKER_ID};
pub use error::{Error, Result};
pub use layout::{LayoutCapabilities, UiLayout};
pub use manager::BrokerManager;
pub use sample::{ModeDescriptor, SAMPLE_BROKER_ID, SampleBroker};
