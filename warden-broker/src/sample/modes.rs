// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Authentication mode catalog of the sample broker.
//!
//! Modes are derived deterministically from the UI layouts a client
//! advertises. Challenge values are fixed constants (the sample broker
//! authenticates nobody for real); the TOTP code rotates on every mode
//! selection.

use crate::layout::{LayoutCapabilities, UiLayout, entry_kind, layout_type};

pub mod mode_id {
    pub const PASSWORD: &str = "password";
    pub const PIN_CODE: &str = "pincode";
    pub const TOTP: &str = "totp";
    pub const PHONE_ACK1: &str = "phoneack1";
    pub const PHONE_ACK2: &str = "phoneack2";
    pub const FIDO_DEVICE1: &str = "fidodevice1";
    pub const EMAIL_LINK: &str = "emaillink";
    pub const QR_CODE: &str = "qrcodewithcode";
    pub const MANDATORY_RESET: &str = "mandatoryreset";
    pub const OPTIONAL_RESET: &str = "optionalreset";
}

/// Expected challenge for the password mode.
pub const PASSWORD_CHALLENGE: &str = "goodpass";
/// Expected challenge for the pin-code mode.
pub const PIN_CHALLENGE: &str = "4242";
/// First TOTP code; rotated on every selection of the mode.
pub const TOTP_INITIAL_CODE: u32 = 123456;
/// Payload shown in the QR code layout.
pub const QR_CONTENT: &str = "https://warden.example.com/device-login";
/// Pairing code shown next to the QR code.
pub const QR_PAIRING_CODE: &str = "1337";

/// Modes that may satisfy a further MFA step.
pub const MFA_CAPABLE: &[&str] = &[mode_id::PHONE_ACK1, mode_id::FIDO_DEVICE1, mode_id::TOTP];

/// How a mode's authentication data is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Compare `authData["challenge"]` against a fixed value.
    Challenge { expected: String },
    /// Compare against the rotating TOTP code.
    RotatingCode { current: u32 },
    /// Block on an out-of-band acknowledgment; `grant` is the timeout
    /// outcome (the second phone mode always fails).
    Wait { grant: bool },
    /// Accept a new password; the optional variant can be skipped.
    NewPassword { skippable: bool },
}

/// One offered authentication mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMode {
    pub id: String,
    pub label: String,
    pub ui: UiLayout,
    pub verify: Verification,
}

impl AuthMode {
    pub fn is_mfa_capable(&self) -> bool {
        MFA_CAPABLE.contains(&self.id.as_str())
    }
}

/// Reset policy of a session, fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    #[default]
    None,
    CanReset,
    MustReset,
}

/// Derive the offered modes from the client's layout capabilities.
///
/// A pending password reset narrows the offer to the reset modes only.
pub fn build_modes(
    username: &str,
    policy: ResetPolicy,
    layouts: &[LayoutCapabilities],
) -> Vec<AuthMode> {
    // A pending reset narrows the offer to the reset modes only; a
    // client that cannot render them is offered nothing.
    if policy != ResetPolicy::None {
        return reset_modes(policy, layouts);
    }

    let mut modes = Vec::new();
    for caps in layouts {
        match caps.kind.as_str() {
            layout_type::FORM => {
                if caps.supports_entry(entry_kind::CHARS_PASSWORD) {
                    modes.push(AuthMode {
                        id: mode_id::PASSWORD.to_owned(),
                        label: "Password authentication".to_owned(),
                        ui: UiLayout::form("Gimme your password")
                            .with_entry(entry_kind::CHARS_PASSWORD),
                        verify: Verification::Challenge {
                            expected: PASSWORD_CHALLENGE.to_owned(),
                        },
                    });
                }
                if caps.supports_entry(entry_kind::DIGITS) {
                    modes.push(AuthMode {
                        id: mode_id::PIN_CODE.to_owned(),
                        label: "Pin code".to_owned(),
                        ui: UiLayout::form("Enter your pin code")
                            .with_entry(entry_kind::DIGITS),
                        verify: Verification::Challenge {
                            expected: PIN_CHALLENGE.to_owned(),
                        },
                    });
                    let mut ui = UiLayout::form("Enter your one time credential")
                        .with_entry(entry_kind::DIGITS);
                    if caps.supports_button() {
                        ui = ui.with_button("Resend sms");
                    }
                    modes.push(AuthMode {
                        id: mode_id::TOTP.to_owned(),
                        label: "Authentication code".to_owned(),
                        ui,
                        verify: Verification::RotatingCode {
                            current: TOTP_INITIAL_CODE,
                        },
                    });
                }
                if caps.supports_wait() {
                    modes.push(AuthMode {
                        id: mode_id::PHONE_ACK1.to_owned(),
                        label: "Use your phone +33…".to_owned(),
                        ui: UiLayout::form("Unlock your phone +33… or accept request on web interface")
                            .with_wait(),
                        verify: Verification::Wait { grant: true },
                    });
                    modes.push(AuthMode {
                        id: mode_id::PHONE_ACK2.to_owned(),
                        label: "Use your phone +1…".to_owned(),
                        ui: UiLayout::form("Unlock your phone +1… or accept request on web interface")
                            .with_wait(),
                        verify: Verification::Wait { grant: false },
                    });
                    modes.push(AuthMode {
                        id: mode_id::FIDO_DEVICE1.to_owned(),
                        label: "Use your fido device foo".to_owned(),
                        ui: UiLayout::form("Plug your fido device and press with your thumb")
                            .with_wait(),
                        verify: Verification::Wait { grant: true },
                    });
                    if caps.supports_entry(entry_kind::CHARS) {
                        modes.push(AuthMode {
                            id: mode_id::EMAIL_LINK.to_owned(),
                            label: format!("Send URL to {username}@example.com"),
                            ui: UiLayout::form(format!(
                                "Click on the link received at {username}@example.com or enter the code:"
                            ))
                            .with_entry(entry_kind::CHARS)
                            .with_wait(),
                            verify: Verification::Wait { grant: true },
                        });
                    }
                }
            }
            layout_type::QR_CODE if caps.supports_wait() => {
                let mut ui = UiLayout {
                    kind: layout_type::QR_CODE.to_owned(),
                    label: Some("Enter the following code after flashing the address: ".to_owned()),
                    content: Some(QR_CONTENT.to_owned()),
                    code: Some(QR_PAIRING_CODE.to_owned()),
                    wait: Some("true".to_owned()),
                    ..Default::default()
                };
                if caps.supports_button() {
                    ui.button = Some("Regenerate code".to_owned());
                }
                modes.push(AuthMode {
                    id: mode_id::QR_CODE.to_owned(),
                    label: "Use a QR code".to_owned(),
                    ui,
                    verify: Verification::Wait { grant: true },
                });
            }
            _ => {}
        }
    }
    modes
}

fn reset_modes(policy: ResetPolicy, layouts: &[LayoutCapabilities]) -> Vec<AuthMode> {
    let Some(caps) = layouts
        .iter()
        .find(|c| c.kind == layout_type::NEW_PASSWORD)
    else {
        return Vec::new();
    };

    match policy {
        ResetPolicy::None => Vec::new(),
        ResetPolicy::MustReset => vec![AuthMode {
            id: mode_id::MANDATORY_RESET.to_owned(),
            label: "Password reset".to_owned(),
            ui: UiLayout {
                kind: layout_type::NEW_PASSWORD.to_owned(),
                label: Some("Enter your new password".to_owned()),
                entry: Some(entry_kind::CHARS_PASSWORD.to_owned()),
                ..Default::default()
            },
            verify: Verification::NewPassword { skippable: false },
        }],
        ResetPolicy::CanReset => {
            let mut ui = UiLayout {
                kind: layout_type::NEW_PASSWORD.to_owned(),
                label: Some("Enter your new password (3 days until mandatory)".to_owned()),
                entry: Some(entry_kind::CHARS_PASSWORD.to_owned()),
                ..Default::default()
            };
            if caps.supports_button() {
                ui.button = Some("Skip".to_owned());
            }
            vec![AuthMode {
                id: mode_id::OPTIONAL_RESET.to_owned(),
                label: "Optional password reset".to_owned(),
                ui,
                verify: Verification::NewPassword { skippable: true },
            }]
        }
    }
}

/// Order the offered modes: "password" first, then the user's previously
/// successful mode, then the rest by ascending id.
pub fn sort_modes(modes: &mut [AuthMode], last_selected: Option<&str>) {
    modes.sort_by(|a, b| {
        let rank = |m: &AuthMode| {
            (
                m.id != mode_id::PASSWORD,
                Some(m.id.as_str()) != last_selected,
            )
        };
        rank(a).cmp(&rank(b)).then_with(|| a.id.cmp(&b.id))
    });
}
