//! Payment gate consulted by front-end flows before claims and transfers.
//!
//! The custody machine itself is payment-agnostic. Deployments that charge
//! for transitions call `POST /v1/checkout` first; only free mode is
//! implemented here, every other deployment answers 503.

use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of a checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allow {
        /// Opaque checkout id.
        id: String,
        /// Where the front-end continues.
        url: String,
    },
    Deny {
        reason: String,
    },
}

/// Charge or wave through a transition.
pub trait PaymentGate: Send + Sync {
    fn charge_or_free_mode_ok(&self, return_url: Option<&str>) -> GateDecision;
}

/// Allows everything when free mode is on; denies otherwise.
#[derive(Debug, Clone, Copy)]
pub struct FreeModeGate {
    pub free_mode: bool,
}

impl PaymentGate for FreeModeGate {
    fn charge_or_free_mode_ok(&self, return_url: Option<&str>) -> GateDecision {
        if self.free_mode {
            GateDecision::Allow {
                id: format!("free-{}", uuid::Uuid::new_v4()),
                url: return_url.unwrap_or("/").to_string(),
            }
        } else {
            GateDecision::Deny {
                reason: "payments are not configured".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_mode_allows_with_return_url() {
        let gate = FreeModeGate { free_mode: true };
        match gate.charge_or_free_mode_ok(Some("/verify/SKU1/S1")) {
            GateDecision::Allow { id, url } => {
                assert!(id.starts_with("free-"));
                assert_eq!(url, "/verify/SKU1/S1");
            }
            other => panic!("expected allow, got {other:?}"),
        }
    }

    #[test]
    fn paid_mode_denies() {
        let gate = FreeModeGate { free_mode: false };
        assert!(matches!(
            gate.charge_or_free_mode_ok(None),
            GateDecision::Deny { .. }
        ));
    }
}
