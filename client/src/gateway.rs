//! Payment gateway handoff and return parsing.
//!
//! The backend opens a gateway session and answers with a [`GatewayRedirect`].
//! The shell either navigates to the hosted page or auto-submits a hidden form
//! to it. The gateway later sends the browser back to `/payment/success`,
//! `/payment/failed` or `/payment/cancelled`, and [`GatewayReturn`] is the
//! parsed form of those three routes.

use crate::types::{wire_names, BookingId, EventId, Money, PackageId, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// How the shell hands off to the gateway
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMethod {
    /// Navigate to `gateway_url`
    #[default]
    Redirect,
    /// POST a hidden form with `fields` to `gateway_url`
    Form,
}

/// Server-issued gateway session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(remote = "Self")]
#[serde(rename_all = "camelCase")]
pub struct GatewayRedirect {
    /// Key of the resumable payment flow
    #[serde(alias = "tranId")]
    pub transaction_id: TransactionId,
    /// Hosted checkout page
    #[serde(alias = "url", alias = "redirectUrl")]
    pub gateway_url: String,
    /// Navigate or auto-submit
    #[serde(default)]
    pub method: RedirectMethod,
    /// Hidden form fields for [`RedirectMethod::Form`]
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

wire_names!(GatewayRedirect {
    "transactionId" => ["tranId"],
    "gatewayUrl" => ["url", "redirectUrl"],
});

impl GatewayRedirect {
    /// HTML document that POSTs `fields` to the gateway on load
    ///
    /// Only meaningful for [`RedirectMethod::Form`]; a shell that can only
    /// load documents renders this instead of navigating.
    #[must_use]
    pub fn autosubmit_form(&self) -> String {
        let mut html = String::from(
            "<!doctype html><html><body onload=\"document.forms[0].submit()\">",
        );
        let _ = write!(
            html,
            "<form method=\"post\" action=\"{}\">",
            escape_html(&self.gateway_url)
        );
        for (name, value) in &self.fields {
            let _ = write!(
                html,
                "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                escape_html(name),
                escape_html(value)
            );
        }
        html.push_str("<noscript><button type=\"submit\">Continue to payment</button></noscript>");
        html.push_str("</form></body></html>");
        html
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Gateway statuses that mean the charge went through
#[must_use]
pub fn is_valid_status(status: &str) -> bool {
    status.eq_ignore_ascii_case("VALID") || status.eq_ignore_ascii_case("VALIDATED")
}

/// Why the gateway sent the user to the failure route
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// `insufficient_funds`
    InsufficientFunds,
    /// `card_declined`
    CardDeclined,
    /// `expired` or `timeout`
    Expired,
    /// `validation_failed`, or a success return with an untrusted status
    ValidationFailed,
    /// `cancelled`
    Cancelled,
    /// Anything else, keeping the raw value for logs
    Other(Option<String>),
}

impl FailureReason {
    /// Map the `reason` query parameter
    #[must_use]
    pub fn from_param(reason: Option<&str>) -> Self {
        match reason.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("insufficient_funds") => Self::InsufficientFunds,
            Some("card_declined") => Self::CardDeclined,
            Some("expired" | "timeout") => Self::Expired,
            Some("validation_failed") => Self::ValidationFailed,
            Some("cancelled" | "canceled") => Self::Cancelled,
            Some("") | None => Self::Other(None),
            Some(other) => Self::Other(Some(other.to_string())),
        }
    }

    /// Message shown to the user
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InsufficientFunds => "Your payment was declined due to insufficient funds.",
            Self::CardDeclined => "Your card was declined. Please try a different payment method.",
            Self::Expired => "The payment session expired. Please try again.",
            Self::ValidationFailed => {
                "We could not verify your payment. If you were charged, contact support."
            },
            Self::Cancelled => "The payment was cancelled.",
            Self::Other(_) => "Payment could not be completed. Please try again.",
        }
    }

    /// Query parameter value
    #[must_use]
    pub fn as_param(&self) -> Option<&str> {
        match self {
            Self::InsufficientFunds => Some("insufficient_funds"),
            Self::CardDeclined => Some("card_declined"),
            Self::Expired => Some("expired"),
            Self::ValidationFailed => Some("validation_failed"),
            Self::Cancelled => Some("cancelled"),
            Self::Other(raw) => raw.as_deref(),
        }
    }
}

/// Parameters the gateway attaches to the success route
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuccessReturn {
    /// Transaction being resumed
    pub transaction_id: TransactionId,
    /// Gateway status, already checked to be `VALID`/`VALIDATED`
    pub status: String,
    /// Charged amount
    pub amount: Option<Money>,
    /// Booked event
    pub event_id: Option<EventId>,
    /// Booked package
    pub package_id: Option<PackageId>,
    /// Booking the backend created for this payment
    pub booking_id: Option<BookingId>,
}

/// Parsed gateway return route
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayReturn {
    /// `/payment/success` with a trusted status
    Success(SuccessReturn),
    /// `/payment/failed`, or a success route with an untrusted status
    Failed {
        /// Transaction, when the gateway passed it along
        transaction_id: Option<TransactionId>,
        /// Mapped reason
        reason: FailureReason,
    },
    /// `/payment/cancelled`
    Cancelled {
        /// Transaction, when the gateway passed it along
        transaction_id: Option<TransactionId>,
    },
}

impl GatewayReturn {
    /// Transaction this return belongs to
    #[must_use]
    pub const fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            Self::Success(success) => Some(&success.transaction_id),
            Self::Failed { transaction_id, .. } | Self::Cancelled { transaction_id } => {
                transaction_id.as_ref()
            },
        }
    }
}

/// Read a query parameter, accepting the first non-empty value among `names`
pub(crate) fn param<'a>(pairs: &'a [(String, String)], names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        pairs
            .iter()
            .find(|(key, value)| key == name && !value.trim().is_empty())
            .map(|(_, value)| value.trim())
    })
}

/// Success route parameters. A missing transaction id is reported to the caller.
pub(crate) fn parse_success(pairs: &[(String, String)]) -> Option<GatewayReturn> {
    let transaction_id = param(pairs, &["tran_id", "transactionId"]).map(TransactionId::from)?;
    let status = param(pairs, &["status"]).unwrap_or_default().to_string();

    if !is_valid_status(&status) {
        return Some(GatewayReturn::Failed {
            transaction_id: Some(transaction_id),
            reason: FailureReason::ValidationFailed,
        });
    }

    Some(GatewayReturn::Success(SuccessReturn {
        transaction_id,
        status,
        amount: param(pairs, &["amount"]).and_then(Money::parse_major),
        event_id: param(pairs, &["eventId"]).map(EventId::from),
        package_id: param(pairs, &["packageId"]).map(PackageId::from),
        booking_id: param(pairs, &["bookingId"]).map(BookingId::from),
    }))
}

pub(crate) fn parse_failed(pairs: &[(String, String)]) -> GatewayReturn {
    GatewayReturn::Failed {
        transaction_id: param(pairs, &["tran_id", "transactionId"]).map(TransactionId::from),
        reason: FailureReason::from_param(param(pairs, &["reason", "error"])),
    }
}

pub(crate) fn parse_cancelled(pairs: &[(String, String)]) -> GatewayReturn {
    GatewayReturn::Cancelled {
        transaction_id: param(pairs, &["tran_id", "transactionId"]).map(TransactionId::from),
    }
}

/// Query pairs that reproduce a return route
pub(crate) fn to_pairs(ret: &GatewayReturn) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    match ret {
        GatewayReturn::Success(success) => {
            pairs.push(("tran_id", success.transaction_id.to_string()));
            pairs.push(("status", success.status.clone()));
            if let Some(amount) = success.amount {
                pairs.push(("amount", amount.to_string()));
            }
            if let Some(event) = &success.event_id {
                pairs.push(("eventId", event.to_string()));
            }
            if let Some(package) = &success.package_id {
                pairs.push(("packageId", package.to_string()));
            }
            if let Some(booking) = &success.booking_id {
                pairs.push(("bookingId", booking.to_string()));
            }
        },
        GatewayReturn::Failed {
            transaction_id,
            reason,
        } => {
            if let Some(id) = transaction_id {
                pairs.push(("tran_id", id.to_string()));
            }
            if let Some(reason) = reason.as_param() {
                pairs.push(("reason", reason.to_string()));
            }
        },
        GatewayReturn::Cancelled { transaction_id } => {
            if let Some(id) = transaction_id {
                pairs.push(("tran_id", id.to_string()));
            }
        },
    }
    pairs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn success_with_valid_status_is_trusted() {
        let ret = parse_success(&pairs(&[
            ("tran_id", "TXN-9"),
            ("status", "VALID"),
            ("amount", "307.50"),
            ("eventId", "e1"),
            ("bookingId", "b7"),
        ]))
        .unwrap();

        let GatewayReturn::Success(success) = ret else {
            unreachable!("expected success, got {ret:?}");
        };
        assert_eq!(success.transaction_id, TransactionId::new("TXN-9"));
        assert_eq!(success.amount, Some(Money::from_cents(30_750)));
        assert_eq!(success.booking_id, Some(BookingId::new("b7")));
        assert_eq!(success.package_id, None);
    }

    #[test]
    fn success_with_other_status_is_a_failure() {
        let ret = parse_success(&pairs(&[("transactionId", "TXN-9"), ("status", "FAILED")]))
            .unwrap();
        assert_eq!(
            ret,
            GatewayReturn::Failed {
                transaction_id: Some(TransactionId::new("TXN-9")),
                reason: FailureReason::ValidationFailed,
            }
        );
    }

    #[test]
    fn success_without_transaction_is_rejected() {
        assert!(parse_success(&pairs(&[("status", "VALID")])).is_none());
    }

    #[test]
    fn failure_reasons_map_to_fixed_messages() {
        let cases = [
            (Some("insufficient_funds"), "Your payment was declined due to insufficient funds."),
            (Some("timeout"), "The payment session expired. Please try again."),
            (Some("expired"), "The payment session expired. Please try again."),
            (Some("something_new"), "Payment could not be completed. Please try again."),
            (None, "Payment could not be completed. Please try again."),
        ];
        for (reason, message) in cases {
            assert_eq!(FailureReason::from_param(reason).message(), message);
        }
    }

    #[test]
    fn autosubmit_form_escapes_fields() {
        let redirect = GatewayRedirect {
            transaction_id: TransactionId::new("TXN-1"),
            gateway_url: "https://pay.example.com/checkout".to_string(),
            method: RedirectMethod::Form,
            fields: BTreeMap::from([("cus_name".to_string(), "Tom \"T\" <Jr>".to_string())]),
        };
        let html = redirect.autosubmit_form();
        assert!(html.contains("action=\"https://pay.example.com/checkout\""));
        assert!(html.contains("value=\"Tom &quot;T&quot; &lt;Jr&gt;\""));
    }

    #[test]
    fn redirect_reads_alternate_field_names() {
        let redirect: GatewayRedirect = serde_json::from_value(serde_json::json!({
            "tranId": "TXN-2",
            "url": "https://pay.example.com/s/abc"
        }))
        .unwrap();
        assert_eq!(redirect.method, RedirectMethod::Redirect);
        assert!(redirect.fields.is_empty());
    }
}
