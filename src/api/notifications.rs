//! Gateway notification endpoints
//!
//! The gateway posts a signed form body once a transaction or token
//! registration completes and expects a CRLF acknowledgement in return.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use super::AppState;
use crate::error::GatewayResult;
use crate::payments::notification::{
    Notification, NotificationOutcome, NotificationResponse, TokenNotification,
    TransactionNotification,
};

pub async fn transaction_notification(State(state): State<AppState>, body: String) -> Response {
    respond(handle::<TransactionNotification>(&state, &body).await)
}

pub async fn token_notification(State(state): State<AppState>, body: String) -> Response {
    respond(handle::<TokenNotification>(&state, &body).await)
}

async fn handle<N: Notification>(state: &AppState, body: &str) -> GatewayResult<NotificationResponse> {
    let manager = &state.manager;

    let notification = match manager.create_notification::<N>(body) {
        Ok(notification) => notification,
        Err(e) => {
            let outcome = if N::parse(body).is_err() {
                NotificationOutcome::Malformed
            } else {
                NotificationOutcome::Invalid
            };
            let detail = e.to_string().chars().take(255).collect();
            return manager.create_notification_response(N::FAMILY, outcome, Some(detail));
        }
    };

    let header = notification.header();
    let Some(stored) = state.keys.lookup(&header.vendor_tx_code).await else {
        warn!(
            family = N::FAMILY.as_str(),
            vendor_tx_code = %header.vendor_tx_code,
            "notification for unknown transaction"
        );
        return manager.create_notification_response(
            N::FAMILY,
            NotificationOutcome::Invalid,
            Some("Unknown transaction".to_string()),
        );
    };

    if stored.vps_tx_id != header.vps_tx_id {
        warn!(
            family = N::FAMILY.as_str(),
            vendor_tx_code = %header.vendor_tx_code,
            vps_tx_id = %header.vps_tx_id,
            "notification VPSTxId does not match the registration"
        );
        return manager.create_notification_response(
            N::FAMILY,
            NotificationOutcome::Invalid,
            Some("VPSTxId mismatch".to_string()),
        );
    }

    let ack = manager.acknowledge(&notification, &stored.security_key)?;
    info!(
        family = N::FAMILY.as_str(),
        vendor_tx_code = %header.vendor_tx_code,
        status = %header.status,
        ack = %ack.status,
        "notification acknowledged"
    );
    Ok(ack)
}

fn respond(result: GatewayResult<NotificationResponse>) -> Response {
    match result {
        Ok(ack) => (StatusCode::OK, [(CONTENT_TYPE, "text/plain")], ack.to_body()).into_response(),
        Err(e) => {
            error!(error = %e, "failed to build notification acknowledgement");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::keys::{InMemorySecurityKeyStore, SecurityKeyStore, StoredKey};
    use crate::api::testing::{app_state, post_form, StubTransport, SECURITY_KEY};
    use crate::api::{router, AppState};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const TRANSACTION_BODY: &str = "VPSProtocol=2.23&TxType=PAYMENT&VendorTxCode=order-1&VPSTxId=%7BABC-123%7D&Status=OK&TxAuthNo=4242&AVSCV2=ALL+MATCH&AddressResult=MATCHED&PostCodeResult=MATCHED&CV2Result=MATCHED&GiftAid=0&3DSecureStatus=OK&CAVV=AAABARR5kwAAAAAAAAAAAAAAAAA&CardType=VISA&Last4Digits=0006&VPSSignature=1013C0804185AFBBB983C44942893F48";
    const TOKEN_BODY: &str = "VPSProtocol=2.23&TxType=TOKEN&VendorTxCode=card-1&VPSTxId=%7BTOK-1%7D&Status=OK&CardType=MC&Last4Digits=4444&Token=%7B7D7BD5E5-D1E1-4C5C-A1F6-5B4E2C4D0A11%7D&ExpiryDate=0927&VPSSignature=9AEB6FD216633892F8AFF979A2128577";

    async fn store_key(keys: &InMemorySecurityKeyStore, vendor_tx_code: &str, vps_tx_id: &str) {
        let key = StoredKey {
            vps_tx_id: vps_tx_id.to_string(),
            security_key: SECURITY_KEY.to_string(),
        };
        keys.store(vendor_tx_code.to_string(), key).await;
    }

    async fn state() -> AppState {
        let keys = Arc::new(InMemorySecurityKeyStore::new());
        store_key(&keys, "order-1", "{ABC-123}").await;
        store_key(&keys, "card-1", "{TOK-1}").await;
        app_state(StubTransport::unreachable(), keys)
    }

    #[tokio::test]
    async fn test_authentic_transaction_notification_is_acknowledged_ok() {
        let (status, body) = post_form(state().await, "/notifications/transaction", TRANSACTION_BODY).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Status=OK\r\nRedirectURL=https://shop.example/pages/ok");
    }

    #[tokio::test]
    async fn test_tampered_notification_is_invalid() {
        let tampered = TRANSACTION_BODY.replace("Last4Digits=0006", "Last4Digits=0007");
        let (_, body) = post_form(state().await, "/notifications/transaction", &tampered).await;

        assert_eq!(
            body,
            "Status=INVALID\r\nRedirectURL=https://shop.example/pages/invalid\r\nStatusDetail=Signature mismatch"
        );
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_invalid() {
        let state = app_state(StubTransport::unreachable(), Arc::new(InMemorySecurityKeyStore::new()));
        let (_, body) = post_form(state, "/notifications/transaction", TRANSACTION_BODY).await;

        assert!(body.starts_with("Status=INVALID\r\n"));
        assert!(body.ends_with("StatusDetail=Unknown transaction"));
    }

    #[tokio::test]
    async fn test_vps_tx_id_must_match_the_registration() {
        let keys = Arc::new(InMemorySecurityKeyStore::new());
        store_key(&keys, "order-1", "{OTHER-999}").await;
        let state = app_state(StubTransport::unreachable(), keys);

        let (status, body) = post_form(state, "/notifications/transaction", TRANSACTION_BODY).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "Status=INVALID\r\nRedirectURL=https://shop.example/pages/invalid\r\nStatusDetail=VPSTxId mismatch"
        );
    }

    #[tokio::test]
    async fn test_token_notifications() {
        let state = state().await;
        let (_, body) = post_form(state.clone(), "/notifications/token", TOKEN_BODY).await;
        assert_eq!(body, "Status=OK\r\nRedirectURL=https://shop.example/pages/token_ok");

        let (_, body) = post_form(state, "/notifications/token", "Status=OK").await;
        assert!(body.starts_with("Status=MALFORMED\r\nRedirectURL=https://shop.example/pages/token_error"));
    }

    #[tokio::test]
    async fn test_undecodable_transaction_notification_is_invalid() {
        let (status, body) = post_form(state().await, "/notifications/transaction", "Status=OK").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Status=INVALID\r\nRedirectURL=https://shop.example/pages/malformed"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router(state().await).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: crate::api::health::HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.mode, "simulator");
        assert!(health.vendor_configured);
    }
}
