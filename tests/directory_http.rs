// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the HTTP directory client using wiremock.

#![cfg(feature = "http")]

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zendure_lib::directory::{DirectoryService, ZendureCloud};
use zendure_lib::error::DirectoryError;
use zendure_lib::types::TransportKind;

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({ "code": 200, "success": true, "data": data, "msg": "ok" })
}

/// Mounts a login endpoint handing out `token`.
async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/app/token"))
        .and(body_partial_json(json!({ "account": "user@example.com" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!({ "accessToken": token }))),
        )
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> ZendureCloud {
    ZendureCloud::with_base_url(server.uri(), "user@example.com", "hunter2").unwrap()
}

// ============================================================================
// Device Enumeration
// ============================================================================

mod enumeration {
    use super::*;

    #[tokio::test]
    async fn list_devices_logs_in_first() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("POST"))
            .and(path("/productModule/device/queryDeviceListByConsumerId"))
            .and(header("Blade-Auth", "bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
                { "id": 1234, "productName": "SolarFlow2.0" },
                { "id": "5678", "productName": "SuperBase V" }
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let cloud = client(&server);
        let devices = cloud.list_devices().await.unwrap();

        assert!(cloud.is_authenticated());
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "1234");
        assert_eq!(devices[1].product_name, "SuperBase V");
    }

    #[tokio::test]
    async fn token_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(envelope(json!({ "accessToken": "t" }))),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/productModule/device/queryDeviceListByConsumerId"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
            .expect(2)
            .mount(&server)
            .await;

        let cloud = client(&server);
        cloud.list_devices().await.unwrap();
        cloud.list_devices().await.unwrap();
    }

    #[tokio::test]
    async fn device_detail_builds_identity() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("POST"))
            .and(path("/device/solarFlow/detail"))
            .and(body_partial_json(json!({ "deviceId": "1234" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "deviceKey": "sU59jtkw",
                "productKey": "73bkTV",
                "deviceName": "Hyper 2000",
                "snNumber": "EE1LH",
                "electricity": 80
            }))))
            .mount(&server)
            .await;

        let detail = client(&server).device_detail("1234").await.unwrap();
        let identity = detail.into_identity();

        assert_eq!(identity.device_id(), "sU59jtkw");
        assert_eq!(identity.product_key(), "73bkTV");
        assert_eq!(identity.serial_number(), Some("EE1LH"));
    }
}

// ============================================================================
// Cloud Credentials
// ============================================================================

mod credentials {
    use super::*;

    #[tokio::test]
    async fn delegated_secret_becomes_cloud_credentials() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("POST"))
            .and(path("/developer/api/apply"))
            .and(body_partial_json(
                json!({ "account": "user@example.com", "snNumber": "EE1LH" }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "mqttUrl": "mqtt-eu.zen-iot.com:1883",
                "appKey": "appK",
                "secret": "s3cret"
            }))))
            .mount(&server)
            .await;

        let secret = client(&server)
            .delegated_secret("user@example.com", "EE1LH")
            .await
            .unwrap();
        let credentials = secret.into_credentials();

        assert_eq!(credentials.kind(), TransportKind::Cloud);
        assert_eq!(credentials.username(), "appK");
        assert_eq!(credentials.password(), "s3cret");
    }

    #[tokio::test]
    async fn refused_request_is_api_error() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("POST"))
            .and(path("/developer/api/apply"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 10003,
                "success": false,
                "data": null,
                "msg": "device not bound"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .delegated_secret("user@example.com", "EE1LH")
            .await
            .unwrap_err();

        assert!(
            matches!(err, DirectoryError::Api { code: 10003, ref message } if message == "device not bound")
        );
    }
}

// ============================================================================
// Authentication Failures
// ============================================================================

mod authentication {
    use super::*;

    #[tokio::test]
    async fn refused_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 400,
                "success": false,
                "msg": "wrong password"
            })))
            .mount(&server)
            .await;

        let cloud = client(&server);
        let err = cloud.list_devices().await.unwrap_err();

        assert!(matches!(err, DirectoryError::AuthenticationFailed));
        assert!(!cloud.is_authenticated());
    }

    #[tokio::test]
    async fn unauthorized_response_clears_token() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("POST"))
            .and(path("/productModule/device/queryDeviceListByConsumerId"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let cloud = client(&server);
        let err = cloud.list_devices().await.unwrap_err();

        assert!(matches!(err, DirectoryError::AuthenticationFailed));
        assert!(!cloud.is_authenticated());
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("POST"))
            .and(path("/device/solarFlow/detail"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).device_detail("1").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Api { code: 503, .. }));
    }
}
