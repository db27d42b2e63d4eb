//! Error mapping, guards, passthrough and auxiliary routes.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use basket_bff::lifecycle::Shutdown;
use basket_bff::HttpServer;
use serde_json::json;
use tokio::net::TcpListener;
use wiremock::matchers::{header as header_eq, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod common;

use common::{config_for, cookie_pair, get, json_body, post, session, Harness};

#[tokio::test]
async fn test_upstream_status_passes_through() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flags"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "reason": "gone" })))
        .mount(&h.upstream)
        .await;

    let response = h.send(get("/api/flags").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Upstream API error");
    assert_eq!(body["details"], json!({ "reason": "gone" }));
}

#[tokio::test]
async fn test_invalid_upstream_json_is_500() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&h.upstream)
        .await;

    let response = h.send(get("/api/flags").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["success"], false);
}

#[tokio::test]
async fn test_invalid_profile_update_response_is_502() {
    let h = Harness::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/update-info-profil/P1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let client = session("P1", "B1", "BE/FR", &["BE"]);
    let response = h
        .send(
            post("/api/profile/update")
                .header(header::COOKIE, cookie_pair(&client))
                .body(json_body(json!({ "Nom": "Doe" })))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_empty_profile_update_response_is_success() {
    let h = Harness::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/update-info-profil/P1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let client = session("P1", "B1", "BE/FR", &["BE"]);
    let response = h
        .send(
            post("/api/profile/update")
                .header(header::COOKIE, cookie_pair(&client))
                .body(json_body(json!({ "Nom": "Doe", "email": "jane@example.com" })))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let received = h.received().await;
    let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["sNom"], "Doe");
    assert_eq!(sent["sEmail"], "jane@example.com");
    assert_eq!(sent["sLangue"], "FR");
}

#[tokio::test]
async fn test_missing_fields_never_reach_upstream() {
    let h = Harness::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&h.upstream)
        .await;

    let cases = [
        post("/api/add-product-to-wishlist")
            .body(json_body(json!({ "iProfile": "P1" })))
            .unwrap(),
        post("/api/update-quantity-articleBasket")
            .body(json_body(json!({ "sCodeArticle": "1", "iQte": 2, "iProfile": "P1" })))
            .unwrap(),
        post("/api/delete-article-wishlistBasket")
            .body(json_body(json!({ "iProfile": "P1", "iBasket": "B1" })))
            .unwrap(),
        get("/api/comparaison-by-code-30041025").body(Body::empty()).unwrap(),
        get("/api/search-article").body(Body::empty()).unwrap(),
        get("/api/nominatim/search").body(Body::empty()).unwrap(),
        get("/proxy-image").body(Body::empty()).unwrap(),
        post("/api/auth/login-with-code").body(Body::empty()).unwrap(),
        get("/api/projet-download").body(Body::empty()).unwrap(),
    ];

    for request in cases {
        let uri = request.uri().clone();
        let response = h.send(request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.json()["success"], false, "{uri}");
    }
}

#[tokio::test]
async fn test_malformed_request_body_is_400() {
    let h = Harness::start().await;
    let response = h
        .send(
            post("/api/add-product-to-wishlist")
                .body(Body::from("{oops"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_passthrough_forwards_request_and_response() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get-article-details"))
        .and(query_param("id", "42"))
        .and(header_eq("x-custom", "yes"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-upstream", "1")
                .set_body_string("created"),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .send(
            get("/api/get-article-details?id=42")
                .header("x-custom", "yes")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.headers.get("x-upstream").unwrap(), "1");
    assert_eq!(&response.body[..], b"created");
}

#[tokio::test]
async fn test_passthrough_forwards_post_body() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/api/something-else"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .send(
            post("/api/something-else")
                .body(json_body(json!({ "a": 1 })))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let received = h.received().await;
    let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent, json!({ "a": 1 }));
}

#[tokio::test]
async fn test_unknown_routes() {
    let h = Harness::start().await;

    let response = h.send(get("/not-api").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = h
        .send(get("/api/add-product-to-wishlist").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_project_download_streams_pdf() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projet-download"))
        .and(header_eq("accept", "application/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4".to_vec()),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    let client = session("P1", "B1", "BE/FR", &[]);
    let response = h
        .send(
            get("/api/projet-download")
                .header(header::COOKIE, cookie_pair(&client))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"%PDF-1.4");
    assert_eq!(
        response.headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"projet_B1.pdf\""
    );
    assert_eq!(response.headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
}

#[tokio::test]
async fn test_project_download_of_empty_basket_is_404() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projet-download"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&h.upstream)
        .await;

    let client = session("P1", "B1", "BE/FR", &[]);
    let response = h
        .send(
            get("/api/projet-download")
                .header(header::COOKIE, cookie_pair(&client))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["success"], false);
}

#[tokio::test]
async fn test_oauth_redirects() {
    let h = Harness::start().await;

    let response = h
        .send(get("/api/auth/google-mobile").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::FOUND);
    let location = response.headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert_eq!(location, format!("{}/api/auth/google-mobile", h.upstream.uri()));

    let response = h
        .send(
            get("/api/auth/oauth-callback?provider=google&error=denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        response.headers.get(header::LOCATION).unwrap(),
        "http://app.test/#/login?oauth=error&provider=google&error=denied"
    );

    let response = h
        .send(
            get("/api/auth/oauth-success?provider=facebook")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        response.headers.get(header::LOCATION).unwrap(),
        "http://app.test/#/home?oauth=success&provider=facebook"
    );
}

#[tokio::test]
async fn test_tiles_and_images_are_cached() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/osm/3/4/5.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&h.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xff, 0xd8]),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .send(get("/api/tiles/3/4/5.png").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(
        response.headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=86400"
    );

    let response = h
        .send(get("/proxy-image?url=/images/a.jpg").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(&response.body[..], &[0xff, 0xd8]);

    let response = h
        .send(get("/api/tiles/3/4/x.png").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = h
        .send(get("/proxy-image?url=file:///etc/passwd").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_geocoding_forwards_query() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("format", "json"))
        .and(query_param("q", "Brussels"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lat": "50.8" }])))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .send(get("/api/nominatim/search?q=Brussels").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!([{ "lat": "50.8" }]));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let h = Harness::start().await;
    let response = h
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers.get("x-request-id").unwrap(), "req-1");

    let response = h.send(get("/health").body(Body::empty()).unwrap()).await;
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_over_tcp_and_graceful_shutdown() {
    let upstream = wiremock::MockServer::start().await;
    let server = HttpServer::new(config_for(&upstream.uri())).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "OK", "message": "Proxy server is running" }));

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_upstream_timeout_is_500_with_details() {
    let h = Harness::start_with(|config| {
        config.upstream.request_timeout_secs = 1;
        config.upstream.cart_timeout_secs = 4;
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/api/flags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(2500)),
        )
        .mount(&h.upstream)
        .await;

    let response = h.send(get("/api/flags").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Upstream request failed");
    assert!(body["details"].as_str().unwrap().contains("did not respond"));
}

#[tokio::test]
async fn test_cart_mutations_get_the_longer_timeout() {
    let h = Harness::start_with(|config| {
        config.upstream.request_timeout_secs = 1;
        config.upstream.cart_timeout_secs = 4;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/api/add-product-to-wishlist"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true }))
                .set_delay(Duration::from_millis(2000)),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .send(
            post("/api/add-product-to-wishlist")
                .body(json_body(json!({ "sCodeArticle": "1", "iProfile": "P1" })))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["success"], true);
}

#[tokio::test]
async fn test_comparison_keeps_ids_out_of_the_query() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/comparaison-by-code-30041025"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prices": [] })))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .send(
            get("/api/comparaison-by-code-30041025?sCodeArticle=123&iProfile=P1&iBasket=B1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let received = h.received().await;
    let mut keys: Vec<String> = received[0]
        .url
        .query_pairs()
        .map(|(key, _)| key.into_owned())
        .collect();
    keys.sort();
    assert_eq!(keys, ["iQuantite", "sCodeArticle"]);

    let forwarded = common::upstream_session(&received[0]).expect("session forwarded");
    assert_eq!(forwarded.identity, "P1");
    assert_eq!(forwarded.basket_id, "B1");
}

#[tokio::test]
async fn test_country_selected_rejects_placeholder_basket() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/api/update-country-selected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&h.upstream)
        .await;

    for basket in ["0", "basket_tmp"] {
        let response = h
            .send(
                post("/api/update-country-selected")
                    .body(json_body(json!({
                        "iBasket": basket,
                        "sCodeArticle": "123",
                        "sNewPaysSelected": "FR",
                    })))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{basket}");
    }
}
