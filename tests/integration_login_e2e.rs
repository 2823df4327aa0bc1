mod common;

use gatehouse::{config::Environment, routes, AppState};
use serde_json::{json, Value};

// Shared test context
struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

impl TestContext {
    /// Serves a development app with enforced login on an ephemeral port.
    async fn start() -> Self {
        let mut config = common::config(Environment::Development);
        config.enforce_auth = true;

        let state = AppState::new(&config).await.unwrap();
        let app = routes::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .unwrap(),
            base_url: format!("http://{}", addr),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[tokio::test]
async fn test_login_flow_and_user_management() {
    let context = TestContext::start().await;

    // Step 1: an anonymous visit is bounced through login and back home
    let home = context.client.get(context.url("/users")).send().await.unwrap();
    assert_eq!(home.status().as_u16(), 200);
    assert_eq!(home.url().path(), "/");
    let body = home.text().await.unwrap();
    assert!(body.contains("Signed in as Joe Schmoe."), "login did not stick: {}", body);

    // Step 2: the session cookie now opens the user pages
    let users = context.client.get(context.url("/users")).send().await.unwrap();
    assert_eq!(users.status().as_u16(), 200);
    assert_eq!(users.url().path(), "/users");

    // Step 3: create through the HTML form, following the redirect
    let created = context
        .client
        .post(context.url("/users"))
        .form(&[("name", "Test User")])
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 200);
    assert_eq!(created.url().path(), "/users/1");
    let body = created.text().await.unwrap();
    assert!(body.contains("User created"));
    assert!(body.contains("<h1>Test User</h1>"));

    // Step 4: the flash is gone on the next page
    let again = context.client.get(context.url("/users/1")).send().await.unwrap();
    assert!(!again.text().await.unwrap().contains("User created"));

    // Step 5: JSON clients get JSON
    let listed: Value = context
        .client
        .get(context.url("/users"))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, json!({ "users": [{ "id": 1, "name": "Test User" }] }));

    // Step 6: logout drops the login
    let out = context.client.get(context.url("/logout")).send().await.unwrap();
    assert_eq!(out.url().path(), "/");
    assert!(out.text().await.unwrap().contains("Log in"));
}

#[tokio::test]
async fn test_redirects_are_see_other() {
    let context = TestContext::start().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client.get(context.url("/users")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(response.headers()["location"], "/auth");
}
