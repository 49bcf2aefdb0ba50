use archive_store::{
    app,
    auth::{Caller, TokenSigner},
    config::AppConfig,
    db,
    state::AppState,
};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio::net::TcpListener;

const SECRET: &str = "integration-secret";

struct TestServer {
    base: String,
    state: AppState,
    client: Client,
    signer: TokenSigner,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{}", addr);

        let cfg = AppConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            storage_dir: dir.path().join("blobs").display().to_string(),
            database_url: format!("sqlite://{}", dir.path().join("meta.db").display()),
            jwt_secret: SECRET.into(),
            jwt_issuer: "archive-store".into(),
            token_ttl: Duration::from_secs(3600),
            upload_ttl: Duration::from_secs(900),
            public_base_url: base.clone(),
            // permanent deletes call back into this same server's proxy route
            delete_proxy_url: Some(format!("{}/storage/objects", base)),
        };

        std::fs::create_dir_all(&cfg.storage_dir).unwrap();
        let pool = Arc::new(db::connect(&cfg.database_url).await.unwrap());
        db::run_migrations(&pool).await.unwrap();
        let state = AppState::new(&cfg, pool);
        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base,
            state,
            client: Client::new(),
            signer: TokenSigner::new(SECRET, "archive-store", Duration::from_secs(3600)),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn token(&self, uid: &str, is_admin: bool) -> String {
        self.signer
            .issue(&Caller {
                uid: uid.into(),
                email: Some(format!("{uid}@example.com")),
                display_name: None,
                is_admin,
            })
            .unwrap()
    }
}

async fn body(response: reqwest::Response) -> Value {
    response.json::<Value>().await.unwrap()
}

/// Signed upload, then registration into `communityArchives`.
async fn upload_community_archive(server: &TestServer, token: &str) -> Value {
    let signed = body(
        server
            .client
            .post(server.url("/uploads/signed-url"))
            .bearer_auth(token)
            .json(&json!({"fileName": "React Basics.json", "contentType": "application/json"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let upload_url = signed["uploadUrl"].as_str().unwrap();
    let storage_path = signed["storagePath"].as_str().unwrap();

    let quiz = json!({
        "metadata": {"title": "React Basics", "description": "hooks", "num_questions": 2},
        "questions": [{"choices": ["a", "b"]}, {"choices": ["c", "d"]}]
    });
    let put = server
        .client
        .put(upload_url)
        .header("content-type", "application/json")
        .body(serde_json::to_vec(&quiz).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::OK);

    let created = server
        .client
        .post(server.url("/archives"))
        .bearer_auth(token)
        .json(&json!({"bucket": "communityArchives", "storagePath": storage_path}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    body(created).await
}

#[tokio::test]
async fn test_community_archive_full_lifecycle() {
    let server = TestServer::start().await;
    let member = server.token("member", false);
    let admin = server.token("admin", true);

    let record = upload_community_archive(&server, &member).await;
    let id = record["id"].as_str().unwrap().to_string();
    let storage_path = record["storagePath"].as_str().unwrap().to_string();
    assert_eq!(record["title"], "React Basics");
    assert_eq!(record["questionsCount"], 2);
    assert_eq!(record["uploaderId"], "member");

    // the uploader cannot delete
    let denied = server
        .client
        .post(server.url(&format!("/archives/communityArchives/{id}/delete")))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(denied).await["code"], "permission-denied");

    let deleted = server
        .client
        .post(server.url(&format!("/archives/communityArchives/{id}/delete")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    let transition = body(deleted).await;
    assert_eq!(transition["from"], "communityArchives");
    assert_eq!(transition["to"], "deletedCommunityArchives");

    let live = body(
        server
            .client
            .get(server.url("/archives/communityArchives"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(live, json!([]));

    let hidden = server
        .client
        .get(server.url("/archives/deletedCommunityArchives"))
        .send()
        .await
        .unwrap();
    assert_eq!(hidden.status(), StatusCode::FORBIDDEN);

    // permanent delete is refused from a live bucket
    let refused = server
        .client
        .delete(server.url(&format!("/archives/communityArchives/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(refused.status(), StatusCode::CONFLICT);
    assert_eq!(body(refused).await["code"], "invalid-transition");

    let purged = server
        .client
        .delete(server.url(&format!("/archives/deletedCommunityArchives/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(purged.status(), StatusCode::OK);
    let purged = body(purged).await;
    assert_eq!(purged["blobRemoved"], true);
    assert_eq!(purged["storagePath"], storage_path.as_str());
    assert!(!server.state.blobs.exists(&storage_path).await.unwrap());

    let gone = server
        .client
        .get(server.url(&format!("/archives/deletedCommunityArchives/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_move_and_restore_over_http() {
    let server = TestServer::start().await;
    let admin = server.token("admin", true);
    let record = upload_community_archive(&server, &admin).await;
    let id = record["id"].as_str().unwrap();

    let moved = body(
        server
            .client
            .post(server.url(&format!("/archives/communityArchives/{id}/move")))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(moved["to"], "officialArchives");

    server
        .client
        .post(server.url(&format!("/archives/officialArchives/{id}/delete")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let restored = body(
        server
            .client
            .post(server.url(&format!("/archives/deletedOfficialArchives/{id}/restore")))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(restored["to"], "officialArchives");
    assert_eq!(restored["record"], record);

    let content = server
        .client
        .get(server.url(&format!("/archives/officialArchives/{id}/content")))
        .send()
        .await
        .unwrap();
    assert_eq!(content.status(), StatusCode::OK);
    let quiz: Value = content.json().await.unwrap();
    assert_eq!(quiz["metadata"]["title"], "React Basics");

    let bad_bucket = server
        .client
        .post(server.url(&format!("/archives/trash/{id}/move")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(bad_bucket.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(bad_bucket).await["code"], "invalid-bucket");
}

#[tokio::test]
async fn test_delete_proxy_is_idempotent_and_admin_only() {
    let server = TestServer::start().await;
    server
        .state
        .blobs
        .put_bytes("archives/orphan.json", Bytes::from_static(b"{}"))
        .await
        .unwrap();
    let admin = server.token("admin", true);
    let member = server.token("member", false);
    let url = server.url("/storage/objects?filePath=archives/orphan.json");

    let denied = server.client.delete(&url).bearer_auth(&member).send().await.unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let anonymous = server.client.delete(&url).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let first = body(server.client.delete(&url).bearer_auth(&admin).send().await.unwrap()).await;
    assert_eq!(first, json!({"filePath": "archives/orphan.json", "deleted": true}));
    let second = body(server.client.delete(&url).bearer_auth(&admin).send().await.unwrap()).await;
    assert_eq!(second["deleted"], false);
}

#[tokio::test]
async fn test_admin_claims_and_drift() {
    let server = TestServer::start().await;
    let admin = server.token("root", true);
    let member = server.token("member", false);

    for (uid, email) in [("target", "user@example.com"), ("ops", "ops@example.com")] {
        server
            .state
            .users
            .upsert_account(uid, Some(email), None)
            .await
            .unwrap();
    }

    let denied = server
        .client
        .post(server.url("/admin/claims/grant"))
        .bearer_auth(&member)
        .json(&json!({"email": "user@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(
        !server
            .state
            .users
            .find_by_uid("target")
            .await
            .unwrap()
            .unwrap()
            .admin_claim
    );

    server
        .client
        .post(server.url("/admin/claims/grant"))
        .bearer_auth(&admin)
        .json(&json!({"email": "user@example.com"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    // claim written without the profile flag, as the CLI does
    server.state.users.set_admin_claim("ops", true).await.unwrap();

    let admins = body(
        server
            .client
            .get(server.url("/admin/claims"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(
        admins,
        json!([
            {"uid": "ops", "email": "ops@example.com", "tokenIsAdmin": true, "firestoreIsAdmin": false},
            {"uid": "target", "email": "user@example.com", "tokenIsAdmin": true, "firestoreIsAdmin": true}
        ])
    );

    // the stale non-admin token of `target` picks up the claim on refresh
    let stale = server.token("target", false);
    let refreshed = body(
        server
            .client
            .post(server.url("/auth/token/refresh"))
            .bearer_auth(&stale)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(refreshed["isAdmin"], true);
    let caller = server
        .signer
        .verify(refreshed["token"].as_str().unwrap())
        .unwrap();
    assert!(caller.is_admin);
}

#[tokio::test]
async fn test_rejects_bad_tokens_and_uploads() {
    let server = TestServer::start().await;

    let forged = TokenSigner::new("not-the-secret", "archive-store", Duration::from_secs(60))
        .issue(&Caller {
            uid: "mallory".into(),
            email: None,
            display_name: None,
            is_admin: true,
        })
        .unwrap();
    let response = server
        .client
        .get(server.url("/admin/claims"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(response).await["code"], "unauthenticated");

    let response = server
        .client
        .put(server.url("/uploads/garbage"))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let member = server.token("member", false);
    let signed = body(
        server
            .client
            .post(server.url("/uploads/signed-url"))
            .bearer_auth(&member)
            .json(&json!({"fileName": "quiz.json", "contentType": "application/json"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let wrong_type = server
        .client
        .put(signed["uploadUrl"].as_str().unwrap())
        .header("content-type", "text/plain")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_and_health() {
    let server = TestServer::start().await;
    let health = server.client.get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let ready = server.client.get(server.url("/readyz")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);

    let submitted = server
        .client
        .post(server.url("/feedback"))
        .json(&json!({"text": "More Rust quizzes please", "platform": "web", "appVersion": "1.0.0"}))
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status(), StatusCode::CREATED);

    let member = server.token("member", false);
    let denied = server
        .client
        .get(server.url("/feedback"))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let admin = server.token("admin", true);
    let board = body(
        server
            .client
            .get(server.url("/feedback"))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(board[0]["text"], "More Rust quizzes please");
    assert_eq!(board[0]["userId"], Value::Null);
}
