use std::env;
use std::path::PathBuf;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use diesel::prelude::*;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, MutexGuard};
use tower::ServiceExt;

use casetrack::auth::jwt::JwtService;
use casetrack::config::AppConfig;
use casetrack::db;
use casetrack::models::{NewCase, NewDocument, NewUser};
use casetrack::routes::create_router;
use casetrack::schema::{cases, documents, users};
use casetrack::state::AppState;

// Tests share one database; serialize them.
static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub async fn acquire_db_lock() -> MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    _storage_root: tempfile::TempDir,
}

impl TestApp {
    /// Returns `None` when TEST_DATABASE_URL is not set, so the suite can
    /// run without a database and simply skip the integration cases.
    pub fn try_new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return Ok(None);
        };

        let storage_root = tempfile::tempdir()?;
        let config = AppConfig {
            database_url,
            database_max_pool_size: 2,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "integration-test-secret".to_string(),
            jwt_issuer: "casetrack".to_string(),
            jwt_audience: "casetrack-clients".to_string(),
            jwt_expiry_minutes: 5,
            cors_allowed_origin: None,
            files_base_dir: storage_root.path().to_path_buf(),
            inbox_dir: storage_root.path().join("inbox"),
            index_dir: storage_root.path().join("index"),
        };

        let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
        db::run_migrations(&pool)?;

        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt);
        let router = create_router(state.clone());

        let app = Self {
            state,
            router,
            _storage_root: storage_root,
        };
        app.reset_database()?;
        Ok(Some(app))
    }

    pub fn reset_database(&self) -> Result<()> {
        let mut conn = self.state.pool.get()?;
        diesel::sql_query("TRUNCATE TABLE documents, cases, users RESTART IDENTITY CASCADE")
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn insert_user(&self, username: &str, role: &str) -> Result<i32> {
        let mut conn = self.state.pool.get()?;
        let id = diesel::insert_into(users::table)
            .values(&NewUser {
                username: username.to_string(),
                display_name: None,
                password_hash: "not-a-real-hash".to_string(),
                role: role.to_string(),
            })
            .returning(users::id)
            .get_result(&mut conn)?;
        Ok(id)
    }

    pub fn insert_case(&self, user_id: i32, name: &str, notes: Option<&str>) -> Result<i32> {
        let now = chrono::Utc::now().naive_utc();
        let mut conn = self.state.pool.get()?;
        let id = diesel::insert_into(cases::table)
            .values(&NewCase {
                user_id,
                customer_id: None,
                name: name.to_string(),
                status: "queued".to_string(),
                input_dir: String::new(),
                index_dir: String::new(),
                rag_version: None,
                notes: notes.map(str::to_string),
                created_at: Some(now),
                updated_at: Some(now),
            })
            .returning(cases::id)
            .get_result(&mut conn)?;
        Ok(id)
    }

    pub fn insert_document(&self, case_id: i32, filename: &str, status: &str) -> Result<i32> {
        let mut conn = self.state.pool.get()?;
        let id = diesel::insert_into(documents::table)
            .values(&NewDocument {
                case_id,
                user_id: None,
                filename: filename.to_string(),
                stored_path: format!("/tmp/{filename}"),
                mime_type: Some("application/pdf".to_string()),
                size_bytes: Some(1024),
                pages: Some(1),
                status: status.to_string(),
                notes: None,
            })
            .returning(documents::id)
            .get_result(&mut conn)?;
        Ok(id)
    }

    pub fn token_for(&self, user_id: i32, username: &str, role: &str) -> Result<String> {
        self.state.jwt.generate_token(user_id, username, role)
    }

    pub fn case_dirs(&self, case_id: i32) -> (PathBuf, PathBuf) {
        (
            self.state.storage.input_dir(case_id),
            self.state.storage.index_dir(case_id),
        )
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response<Body>> {
        let mut request = Request::builder().uri(path).method("GET");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty())?)
            .await?;
        Ok(response)
    }

    pub async fn post_form(
        &self,
        path: &str,
        token: Option<&str>,
        body: &str,
    ) -> Result<Response<Body>> {
        let mut request = Request::builder()
            .uri(path)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::from(body.to_string()))?)
            .await?;
        Ok(response)
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    Ok(body.collect().await?.to_bytes().to_vec())
}
