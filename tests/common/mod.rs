use std::{sync::Arc, time::Duration};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use shiftboard::{
    api, config,
    db::{self, mem::Mem},
    server,
};

pub struct TestServer {
    pub base_url: String,
    pub db_client: db::Client,
    pub store: Arc<Mem>,
}

/// Repository over a fresh in-memory store, no HTTP.
pub fn mem_client() -> (db::Client, Arc<Mem>) {
    let store = Arc::new(Mem::default());
    (db::Client::new(store.clone()), store)
}

/// Serves the full router over an in-memory store on an ephemeral port.
pub async fn spawn() -> TestServer {
    spawn_with_policy(config::OverlapPolicy::Allow).await
}

pub async fn spawn_with_policy(
    policy: config::OverlapPolicy,
) -> TestServer {
    let (db_client, store) = mem_client();

    let jwt = config::Jwt {
        secret: "test-secret".to_string(),
        expiration_time: Duration::from_secs(3600),
    };
    let state = Arc::new(server::AppState::new(db_client.clone(), &jwt, policy));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind an ephemeral port");
    let addr = listener.local_addr().expect("failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, server::router(state))
            .await
            .expect("server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        db_client,
        store,
    }
}

pub async fn seed_user(
    server: &TestServer,
    name: &str,
    username: &str,
    password: &str,
    role: api::user::Role,
) -> api::user::Id {
    server
        .db_client
        .create_user(db::user::NewUser {
            name: name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            role,
            avatar_url: None,
        })
        .await
        .expect("failed to seed a user")
}

#[derive(Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: api::User,
}

#[derive(Deserialize)]
pub struct Created<T> {
    pub id: T,
}

#[derive(Deserialize)]
pub struct Migrated {
    pub deleted: usize,
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
}

impl Client {
    pub fn new(server: &TestServer) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: server.base_url.clone(),
            auth_token: None,
        }
    }

    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<(Self, LoginResponse), StatusCode> {
        let response = self
            .inner
            .post(format!("{}/auth/login", self.base_url))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<LoginResponse>()
            .await
            .expect("failed to get a response");

        self.auth_token = Some(response.token.clone());
        Ok((self, response))
    }

    pub async fn login_raw(&self, body: &Value) -> StatusCode {
        self.inner
            .post(format!("{}/auth/login", self.base_url))
            .json(body)
            .send()
            .await
            .expect("failed to send a request")
            .status()
    }

    pub async fn me(&self) -> Result<api::User, StatusCode> {
        #[derive(Deserialize)]
        struct MeResponse {
            user: api::User,
        }

        let mut req = self.inner.get(format!("{}/auth/me", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<MeResponse>()
            .await
            .expect("failed to get a response")
            .user)
    }

    pub async fn get_users(
        &self,
        query: &str,
    ) -> Result<Vec<api::User>, StatusCode> {
        let mut req = self
            .inner
            .get(format!("{}/users{query}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Vec<api::User>>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn get_users_raw(&self) -> Value {
        let mut req = self.inner.get(format!("{}/users", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .expect("wrong status code")
            .json::<Value>()
            .await
            .expect("failed to get a response")
    }

    pub async fn add_user(
        &self,
        body: &Value,
    ) -> Result<Created<api::user::Id>, StatusCode> {
        let mut req = self.inner.post(format!("{}/users", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .json(body)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Created<api::user::Id>>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn edit_user(
        &self,
        id: api::user::Id,
        body: &Value,
    ) -> Result<Created<api::user::Id>, StatusCode> {
        let mut req = self
            .inner
            .patch(format!("{}/users/{id}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .json(body)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Created<api::user::Id>>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn get_shifts(
        &self,
        query: &str,
    ) -> Result<Vec<api::Shift>, StatusCode> {
        let mut req = self
            .inner
            .get(format!("{}/shifts{query}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Vec<api::Shift>>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn add_shift(
        &self,
        body: &Value,
    ) -> Result<Created<api::shift::Id>, StatusCode> {
        let mut req = self.inner.post(format!("{}/shifts", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .json(body)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Created<api::shift::Id>>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn edit_shift(
        &self,
        id: api::shift::Id,
        body: &Value,
    ) -> Result<Created<api::shift::Id>, StatusCode> {
        let mut req = self
            .inner
            .patch(format!("{}/shifts/{id}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .json(body)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Created<api::shift::Id>>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn delete_shift(
        &self,
        id: api::shift::Id,
    ) -> Result<(), StatusCode> {
        let mut req = self
            .inner
            .delete(format!("{}/shifts/{id}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?;
        Ok(())
    }

    pub async fn migrate_shifts(&self) -> Result<Migrated, StatusCode> {
        let mut req = self
            .inner
            .post(format!("{}/shifts/migrate", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Migrated>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn week(&self, offset: i64) -> Result<Value, StatusCode> {
        let mut req = self.inner.get(format!(
            "{}/schedule/week?offset={offset}",
            self.base_url,
        ));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<Value>()
            .await
            .expect("failed to get a response"))
    }
}
