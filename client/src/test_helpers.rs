//! Shared fixtures: a scripted transport and an in-memory fake backend that
//! honors the auth contract (login, register, me, refresh, bearer checks).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::error::ApiError;
use crate::net::api::Api;
use crate::net::pipeline::AuthPipeline;
use crate::net::request::{ApiRequest, ApiResponse, RequestBody};
use crate::net::transport::HttpTransport;
use crate::state::session::SessionController;
use crate::state::tokens::TokenStore;
use crate::util::redirect::MemoryNavigator;

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync;

// =========================================================================
// MockTransport
// =========================================================================

/// Records every request and answers through a handler closure.
pub struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<ApiRequest>>,
    hold: Mutex<Option<(String, Arc<Notify>)>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    {
        Arc::new(Self { handler: Box::new(handler), requests: Mutex::new(Vec::new()), hold: Mutex::new(None) })
    }

    /// Answer from a queue of canned responses, in order.
    pub fn scripted(responses: Vec<Result<ApiResponse, ApiError>>) -> Arc<Self> {
        let queue = Mutex::new(responses.into_iter().collect::<std::collections::VecDeque<_>>());
        Self::new(move |req| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request {} {}", req.method.as_str(), req.path))
        })
    }

    pub fn backend(fake: Arc<FakeBackend>) -> Arc<Self> {
        Self::new(move |req| Ok(fake.handle(req)))
    }

    /// Park requests to `route` until the returned `Notify` fires.
    pub fn hold_route(&self, route: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some((route.to_owned(), Arc::clone(&notify)));
        notify
    }

    /// Let later requests through; ones already parked stay parked.
    pub fn release_hold(&self) {
        *self.hold.lock().unwrap() = None;
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.requests().iter().filter(|r| r.route() == route).count()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self
            .hold
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(route, _)| route == request.route())
            .map(|(_, notify)| Arc::clone(notify));
        if let Some(gate) = gate {
            gate.notified().await;
        }
        (self.handler)(request)
    }
}

// =========================================================================
// FakeBackend
// =========================================================================

struct Account {
    id: u64,
    username: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct FakeState {
    accounts: Vec<Account>,
    access: HashMap<String, u64>,
    refresh: HashMap<String, u64>,
    issued: u64,
    rotate_refresh: bool,
    unread: u64,
}

/// Fake REST backend. Tokens are issued as `T1`, `T2`, ... and `R1`, ...
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

pub fn user_json(id: u64, username: &str) -> Value {
    json!({ "id": id, "username": username, "profile": { "bio": null } })
}

fn respond(status: u16, body: &Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}

fn form_field<'a>(body: &'a RequestBody, name: &str) -> Option<&'a str> {
    match body {
        RequestBody::Form(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str()),
        _ => None,
    }
}

fn json_field<'a>(body: &'a RequestBody, name: &str) -> Option<&'a str> {
    match body {
        RequestBody::Json(value) => value.get(name).and_then(Value::as_str),
        _ => None,
    }
}

impl FakeBackend {
    /// A backend with one account: `alice` / `correct-pw`, id 1.
    pub fn new() -> Arc<Self> {
        let state = FakeState {
            accounts: vec![Account {
                id: 1,
                username: "alice".into(),
                email: "alice@example.test".into(),
                password: "correct-pw".into(),
            }],
            ..FakeState::default()
        };
        Arc::new(Self { state: Mutex::new(state) })
    }

    /// Issue a fresh pair for `user_id` as if it had logged in.
    pub fn issue(&self, user_id: u64) -> (String, String) {
        let mut state = self.state.lock().unwrap();
        state.issued += 1;
        let access = format!("T{}", state.issued);
        let refresh = format!("R{}", state.issued);
        state.access.insert(access.clone(), user_id);
        state.refresh.insert(refresh.clone(), user_id);
        (access, refresh)
    }

    pub fn expire_access(&self, token: &str) {
        self.state.lock().unwrap().access.remove(token);
    }

    pub fn revoke_refresh(&self, token: &str) {
        self.state.lock().unwrap().refresh.remove(token);
    }

    pub fn rotate_refresh_tokens(&self) {
        self.state.lock().unwrap().rotate_refresh = true;
    }

    pub fn set_unread(&self, count: u64) {
        self.state.lock().unwrap().unread = count;
    }

    fn grant(&self, user_id: u64) -> ApiResponse {
        let (access, refresh) = self.issue(user_id);
        let state = self.state.lock().unwrap();
        let account = state.accounts.iter().find(|a| a.id == user_id).expect("account exists");
        respond(
            200,
            &json!({
                "access_token": access,
                "refresh_token": refresh,
                "token_type": "bearer",
                "user": user_json(account.id, &account.username),
            }),
        )
    }

    fn bearer_user(&self, req: &ApiRequest) -> Option<u64> {
        let token = req.bearer.as_deref()?;
        self.state.lock().unwrap().access.get(token).copied()
    }

    pub fn handle(&self, req: &ApiRequest) -> ApiResponse {
        let unauthorized = || respond(401, &json!({ "detail": "Could not validate credentials" }));
        match req.route() {
            "/users/login" => {
                let username = form_field(&req.body, "username").unwrap_or_default();
                let password = form_field(&req.body, "password").unwrap_or_default();
                let id = {
                    let state = self.state.lock().unwrap();
                    state.accounts.iter().find(|a| a.username == username && a.password == password).map(|a| a.id)
                };
                match id {
                    Some(id) => self.grant(id),
                    None => respond(401, &json!({ "detail": "Incorrect username or password" })),
                }
            }
            "/users/register" => {
                let username = json_field(&req.body, "username").unwrap_or_default().to_owned();
                let email = json_field(&req.body, "email").unwrap_or_default().to_owned();
                let password = json_field(&req.body, "password").unwrap_or_default().to_owned();
                if password.is_empty() {
                    return respond(422, &json!({ "detail": [{ "loc": ["body", "password"], "msg": "field required" }] }));
                }
                let id = {
                    let mut state = self.state.lock().unwrap();
                    if state.accounts.iter().any(|a| a.username == username) {
                        return respond(400, &json!({ "detail": "Username already registered" }));
                    }
                    if state.accounts.iter().any(|a| a.email == email) {
                        return respond(400, &json!({ "detail": "Email already registered" }));
                    }
                    let id = state.accounts.len() as u64 + 1;
                    state.accounts.push(Account { id, username, email, password });
                    id
                };
                self.grant(id)
            }
            "/users/refresh" => {
                let token = json_field(&req.body, "refresh_token").unwrap_or_default();
                let mut state = self.state.lock().unwrap();
                let Some(user_id) = state.refresh.get(token).copied() else {
                    return respond(401, &json!({ "detail": "Invalid refresh token" }));
                };
                state.issued += 1;
                let access = format!("T{}", state.issued);
                state.access.insert(access.clone(), user_id);
                if state.rotate_refresh {
                    let refresh = format!("R{}", state.issued);
                    state.refresh.remove(token);
                    state.refresh.insert(refresh.clone(), user_id);
                    respond(200, &json!({ "access_token": access, "refresh_token": refresh }))
                } else {
                    respond(200, &json!({ "access_token": access }))
                }
            }
            "/users/me" => match self.bearer_user(req) {
                Some(id) => {
                    let state = self.state.lock().unwrap();
                    let account = state.accounts.iter().find(|a| a.id == id).expect("account exists");
                    respond(200, &user_json(account.id, &account.username))
                }
                None => unauthorized(),
            },
            "/notifications/unread/count" => match self.bearer_user(req) {
                Some(_) => respond(200, &json!({ "count": self.state.lock().unwrap().unread })),
                None => unauthorized(),
            },
            route => match self.bearer_user(req) {
                Some(id) => respond(200, &json!({ "route": route, "viewer": id })),
                None => unauthorized(),
            },
        }
    }
}

// =========================================================================
// Wiring
// =========================================================================

/// One tab wired against `transport`.
pub struct TestTab {
    pub tokens: TokenStore,
    pub navigator: Arc<MemoryNavigator>,
    pub api: Api,
    pub controller: Arc<SessionController>,
}

pub fn tab_with(transport: Arc<MockTransport>, tokens: TokenStore, start_path: &str) -> TestTab {
    let navigator = Arc::new(MemoryNavigator::new(start_path));
    let pipeline = Arc::new(AuthPipeline::new(transport, tokens.clone(), navigator.clone(), "/login"));
    let api = Api::new(pipeline);
    let controller = Arc::new(SessionController::new(api.clone()));
    TestTab { tokens, navigator, api, controller }
}

pub fn tab(transport: Arc<MockTransport>) -> TestTab {
    tab_with(transport, TokenStore::in_memory(), "/")
}
