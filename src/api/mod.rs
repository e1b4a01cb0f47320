//! Authenticated client for the Veeam Backup Enterprise Manager REST API.
//!
//! ## Layout
//!
//! - `mod.rs`: login/logout and the request helpers every call goes through
//! - `queries`: the `/query` endpoint (failed, successful and recent runs)
//! - `resources`: pass-through accessors and light report shaping

mod queries;
mod resources;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::evaluator::FailureEvaluator;
use crate::core::models::JobRun;
use crate::error::{Error, Result};
use crate::transport::{Credentials, HttpRequest, HttpResponse, HttpSession, ReqwestSession};

pub use resources::SummaryReport;

pub const SESSION_HEADER: &str = "X-RestSvcSessionId";
const LOGIN_PATH: &str = "/sessionMngr/";
const LOGIN_API_VERSION: &str = "v1_4";

/// Client bound to one authenticated session. The session's headers are
/// written during [`VeeamClient::login`] and only read afterwards.
pub struct VeeamClient<S = ReqwestSession> {
    session: S,
    lookup_concurrency: usize,
}

impl VeeamClient<ReqwestSession> {
    /// Build a `reqwest` session from config and log in.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let session = ReqwestSession::new(&config.url, &config.session_options())?;
        let client = Self::login(session, config.credentials()).await?;
        Ok(client.with_lookup_concurrency(config.lookup_concurrency))
    }
}

impl<S: HttpSession> VeeamClient<S> {
    /// POST the credentials to the session manager and keep the returned
    /// session id for every later request.
    ///
    /// Fails with [`Error::Authentication`] on any status but 201, and with
    /// [`Error::SessionKeyMissing`] on a 201 without the session header.
    pub async fn login(mut session: S, credentials: Credentials) -> Result<Self> {
        session.set_header("Accept", "application/json")?;

        let username = credentials.username.clone();
        let response = session
            .send(
                HttpRequest::post(LOGIN_PATH)
                    .query("v", LOGIN_API_VERSION)
                    .basic_auth(credentials),
            )
            .await?;

        if response.status != 201 {
            warn!(user = %username, status = response.status, "Login rejected");
            return Err(Error::Authentication {
                status: response.status,
            });
        }

        let token = response
            .header(SESSION_HEADER)
            .ok_or(Error::SessionKeyMissing)?
            .to_string();
        session.set_header(SESSION_HEADER, &token)?;

        info!(user = %username, "Logged in");

        Ok(Self {
            session,
            lookup_concurrency: 1,
        })
    }

    pub fn with_lookup_concurrency(mut self, concurrency: usize) -> Self {
        self.lookup_concurrency = concurrency.max(1);
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Evaluator wired to this client's queries.
    pub fn evaluator(&self) -> FailureEvaluator<'_, Self> {
        FailureEvaluator::new(self).with_concurrency(self.lookup_concurrency)
    }

    /// Failed runs from the last 24 hours with no later success or warning
    /// of the same job name, each tagged `message_type = "job_failed"`.
    pub async fn find_persistent_failures(&self) -> Result<Vec<JobRun>> {
        self.evaluator().find_persistent_failures().await
    }

    /// End the server-side session: look up the current logon session and
    /// delete it.
    pub async fn logout(&self) -> Result<()> {
        let sessions = self.get_json(HttpRequest::get("/logonSessions")).await?;
        let session_id = sessions
            .get("LogonSessions")
            .and_then(|s| s.get(0))
            .and_then(|s| s.get("SessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::shape("/logonSessions", "LogonSessions[0].SessionId"))?
            .to_string();

        let path = format!("/logonSessions/{}", session_id);
        self.send_checked(HttpRequest::delete(path)).await?;
        info!("Logged out");
        Ok(())
    }

    /// Send and turn non-2xx answers into [`Error::Remote`].
    async fn send_checked(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = request.path.clone();
        let response = self.session.send(request).await?;
        debug!(path = %path, status = response.status, "Response");

        if response.is_success() {
            return Ok(response);
        }

        let message = response
            .body
            .get("Message")
            .and_then(Value::as_str)
            .map(|m| m.trim().to_string())
            .or_else(|| response.body.as_str().map(str::to_string))
            .unwrap_or_else(|| "no error message".to_string());

        warn!(path = %path, status = response.status, message = %message, "Request failed");

        Err(Error::Remote {
            path,
            status: response.status,
            message,
        })
    }

    async fn get_json(&self, request: HttpRequest) -> Result<Value> {
        Ok(self.send_checked(request).await?.body)
    }
}
