use super::{Session, SessionError, SessionGrant, SessionService, User};
use crate::store::SecureStore;
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};
use url::Url;

const TOKEN_PATH: &str = "/auth/v1/token";
const USER_PATH: &str = "/auth/v1/user";
const LOGOUT_PATH: &str = "/auth/v1/logout";

/// Key of the client's own session record, separate from the app's `session`.
pub const LIVE_SESSION_KEY: &str = "auth_client_session";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: User,
}

impl From<TokenResponse> for SessionGrant {
    fn from(response: TokenResponse) -> Self {
        Self {
            user: response.user,
            session: Session::new(response.access_token, response.refresh_token),
        }
    }
}

/// HTTP client for a GoTrue-compatible auth API.
///
/// The live session is kept in memory and, when storage is attached with
/// [`AuthClient::with_storage`], persisted across processes the same way a
/// platform SDK would.
pub struct AuthClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    current: RwLock<Option<Session>>,
    storage: Option<Arc<dyn SecureStore>>,
}

impl AuthClient {
    /// Build a client for the auth API rooted at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            api_key,
            current: RwLock::new(None),
            storage: None,
        })
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn SecureStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Load the live session persisted by a previous process, if any.
    pub async fn hydrate(&self) {
        let Some(storage) = &self.storage else {
            return;
        };

        match storage.get(LIVE_SESSION_KEY).await {
            Ok(Some(json)) => match Session::from_json(&json) {
                Ok(session) => {
                    debug!("live session loaded from storage");
                    *self.current.write().await = Some(session);
                }
                Err(e) => error!("discarding unreadable live session: {}", e),
            },
            Ok(None) => {}
            Err(e) => error!("unable to read live session: {}", e),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        self.base_url
            .join(path)
            .map_err(|e| SessionError::InvalidResponse(format!("invalid endpoint {path}: {e}")))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Response, SessionError> {
        let mut url = self.endpoint(TOKEN_PATH)?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        debug!("token grant: {}", grant_type);

        Ok(self
            .client
            .post(url)
            .header("apikey", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?)
    }

    async fn fetch_user(&self, access_token: &SecretString) -> Result<Response, SessionError> {
        let url = self.endpoint(USER_PATH)?;

        Ok(self
            .client
            .get(url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?)
    }

    async fn refresh(&self, session: &Session) -> Result<SessionGrant, SessionError> {
        let response = self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token().expose_secret() }),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return parse_grant(response).await;
        }

        let message = error_message(response).await;
        if status.is_server_error() {
            Err(SessionError::Unavailable(format!("{status} {message}")))
        } else {
            Err(SessionError::Rejected(message))
        }
    }

    async fn remember(&self, session: &Session) {
        *self.current.write().await = Some(session.clone());

        if let Some(storage) = &self.storage {
            let result = match session.to_json() {
                Ok(json) => storage.set(LIVE_SESSION_KEY, &json).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                error!("unable to persist live session: {}", e);
            }
        }
    }

    async fn forget(&self) -> Option<Session> {
        let session = self.current.write().await.take();

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.delete(LIVE_SESSION_KEY).await {
                error!("unable to delete live session: {}", e);
            }
        }

        session
    }
}

#[async_trait]
impl SessionService for AuthClient {
    #[instrument(skip(self, password))]
    async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SessionGrant, SessionError> {
        let response = self
            .token_grant(
                "password",
                json!({ "email": email, "password": password.expose_secret() }),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return if status.is_server_error() {
                Err(SessionError::Unavailable(format!("{status} {message}")))
            } else {
                Err(SessionError::InvalidCredentials(message))
            };
        }

        let grant = parse_grant(response).await?;
        self.remember(&grant.session).await;

        Ok(grant)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), SessionError> {
        let Some(session) = self.forget().await else {
            return Ok(());
        };

        let url = self.endpoint(LOGOUT_PATH)?;
        let response = self
            .client
            .post(url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(session.access_token().expose_secret())
            .send()
            .await?;

        // An already revoked token still counts as signed out.
        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            let message = error_message(response).await;
            Err(SessionError::Unavailable(format!("{status} {message}")))
        }
    }

    #[instrument(skip(self))]
    async fn discard(&self) {
        if self.forget().await.is_some() {
            debug!("live session discarded");
        }
    }

    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<User>, SessionError> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };

        let response = self.fetch_user(session.access_token()).await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<User>()
                .await
                .map(Some)
                .map_err(|e| SessionError::InvalidResponse(e.to_string()));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("live access token refused ({}), refreshing", status);
            let grant = self.refresh(&session).await?;
            self.remember(&grant.session).await;
            return Ok(Some(grant.user));
        }

        let message = error_message(response).await;
        if status.is_server_error() {
            Err(SessionError::Unavailable(format!("{status} {message}")))
        } else {
            Err(SessionError::Rejected(message))
        }
    }

    async fn current_session(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.current.read().await.clone())
    }

    #[instrument(skip(self, session))]
    async fn set_session(&self, session: &Session) -> Result<SessionGrant, SessionError> {
        let response = self.fetch_user(session.access_token()).await?;
        let status = response.status();

        let grant = if status.is_success() {
            let user = response
                .json::<User>()
                .await
                .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
            SessionGrant {
                user,
                session: session.clone(),
            }
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("access token refused ({}), trying refresh token", status);
            self.refresh(session).await?
        } else if status.is_server_error() {
            let message = error_message(response).await;
            return Err(SessionError::Unavailable(format!("{status} {message}")));
        } else {
            let message = error_message(response).await;
            warn!("stored session rejected: {} {}", status, message);
            return Err(SessionError::Rejected(message));
        };

        self.remember(&grant.session).await;

        Ok(grant)
    }
}

async fn parse_grant(response: Response) -> Result<SessionGrant, SessionError> {
    response
        .json::<TokenResponse>()
        .await
        .map(SessionGrant::from)
        .map_err(|e| SessionError::InvalidResponse(e.to_string()))
}

/// Pull a human readable message out of an error body.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .map_or_else(|| status.to_string(), str::to_string)
}
