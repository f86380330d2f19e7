use std::time::Duration;

use reqwest::header::CONNECTION;
use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use crate::logger::MessageLogger;
use crate::types::ApiVersion;
use crate::{Error, Result};

/// A dropped connection gets one more attempt; every other failure is final.
const MAX_ATTEMPTS: u32 = 2;

pub(crate) enum Auth {
    Bearer(String),
    Basic {
        username: String,
        password_digest: String,
    },
}

impl Auth {
    /// v3 credentials: the password sent is the hex SHA-256 of
    /// `username + password`.
    pub fn basic(username: &str, password: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(username.as_bytes());
        hasher.update(password.as_bytes());
        Auth::Basic {
            username: username.to_string(),
            password_digest: format!("{:x}", hasher.finalize()),
        }
    }
}

pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
    api: ApiVersion,
    auth: Auth,
    timeout: Duration,
    logger: Option<MessageLogger>,
}

impl Transport {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api: ApiVersion,
        auth: Auth,
        timeout: Duration,
        logger: Option<MessageLogger>,
    ) -> Self {
        Self {
            http,
            base_url,
            api,
            auth,
            timeout,
            logger,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&mut self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    /// Send one request and return its JSON body. Only a 200 counts as
    /// success; an empty body reads as `null`.
    pub async fn request(&mut self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "hub request");
        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), path, body);
        }

        let mut attempt = 1;
        let (status, text) = loop {
            match self.send(&method, &url, body).await {
                Err(Error::Http(e)) if attempt < MAX_ATTEMPTS && is_disconnect(&e) => {
                    warn!(url = %url, attempt, "connection dropped, retrying: {e}");
                    attempt += 1;
                }
                result => break result?,
            }
        };

        let parsed = if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text)
        };
        if let Some(ref mut logger) = self.logger {
            let logged = parsed
                .as_ref()
                .cloned()
                .unwrap_or_else(|_| Value::String(text.clone()));
            logger.log_response(path, status, &logged);
        }

        if status != 200 {
            debug!(url = %url, status, body = %text, "hub rejected request");
            return Err(Error::status(status));
        }
        let parsed =
            parsed.map_err(|e| Error::Schema(format!("{path}: response body is not JSON: {e}")))?;
        trace!(url = %url, bytes = text.len(), "hub response");
        Ok(parsed)
    }

    pub fn log_command(&mut self, action: &str, zone: Option<&str>, body: &Value) {
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, zone, body);
        }
    }

    async fn send(&self, method: &Method, url: &str, body: Option<&Value>) -> Result<(u16, String)> {
        let mut req = self.http.request(method.clone(), url).timeout(self.timeout);
        req = match &self.auth {
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::Basic {
                username,
                password_digest,
            } => req
                .basic_auth(username, Some(password_digest))
                .header(CONNECTION, "close"),
        };
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        trace!(api = ?self.api, status, "received response");
        Ok((status, text))
    }
}

/// The connection went away before a response arrived. A drop while the
/// body is being read fails in `resp.text()` as a body error and is final.
fn is_disconnect(e: &reqwest::Error) -> bool {
    !e.is_timeout() && (e.is_connect() || e.is_request())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_hashes_username_and_password() {
        let Auth::Basic {
            username,
            password_digest,
        } = Auth::basic("user", "pass")
        else {
            panic!("expected basic auth");
        };
        assert_eq!(username, "user");
        // sha256("userpass")
        assert_eq!(
            password_digest,
            "05d49692b755f99c4504b510418efeeeebfd466892540f27acf9a31a326d6504"
        );
    }
}
