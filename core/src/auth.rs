/*
    spotify-recs-rs | Rust CLI tool to generate Spotify track recommendations.
    Copyright (C) 2025  spotify-recs-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use log::debug;
use rspotify::{prelude::*, scopes, AuthCodeSpotify, Config, Credentials, OAuth};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

/// Key used in the durable token artifact (`SPOTIFY_TOKEN=<value>`).
pub const TOKEN_FILE_KEY: &str = "SPOTIFY_TOKEN";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to initialize Spotify client: {0}")]
    ClientConfig(String),
    #[error("Spotify authentication failed: {0}")]
    Spotify(#[from] rspotify::ClientError),
    #[error("Redirected URL carries no authorization code: {0}")]
    MissingCode(String),
    #[error("Authorization code exchange rejected: {0}")]
    Exchange(#[source] rspotify::ClientError),
    #[error("No access token present after the exchange")]
    TokenUnavailable,
    #[error("Failed to access token file: {0}")]
    TokenFile(#[from] std::io::Error),
}

/// Bearer token for the Spotify Web API.
///
/// Expiry is not tracked locally; the token is treated as valid until a
/// call fails with an auth error, at which point the user re-authenticates.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }
}

// Keep the token value out of debug output and logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(****)")
    }
}

/// An authorization flow that has produced a URL but not yet a token.
///
/// Hand the `authorize_url` to the user, then feed the URL they were
/// redirected to into [`PendingAuth::complete`] to obtain a [`Credential`].
pub struct PendingAuth {
    client: AuthCodeSpotify,
    url: String,
}

impl PendingAuth {
    /// Builds the authorization URL from explicit client identity.
    ///
    /// `show_dialog` is forced on so a returning user still sees the
    /// consent screen, matching the sign-in-button flow this serves.
    /// No network traffic happens here.
    pub fn new(creds: Credentials, oauth: OAuth) -> Result<Self, AuthError> {
        let config = Config {
            token_cached: false,
            ..Default::default()
        };
        let client = AuthCodeSpotify::with_config(creds, oauth, config);
        let url = client.get_authorize_url(true)?;
        Ok(Self { client, url })
    }

    pub fn authorize_url(&self) -> &str {
        &self.url
    }

    /// Exchanges the authorization code embedded in `redirected_url` for a
    /// bearer token.
    ///
    /// Fails with [`AuthError::MissingCode`] before any token-endpoint call
    /// when the URL carries no `code` parameter, and with
    /// [`AuthError::Exchange`] when the remote endpoint rejects the code
    /// (expired, mismatched redirect target, revoked client).
    pub async fn complete(self, redirected_url: &str) -> Result<Credential, AuthError> {
        let code = self
            .client
            .parse_response_code(redirected_url)
            .ok_or_else(|| AuthError::MissingCode(redirected_url.to_string()))?;

        self.client
            .request_token(&code)
            .await
            .map_err(AuthError::Exchange)?;

        let token = self.client.get_token();
        let guard = token.lock().await.map_err(|_| AuthError::TokenUnavailable)?;
        let access_token = guard
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(AuthError::TokenUnavailable)?;

        debug!("authorization code exchange completed");
        Ok(Credential::new(access_token))
    }
}

/// Starts the Authorization Code Flow from the environment.
///
/// This function:
/// 1. Reads credentials (`RSPOTIFY_CLIENT_ID`, `RSPOTIFY_CLIENT_SECRET`) from the environment.
/// 2. Reads the redirect URI (`RSPOTIFY_REDIRECT_URI`) from the environment.
/// 3. Requests the `user-top-read` scope needed to seed recommendations
///    from the user's listening history.
///
/// Returns a [`PendingAuth`] holding the URL for the user to visit.
pub fn begin_auth() -> Result<PendingAuth, AuthError> {
    let creds = Credentials::from_env().ok_or_else(|| {
        AuthError::ClientConfig("Missing RSPOTIFY_CLIENT_ID or RSPOTIFY_CLIENT_SECRET".to_string())
    })?;

    let oauth = OAuth::from_env(scopes!("user-top-read"))
        .ok_or_else(|| AuthError::ClientConfig("Missing RSPOTIFY_REDIRECT_URI".to_string()))?;

    PendingAuth::new(creds, oauth)
}

/// Persists the credential as a `SPOTIFY_TOKEN=<value>` line.
///
/// Overwrites the line in place when the key already exists, appends it
/// otherwise. Other lines in the file are left untouched, so the artifact
/// can double as a `.env`-style file.
pub fn save_token(path: &Path, credential: &Credential) -> Result<(), AuthError> {
    let entry = format!("{}={}", TOKEN_FILE_KEY, credential.bearer());

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    for line in contents.lines() {
        if line.starts_with(&format!("{}=", TOKEN_FILE_KEY)) {
            lines.push(entry.clone());
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(entry);
    }

    fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}

/// Reads a previously saved credential, if the artifact holds one.
pub fn load_token(path: &Path) -> Result<Option<Credential>, AuthError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let token = contents.lines().find_map(|line| {
        line.strip_prefix(&format!("{}=", TOKEN_FILE_KEY))
            .map(|value| value.trim().to_string())
    });

    Ok(token.filter(|t| !t.is_empty()).map(Credential::new))
}

/// Removes the durable token artifact so the next run re-authenticates.
/// Safe to call when nothing is saved.
pub fn invalidate(path: &Path) -> Result<(), AuthError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_pending() -> PendingAuth {
        let creds = Credentials::new("test-client-id", "test-client-secret");
        let oauth = OAuth {
            redirect_uri: "http://localhost:8888/callback".to_string(),
            scopes: scopes!("user-top-read"),
            ..Default::default()
        };
        PendingAuth::new(creds, oauth).expect("authorize URL construction")
    }

    #[test]
    fn test_authorize_url_carries_client_identity() {
        let pending = dummy_pending();
        assert!(pending.authorize_url().contains("client_id=test-client-id"));
        assert!(pending.authorize_url().contains("show_dialog=true"));
    }

    #[tokio::test]
    async fn test_complete_without_code_fails_before_exchange() {
        let pending = dummy_pending();
        let result = pending
            .complete("http://localhost:8888/callback?error=access_denied")
            .await;
        // A URL without a code parameter never reaches the token endpoint,
        // so this fails fast even with dummy credentials.
        assert!(matches!(result, Err(AuthError::MissingCode(_))));
    }

    #[test]
    fn test_save_token_appends_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "OTHER=1\n").unwrap();

        save_token(&path, &Credential::new("abc123")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "OTHER=1\nSPOTIFY_TOKEN=abc123\n");
    }

    #[test]
    fn test_save_token_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "SPOTIFY_TOKEN=old\nOTHER=1\n").unwrap();

        save_token(&path, &Credential::new("new")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "SPOTIFY_TOKEN=new\nOTHER=1\n");
    }

    #[test]
    fn test_load_token_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");

        assert!(load_token(&path).unwrap().is_none());

        save_token(&path, &Credential::new("abc123")).unwrap();
        let loaded = load_token(&path).unwrap().unwrap();
        assert_eq!(loaded.bearer(), "abc123");
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");

        save_token(&path, &Credential::new("abc123")).unwrap();
        invalidate(&path).unwrap();
        assert!(!path.exists());

        // Second call with nothing cached must still succeed.
        invalidate(&path).unwrap();
    }
}
