//! OAuth2 authorization requests for Google and Microsoft.

use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope,
};
use tracing::{info, warn};

use upup_common::{Error, ProviderKind, Result, Secret};
use upup_config::{GoogleConfig, OneDriveConfig};

use crate::adapter::{AuthSession, PickerContext};
use crate::external::{AuthFlow, AuthorizationRequest, AuthorizationResponse};
use crate::state::{AdapterState, StateMachine};

/// Google OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Microsoft identity platform authorization endpoint.
const MICROSOFT_AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
/// Redirect URL used when the host does not register its own.
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/callback";

/// Read-only Drive access for the picker.
const GOOGLE_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/drive.readonly"];
const ONEDRIVE_SCOPES: [&str; 2] = ["Files.Read.All", "User.Read"];

fn authorization_request(
    provider: ProviderKind,
    client_id: &str,
    auth_url: &str,
    redirect_url: &str,
    scopes: &[&str],
) -> Result<AuthorizationRequest> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_uri(
            AuthUrl::new(auth_url.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_url.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().map(|scope| Scope::new(scope.to_string())))
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok(AuthorizationRequest {
        provider,
        url: url.to_string(),
        csrf_state: csrf_token.secret().clone(),
        pkce_verifier: Secret::new(pkce_verifier.secret().clone()),
        redirect_url: redirect_url.to_string(),
        scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
    })
}

/// Authorization request for the Google picker.
pub fn google_authorization_request(
    config: &GoogleConfig,
    redirect_url: &str,
) -> Result<AuthorizationRequest> {
    authorization_request(
        ProviderKind::GoogleDrive,
        &config.client_id,
        GOOGLE_AUTH_URL,
        redirect_url,
        &GOOGLE_SCOPES,
    )
}

/// Authorization request for OneDrive.
pub fn onedrive_authorization_request(
    config: &OneDriveConfig,
    redirect_url: &str,
) -> Result<AuthorizationRequest> {
    authorization_request(
        ProviderKind::OneDrive,
        &config.client_id,
        MICROSOFT_AUTH_URL,
        redirect_url,
        &ONEDRIVE_SCOPES,
    )
}

/// Turn a flow response into a session.
///
/// # Errors
/// - State does not match the request's CSRF token
/// - Empty access token
pub fn complete_authorization(
    request: &AuthorizationRequest,
    response: AuthorizationResponse,
) -> Result<AuthSession> {
    if response.state != request.csrf_state {
        return Err(Error::Authentication(format!(
            "{} returned a mismatched CSRF state",
            request.provider
        )));
    }
    if response.access_token.is_empty() {
        return Err(Error::Authentication(format!(
            "{} returned an empty access token",
            request.provider
        )));
    }

    // A lifetime too large to represent is treated as non-expiring.
    let expires_at = response.expires_in.and_then(|expires_in| {
        Duration::from_std(expires_in)
            .ok()
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
    });

    Ok(AuthSession {
        provider: request.provider,
        access_token: response.access_token,
        account: response.account,
        expires_at,
        picker: None,
    })
}

/// Drive `machine` through one authentication attempt.
///
/// Failures of any kind are reported as `Error::Authentication` and leave
/// the adapter `Unauthenticated`.
pub(crate) async fn authenticate_with(
    machine: &mut StateMachine,
    flow: &dyn AuthFlow,
    request: AuthorizationRequest,
    picker: Option<PickerContext>,
) -> Result<AuthSession> {
    machine.transition(AdapterState::Authenticating)?;

    let outcome = match flow.authorize(&request).await {
        Ok(response) => complete_authorization(&request, response),
        Err(e @ Error::Authentication(_)) => Err(e),
        Err(e) => Err(Error::Authentication(e.to_string())),
    };

    match outcome {
        Ok(mut session) => {
            session.picker = picker;
            machine.transition(AdapterState::Authenticated)?;
            info!(provider = %request.provider, account = ?session.account, "Authenticated");
            Ok(session)
        }
        Err(e) => {
            warn!(provider = %request.provider, error = %e, "Authentication failed");
            machine.transition(AdapterState::Unauthenticated)?;
            Err(e)
        }
    }
}
