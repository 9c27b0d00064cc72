use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::GisConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::portal::responses::{
    ArcGisResponse, PortalServer, ServerLicenses, ServersResponse, TokenResponse,
};

/// Server role that owns hosted feature services and their licensing.
pub const HOSTING_SERVER_ROLE: &str = "HOSTING_SERVER";

/// An authenticated Portal for ArcGIS session.
#[derive(Debug, Clone)]
pub struct PortalSession {
    http: Client,
    portal_url: String,
    referer: String,
    token: String,
}

/// Strip trailing slashes and a `/sharing/rest` suffix so that both
/// `https://host/portal` and `https://host/portal/sharing/rest/` work.
pub fn normalize_portal_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/sharing/rest").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("/sharing").unwrap_or(trimmed);
    trimmed.to_string()
}

/// Pick the hosting server out of a server listing.
///
/// Portals that predate `serverRole` only flag the hosting server with
/// `isHosted`.
pub fn select_hosting_server(servers: &[PortalServer]) -> Option<&PortalServer> {
    servers
        .iter()
        .find(|s| s.server_role.as_deref() == Some(HOSTING_SERVER_ROLE))
        .or_else(|| {
            servers
                .iter()
                .find(|s| s.server_role.is_none() && s.is_hosted)
        })
}

impl PortalSession {
    /// Authenticate against the portal with a username and password.
    pub async fn connect(
        url: &str,
        username: &str,
        password: &str,
        config: &GisConfig,
    ) -> LicenseResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let portal_url = normalize_portal_url(url);

        let expiration = config.token_expiration_mins.to_string();
        let form = [
            ("username", username),
            ("password", password),
            ("client", "referer"),
            ("referer", config.referer.as_str()),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ];

        debug!(portal = %portal_url, username, "Requesting portal token");

        let resp = http
            .post(format!("{portal_url}/sharing/rest/generateToken"))
            .form(&form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LicenseError::AuthError(format!(
                "token request failed with HTTP status {}",
                resp.status()
            )));
        }

        let body: ArcGisResponse<TokenResponse> = resp.json().await.map_err(|e| {
            LicenseError::ServerError(format!("Failed to parse token response: {e}"))
        })?;

        let token = match body {
            ArcGisResponse::Ok(t) => t.token,
            ArcGisResponse::Error { error } => {
                return Err(LicenseError::AuthError(error.to_string()));
            }
        };

        info!(portal = %portal_url, "Authenticated against portal");

        Ok(Self {
            http,
            portal_url,
            referer: config.referer.clone(),
            token,
        })
    }

    pub fn portal_url(&self) -> &str {
        &self.portal_url
    }

    /// Servers federated with the portal.
    pub async fn servers(&self) -> LicenseResult<Vec<PortalServer>> {
        let url = format!("{}/sharing/rest/portals/self/servers", self.portal_url);
        let body: ServersResponse = self.get_json(&url, "server listing").await?;
        Ok(body.servers)
    }

    /// The hosting server, if one is federated.
    pub async fn hosting_server(&self) -> LicenseResult<Option<PortalServer>> {
        let servers = self.servers().await?;
        debug!(count = servers.len(), "Fetched federated servers");
        Ok(select_hosting_server(&servers).cloned())
    }

    /// License document reported by `server`.
    pub async fn server_licenses(&self, server: &PortalServer) -> LicenseResult<ServerLicenses> {
        let url = format!("{}/admin/system/licenses", server.admin_base());
        self.get_json(&url, "license").await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> LicenseResult<T> {
        let resp = self
            .http
            .get(url)
            .header(REFERER, self.referer.as_str())
            .query(&[("f", "json"), ("token", self.token.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LicenseError::ServerError(format!(
                "{what} request failed with HTTP status {}",
                resp.status()
            )));
        }

        let body: ArcGisResponse<T> = resp.json().await.map_err(|e| {
            LicenseError::ServerError(format!("Failed to parse {what} response: {e}"))
        })?;

        match body {
            ArcGisResponse::Ok(value) => Ok(value),
            ArcGisResponse::Error { error } => Err(LicenseError::ServerError(format!(
                "{what} request rejected: {error}"
            ))),
        }
    }
}

/// License document of the portal's hosting server.
///
/// Returns `Ok(None)` when no hosting server is configured or federated.
pub async fn get_server_licenses(session: &PortalSession) -> LicenseResult<Option<ServerLicenses>> {
    let Some(server) = session.hosting_server().await? else {
        warn!(portal = %session.portal_url(), "No hosting server configured for portal");
        return Ok(None);
    };

    info!(server = %server.name, admin_url = %server.admin_base(), "Querying hosting server licenses");
    let licenses = session.server_licenses(&server).await?;
    Ok(Some(licenses))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(role: Option<&str>, is_hosted: bool, name: &str) -> PortalServer {
        PortalServer {
            id: name.to_string(),
            name: name.to_string(),
            url: format!("https://{name}/server"),
            admin_url: None,
            is_hosted,
            server_role: role.map(str::to_string),
        }
    }

    #[test]
    fn normalizes_portal_urls() {
        assert_eq!(
            normalize_portal_url("https://gis.example.com/portal/"),
            "https://gis.example.com/portal"
        );
        assert_eq!(
            normalize_portal_url("https://gis.example.com/portal/sharing/rest/"),
            "https://gis.example.com/portal"
        );
        assert_eq!(
            normalize_portal_url("https://gis.example.com/portal/sharing"),
            "https://gis.example.com/portal"
        );
    }

    #[test]
    fn selects_by_role_first() {
        let servers = vec![
            server(Some("FEDERATED_SERVER"), false, "a"),
            server(None, true, "legacy"),
            server(Some(HOSTING_SERVER_ROLE), true, "hosting"),
        ];
        assert_eq!(select_hosting_server(&servers).unwrap().name, "hosting");
    }

    #[test]
    fn falls_back_to_is_hosted_without_role() {
        let servers = vec![server(None, false, "a"), server(None, true, "b")];
        assert_eq!(select_hosting_server(&servers).unwrap().name, "b");
    }

    #[test]
    fn no_hosting_server() {
        let servers = vec![server(Some("FEDERATED_SERVER"), true, "a")];
        assert!(select_hosting_server(&servers).is_none());
        assert!(select_hosting_server(&[]).is_none());
    }
}
