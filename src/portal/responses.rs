//! Response types for the Portal for ArcGIS and ArcGIS Server REST APIs.
//!
//! ArcGIS reports most failures as HTTP 200 with an `error` object in the
//! body, so every payload is parsed through [`ArcGisResponse`].

use serde::Deserialize;

/// A single licensed feature as reported by `/admin/system/licenses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureLicense {
    /// Human-readable feature name, used as the report key
    pub display_name: String,

    /// Expiration as milliseconds since the Unix epoch
    pub expiration: i64,

    /// Internal feature identifier
    #[serde(default)]
    pub name: Option<String>,
}

/// License document of one ArcGIS Server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerLicenses {
    #[serde(default)]
    pub features: Vec<FeatureLicense>,
}

impl ServerLicenses {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A server federated with the portal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalServer {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Public services URL
    pub url: String,

    /// Administrative URL; older portals leave this out
    #[serde(default)]
    pub admin_url: Option<String>,

    #[serde(default)]
    pub is_hosted: bool,

    /// e.g. `HOSTING_SERVER` or `FEDERATED_SERVER`
    #[serde(default)]
    pub server_role: Option<String>,
}

impl PortalServer {
    /// Base URL for administrative calls, without a trailing slash.
    pub fn admin_base(&self) -> &str {
        self.admin_url
            .as_deref()
            .unwrap_or(&self.url)
            .trim_end_matches('/')
    }
}

// === Server Response Parsing ===

/// `portals/self/servers` listing.
#[derive(Debug, Deserialize)]
pub(crate) struct ServersResponse {
    #[serde(default)]
    pub servers: Vec<PortalServer>,
}

/// `generateToken` result.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}

/// Body of an ArcGIS `error` object.
#[derive(Debug, Clone, Deserialize)]
pub struct ArcGisErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub details: Option<Vec<String>>,
}

impl std::fmt::Display for ArcGisErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)?;
        if let Some(details) = self.details.as_ref().filter(|d| !d.is_empty()) {
            write!(f, ": {}", details.join("; "))?;
        }
        Ok(())
    }
}

/// Either an ArcGIS error object or the expected payload.
///
/// The error variant is tried first: payloads whose fields are all optional
/// would otherwise swallow an error body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ArcGisResponse<T> {
    Error { error: ArcGisErrorBody },
    Ok(T),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_license_features() {
        let json = r#"{
            "features": [
                {"name": "esriProductArcGISServer", "displayName": "ArcGIS Server", "expiration": 1735603200000, "version": "11.1"},
                {"name": "esriNetworkAnalyst", "displayName": "Network Analyst", "expiration": 1704067200000}
            ]
        }"#;

        let licenses: ServerLicenses = serde_json::from_str(json).unwrap();
        assert_eq!(licenses.features.len(), 2);
        assert_eq!(licenses.features[0].display_name, "ArcGIS Server");
        assert_eq!(licenses.features[1].expiration, 1_704_067_200_000);
    }

    #[test]
    fn missing_features_is_empty() {
        let licenses: ServerLicenses = serde_json::from_str("{}").unwrap();
        assert!(licenses.is_empty());
    }

    #[test]
    fn error_object_wins_over_payload() {
        let json = r#"{"error": {"code": 498, "message": "Invalid token.", "details": []}}"#;
        let resp: ArcGisResponse<ServerLicenses> = serde_json::from_str(json).unwrap();
        match resp {
            ArcGisResponse::Error { error } => {
                assert_eq!(error.code, 498);
                assert_eq!(error.to_string(), "Invalid token. (code 498)");
            }
            ArcGisResponse::Ok(_) => panic!("expected error variant"),
        }
    }

    #[test]
    fn admin_base_falls_back_to_url() {
        let server = PortalServer {
            id: "abc".to_string(),
            name: "gis.example.com:6443".to_string(),
            url: "https://gis.example.com/server/".to_string(),
            admin_url: None,
            is_hosted: true,
            server_role: None,
        };
        assert_eq!(server.admin_base(), "https://gis.example.com/server");
    }
}
