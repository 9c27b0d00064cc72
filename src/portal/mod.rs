//! Portal for ArcGIS access: authentication, federated server discovery and
//! hosting server license lookup.

pub mod client;
pub mod responses;

pub use client::{get_server_licenses, select_hosting_server, PortalSession, HOSTING_SERVER_ROLE};
pub use responses::{FeatureLicense, PortalServer, ServerLicenses};
