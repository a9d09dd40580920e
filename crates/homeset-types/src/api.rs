use serde::{Deserialize, Serialize};

use crate::models::{Home, HomeName, Location};

// -- Homes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetHomeRequest {
    pub location: Location,
    /// Ask for the home to be shared. Ignored (kept personal) when the
    /// owner may not manage shared homes.
    #[serde(default)]
    pub share: bool,
}

#[derive(Debug, Serialize)]
pub struct SetHomeResponse {
    pub home: Home,
    pub sharing_denied: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetSharedRequest {
    pub shared: bool,
}

#[derive(Debug, Serialize)]
pub struct SetSharedResponse {
    pub name: HomeName,
    pub shared: bool,
    pub sharing_denied: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeListResponse {
    pub homes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteHomeResponse {
    pub deleted: bool,
}

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
}
