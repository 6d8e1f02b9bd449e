//! Wire records for the queue RPC protocol. Bodies are UTF-8 JSON.

use serde::{Deserialize, Serialize};

use crate::users::AccountSummary;

pub const STATUS_OK: u8 = 0;
pub const STATUS_AUTHENTICATION_FAILED: u8 = 1;
pub const STATUS_USER_INACTIVE: u8 = 2;
pub const STATUS_OPERATIONAL_FAILURE: u8 = 255;

pub const STATUS_LIST_FAILED: u8 = 1;
pub const STATUS_NOT_SUPPORTED: u8 = 1;

#[derive(Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateReply {
    pub status: u8,
}

/// `appkey` is accepted but not checked yet.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersRequest {
    #[serde(default)]
    pub appkey: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersReply {
    pub status: u8,
    /// `null` on failure, possibly empty on success.
    pub userlist: Option<Vec<AccountSummary>>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUserReply {
    pub status: u8,
    pub error: String,
}
