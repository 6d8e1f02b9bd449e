use async_trait::async_trait;
use tracing::{error, info, warn};

use super::messages::{
    AddUserReply, AuthenticateReply, AuthenticateRequest, ListUsersReply, ListUsersRequest,
    STATUS_AUTHENTICATION_FAILED, STATUS_LIST_FAILED, STATUS_NOT_SUPPORTED, STATUS_OK,
    STATUS_OPERATIONAL_FAILURE, STATUS_USER_INACTIVE,
};
use crate::{
    auth::{AuthError, Authenticator},
    directory::DirectoryService,
};

pub const AUTHENTICATE: &str = "authenticate";
pub const LIST_USERS: &str = "listusers";
pub const ADD_USER: &str = "adduser";

/// One queue operation: request body in, reply body out.
///
/// Every outcome, including malformed input and storage faults, maps to a
/// status code in the reply. Handlers hold no state between calls, so a
/// redelivered message gets the same answer.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Queue name suffix under the gateway prefix.
    fn operation(&self) -> &'static str;

    /// # Errors
    /// Returns an error only if the reply cannot be serialized.
    async fn handle(&self, body: &[u8]) -> serde_json::Result<Vec<u8>>;
}

pub struct AuthenticateHandler {
    authenticator: Authenticator,
}

impl AuthenticateHandler {
    #[must_use]
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl RpcHandler for AuthenticateHandler {
    fn operation(&self) -> &'static str {
        AUTHENTICATE
    }

    async fn handle(&self, body: &[u8]) -> serde_json::Result<Vec<u8>> {
        let status = match serde_json::from_slice::<AuthenticateRequest>(body) {
            Ok(request) => {
                match self
                    .authenticator
                    .authenticate(&request.username, &request.password)
                    .await
                {
                    Ok(account) => {
                        info!(
                            user.id = %account.id,
                            user.name = %account.username,
                            "authenticated over queue"
                        );
                        STATUS_OK
                    }
                    Err(AuthError::AuthenticationFailed) => STATUS_AUTHENTICATION_FAILED,
                    Err(AuthError::UserInactive) => STATUS_USER_INACTIVE,
                    Err(AuthError::Operational(err)) => {
                        error!("authenticate request failed: {err}");
                        STATUS_OPERATIONAL_FAILURE
                    }
                }
            }
            Err(err) => {
                warn!("malformed authenticate request: {err}");
                STATUS_OPERATIONAL_FAILURE
            }
        };
        serde_json::to_vec(&AuthenticateReply { status })
    }
}

pub struct ListUsersHandler {
    directory: DirectoryService,
}

impl ListUsersHandler {
    #[must_use]
    pub fn new(directory: DirectoryService) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl RpcHandler for ListUsersHandler {
    fn operation(&self) -> &'static str {
        LIST_USERS
    }

    async fn handle(&self, body: &[u8]) -> serde_json::Result<Vec<u8>> {
        let reply = match serde_json::from_slice::<ListUsersRequest>(body) {
            // TODO: reject unknown application keys once keys are issued.
            Ok(_request) => match self.directory.list().await {
                Ok(users) => ListUsersReply {
                    status: STATUS_OK,
                    userlist: Some(users),
                },
                Err(err) => {
                    error!("listusers request failed: {err}");
                    ListUsersReply {
                        status: STATUS_LIST_FAILED,
                        userlist: None,
                    }
                }
            },
            Err(err) => {
                warn!("malformed listusers request: {err}");
                ListUsersReply {
                    status: STATUS_LIST_FAILED,
                    userlist: None,
                }
            }
        };
        serde_json::to_vec(&reply)
    }
}

/// Declared so callers get an explicit answer; never creates an account.
pub struct AddUserHandler;

#[async_trait]
impl RpcHandler for AddUserHandler {
    fn operation(&self) -> &'static str {
        ADD_USER
    }

    async fn handle(&self, _body: &[u8]) -> serde_json::Result<Vec<u8>> {
        warn!("adduser request received but not supported");
        serde_json::to_vec(&AddUserReply {
            status: STATUS_NOT_SUPPORTED,
            error: "adding users over the queue is not yet supported".to_string(),
        })
    }
}
