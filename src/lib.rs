//! # ttb-auth
//!
//! Identity service for a small web application and its back-end peers.
//!
//! ## Accounts
//!
//! Accounts live in Postgres (`users` table). Usernames are unique and passwords are
//! stored as Argon2id PHC strings; the clear text never leaves the request that
//! carries it. On startup an `sa` account is created when none exists.
//!
//! ## Surfaces
//!
//! - **Web:** cookie sessions (`ttb-auth`, 15 minute sliding idle timeout), a login
//!   form and login-gated account pages under `/users`.
//! - **Queue RPC:** one AMQP queue per operation (`<prefix>.authenticate`,
//!   `<prefix>.listusers`, `<prefix>.adduser`). Replies go to the `reply_to` queue
//!   with the request's correlation id; a delivery is acknowledged only after its
//!   reply was published.
//!
//! Both surfaces share the same [`auth::Authenticator`] and
//! [`directory::DirectoryService`], so a given credential pair gets the same verdict
//! from either.
//!
//! ## Configuration
//!
//! Every flag has a `TTB_AUTH_*` environment variable; see `ttb-auth --help`.

pub mod amqp;
pub mod api;
pub mod auth;
pub mod cli;
pub mod directory;
pub mod session;
pub mod users;
