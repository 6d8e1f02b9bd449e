pub mod health;
pub mod login;
pub mod root;
pub mod users;

#[cfg(test)]
mod tests;
