/// Portal account and single-use token flows
pub mod accounts;
pub mod tokens;

pub use accounts::AccountManager;
pub use tokens::TokenFlow;
