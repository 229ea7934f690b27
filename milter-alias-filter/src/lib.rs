mod error;
pub mod milter;
mod resolver;
pub mod session;
pub mod state;

pub use self::{
    error::FilterError,
    resolver::{Resolution, Resolver, Verdict},
    session::SessionState,
    state::TransactionId,
};
