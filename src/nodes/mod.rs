//! Module containing the audio nodes a [`Manager`] balances players across.
//!
//! A [`Node`] pairs a [`RestClient`] with a supervised event socket. The
//! socket feeds stats, player positions and track events back through a
//! [`NodeEventHandler`].
//!
//! [`Manager`]: crate::Manager

mod node;
mod rest;
mod socket;

pub use self::node::Node;
pub use self::rest::{NodeApi, RestClient};
pub use self::socket::NodeEventHandler;

#[cfg(test)]
pub(crate) use self::rest::MockNodeApi;
