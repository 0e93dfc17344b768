//! A GraphQL client with a normalized cache.
//!
//! Responses are executed against the selection sets of their operations, normalized into a
//! flat record store, and read back through the same execution engine. Requests go through a
//! pipeline of tower services, see [`services`].

#![cfg_attr(feature = "failfast", allow(unreachable_code))]
#![warn(unreachable_pub)]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

macro_rules! failfast_error {
    ($($tokens:tt)+) => {{
        tracing::error!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

#[macro_use]
pub mod json_ext;

pub mod cache;
mod client;
pub mod configuration;
pub mod error;
pub mod execution;
pub mod graphql;
pub mod services;
pub mod spec;

#[cfg(test)]
mod test_fixtures;

pub use client::ApolloClient;
pub use configuration::Configuration;
