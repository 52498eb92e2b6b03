//! Integration tests for the Gaffer operator
//!
//! These tests need a cluster (kind works) where the current kubeconfig user
//! can install CRDs. They tell the story of a user creating a Gaffer and the
//! operator reacting to it.
//!
//! # Test Organization
//!
//! - `lifecycle`: stories about a Gaffer being created and the operator
//!   rendering its values Secret and dispatching worker pods

mod helpers;
mod lifecycle;
