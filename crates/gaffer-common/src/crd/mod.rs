//! Custom Resource Definitions for the Gaffer operator

mod gaffer;

pub use gaffer::{Gaffer, GafferSpec, GafferStatus, RestApiStatus};
