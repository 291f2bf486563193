//! Form adapter integration tests.

mod transforms;
mod submit;
