//! Entity to model mappers
//!
//! `From<Model> for Entity` conversions from database rows to domain objects.
//! Inserts bind entity fields directly in the repositories.

mod magic_link;
mod session;
mod user;
