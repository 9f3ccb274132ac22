// Core modules: record model, field grammar, range planning, storage and errors.
pub mod error;
pub mod ledger;
pub mod range;
pub mod registrar;
pub mod star;
pub mod store;
pub mod validate;
