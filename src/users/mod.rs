//! User documents — value model, default rules, and merge patches.

pub mod defaults;
pub mod model;
pub mod patch;

pub use defaults::evaluate;
pub use model::{Container, FieldMap, FieldValue, UserDocument};
pub use patch::{Patch, PatchValue};
