pub mod identifiers;
pub mod intent;
pub mod normalize;
pub mod scope;
pub mod source;
