pub mod types;
pub mod evaluate;
pub mod composer;
