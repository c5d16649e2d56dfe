pub mod build;
pub mod index;
pub mod scaffold;
