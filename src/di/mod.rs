mod builder;
mod container;

pub use builder::ServicesBuilder;
pub use container::Services;
