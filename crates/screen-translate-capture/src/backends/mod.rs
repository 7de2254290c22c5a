pub mod synthetic;

#[cfg(feature = "backend-still")]
pub mod still;
