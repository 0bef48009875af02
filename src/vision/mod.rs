pub mod camera;
pub mod detector;
pub mod landmarks;
pub mod mouth;
pub mod overlay;
pub mod stream;
pub mod tracker;
pub mod types;
