pub mod clock;
pub mod estimator;
pub mod ticker;
pub mod window;
