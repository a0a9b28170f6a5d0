pub mod capture;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod encoder;
pub mod errors;
pub mod frame;
pub mod logging;
pub mod recorder;
pub mod settings;
pub mod shared;

#[cfg(all(feature = "desktop", feature = "ffmpeg"))]
mod app;

#[cfg(all(feature = "desktop", feature = "ffmpeg"))]
pub use app::run;
