pub mod commands;
pub mod config;
pub mod lang;
pub mod logging;
pub mod sensor;
pub mod session;
pub mod squat;
pub mod state;
pub mod voice;
