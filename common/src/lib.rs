pub mod logging;
pub mod runtime;
pub mod socket;
pub mod systemd;
