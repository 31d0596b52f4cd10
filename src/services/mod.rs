pub mod hsv;
pub mod lifecycle;
pub mod pipeline;
pub mod poller;
pub mod storage;
pub mod transport;
