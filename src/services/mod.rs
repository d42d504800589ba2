pub mod device_tracker;
pub mod pairing;
pub mod playback;
pub mod rotation;
pub mod schedule_resolver;
