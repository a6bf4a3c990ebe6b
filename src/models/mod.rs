pub mod cursor;
pub mod message;
pub mod roster;
pub mod schedule;
pub mod shift;
