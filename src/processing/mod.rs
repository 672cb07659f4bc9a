pub mod auth;
pub mod google;
pub mod gtfs;
pub mod rides;
pub mod users;
