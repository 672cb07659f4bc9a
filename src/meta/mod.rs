pub mod ride;
pub mod user;

pub use ride::{Provider, RideEstimate, Trip, TripRequest};
pub use user::{ConnectedAccount, ConnectedAccounts, Preferences, SavedLocation, UserRecord};
