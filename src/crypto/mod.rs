pub mod token;

use uuid::Uuid;

// Random OAuth `state` value
pub fn oauth_state() -> String {
    Uuid::new_v4().to_string()
}

// Identifier for saved locations
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
