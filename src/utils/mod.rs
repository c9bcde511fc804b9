pub mod token;
pub mod tracking_id;
