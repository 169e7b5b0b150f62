pub mod firestore;
pub mod repositories;
