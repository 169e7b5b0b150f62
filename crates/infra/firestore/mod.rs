pub mod access_token;
pub mod firestore_connection;
pub mod service_account;
pub mod values;
