pub mod attribute_json;
pub mod budget;
pub mod credentials;
pub mod dynamodb;
pub mod invoke;
