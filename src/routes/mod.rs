pub mod activity;
pub mod auth;
pub mod classes;
pub mod health;
pub mod students;
pub mod teachers;
pub mod users;
