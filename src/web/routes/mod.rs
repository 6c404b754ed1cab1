pub mod activities;
pub mod chat;
pub mod health;
