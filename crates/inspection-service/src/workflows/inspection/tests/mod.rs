mod common;
mod consumer;
mod event_system;
