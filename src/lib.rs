pub mod bot;
pub mod common;
pub mod configs;
pub mod engine;
pub mod gateway;
pub mod player;
pub mod rest;
pub mod sources;
pub mod voice;
