pub mod actor;
pub mod backend;
pub mod commands;
pub mod costume;
pub mod dialog;
pub mod engine;
pub mod inventory;
pub mod object;
pub mod room;
pub mod script;
pub mod sprite;
pub mod walkbox;
pub mod world;
