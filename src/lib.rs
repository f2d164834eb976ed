#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod bus;
pub mod canvas;
pub mod colormap;
pub mod components;
pub mod controller;
pub mod ops;
pub mod remote;
pub mod settings;
pub mod viewport;
pub mod volume;

pub use controller::CanvasController;
