mod capture;
mod classify;
mod codec;
mod config;
mod sequencer;
mod store;
