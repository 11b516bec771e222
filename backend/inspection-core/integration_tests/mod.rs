mod connection;
mod gateway;
mod helpers;
mod orchestrator;
