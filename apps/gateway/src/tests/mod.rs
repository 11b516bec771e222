mod collaborators;
mod error;
