// Utility functions
pub mod hash;
pub mod export;
pub mod io;
