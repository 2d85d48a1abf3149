// NB module level configuration.
#![allow(dead_code)]

// NB declare the public modules.
pub mod utils;
pub mod topology;
pub mod lattice;
pub mod gibbs;
pub mod denoise;
