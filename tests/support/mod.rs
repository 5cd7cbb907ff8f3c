#![allow(dead_code)]

pub mod peakwave_env;
pub mod peaks;
