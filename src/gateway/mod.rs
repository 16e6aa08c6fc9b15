pub mod envelope;
pub mod lambda;
pub mod local;
