pub mod genesis;
pub mod params;

pub use genesis::build_genesis;
pub use params::Params;
