pub mod errors;
pub mod latent;
pub mod molecule;
pub mod objective;

pub use errors::*;
pub use latent::*;
pub use molecule::*;
pub use objective::*;
