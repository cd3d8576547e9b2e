pub mod catalog;
pub mod comparison;
pub mod price;
pub mod product;

pub use catalog::*;
pub use comparison::*;
pub use price::*;
pub use product::*;
