//! Style resolution: units, expressions, inheritance and display values

pub mod display;
pub mod expr;
pub mod inherit;
pub mod units;

pub use display::{Display, InnerDisplay, OuterDisplay};
pub use expr::{CustomProperties, ExprContext, ResolvedLength};
pub use inherit::{resolve_style, ComputedStyle, InheritedStyle, LineHeight, TextAlign};
pub use units::{clamp_size, resolve_size, BoxModel, EdgeProperty};
