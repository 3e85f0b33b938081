//! UI-agnostic list utilities: virtual windowing, pagination and scroll
//! position memory. Callers own rendering; these types only compute what to
//! render.

mod paginator;
mod scroll;
mod window;

pub use paginator::Paginator;
pub use scroll::ScrollMemory;
pub use window::{
  compute_window, ContainerStyle, InnerStyle, Overflow, Position, VirtualItem, VirtualScroller,
  VirtualWindow, Viewport,
};
