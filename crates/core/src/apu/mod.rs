//! Audio building blocks shared by sound channels.

pub mod divider;
pub mod timing;

pub use divider::Divider;
pub use timing::TimingMode;
