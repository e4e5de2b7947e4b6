mod curved;
mod funnel;
mod goal_pad;
mod straight;
mod strip;

pub use curved::CurvedParams;
pub use funnel::FunnelParams;
pub use goal_pad::GoalPadParams;
pub use straight::StraightParams;
