pub mod clock;
pub mod errors;
pub mod ids;
pub mod room;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock, Visibility, VisibilityFlag};
pub use errors::ApiError;
pub use ids::{ConnectionId, SessionId};
pub use room::{RoomConfig, UserInfo};
pub use session::{Participant, Session, SessionStatus};
