pub mod activities;
pub mod activity_chats;
pub mod memberships;
pub mod users;

pub use activities::{ActivitiesRow, Activity, ActivityStatus, GeoPoint};
pub use activity_chats::ActivityChatRow;
pub use memberships::{Membership, MembershipRole, MembershipsRow};
pub use users::{HostSummary, UsersRow};
