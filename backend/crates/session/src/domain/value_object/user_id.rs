use kernel::id::{Id, markers};

/// ID of a durable user record (not the provider's principal ID)
pub type UserId = Id<markers::UserRecord>;
