/// Result of writing a freshly created Stripe customer id onto a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerClaim {
    /// The profile had no customer id and now stores ours.
    Claimed,
    /// Another request stored a customer id first; carries that id.
    AlreadyClaimed(String),
}
