pub(crate) mod health;
pub(crate) mod messages;
pub(crate) mod overview;
pub(crate) mod positions;
pub(crate) mod reports;
pub(crate) mod review;
