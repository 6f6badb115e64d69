pub mod assignment;
pub mod conversations;
pub mod keys;
pub mod messages;
pub mod store;
pub mod typing;
pub mod unread;
