//! Topic names for the request/response channel pairs.

use outbox::Channel;

pub const PAYMENT_REQUEST: &str = "payment-request";
pub const PAYMENT_RESPONSE: &str = "payment-response";
pub const ROOM_REQUEST: &str = "room-approval-request";
pub const ROOM_RESPONSE: &str = "room-approval-response";
pub const NOTIFICATION_REQUEST: &str = "notification-request";
pub const NOTIFICATION_RESPONSE: &str = "notification-response";

/// Topic the orchestrator publishes commands on for a channel.
pub fn request_topic(channel: Channel) -> &'static str {
    match channel {
        Channel::Payment => PAYMENT_REQUEST,
        Channel::Room => ROOM_REQUEST,
        Channel::Notification => NOTIFICATION_REQUEST,
    }
}

/// Topic the participant publishes replies on for a channel.
pub fn response_topic(channel: Channel) -> &'static str {
    match channel {
        Channel::Payment => PAYMENT_RESPONSE,
        Channel::Room => ROOM_RESPONSE,
        Channel::Notification => NOTIFICATION_RESPONSE,
    }
}
