pub mod entitlement;
pub mod identity;
pub mod lead;
pub mod payment_event;
