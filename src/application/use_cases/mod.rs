pub mod checkout;
pub mod entitlement;
pub mod leads;
